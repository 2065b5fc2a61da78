//! Request validation: which object to fetch and what it is cached under.

use crate::config::{HostAlias, PipelineConfig};
use crate::domain::errors::PipelineError;
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;

const MAX_IDENTITY_CHARS: usize = 64;

/// Body of `POST /add-watermark`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkRequest {
    pub video_url: Option<String>,
    pub username: Option<String>,
}

/// A validated request: where the source lives and how the result is keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVideo {
    /// URL after alias rewriting and percent-decoding
    pub url: String,
    pub bucket: String,
    pub key: String,
    /// Lower-case, with the leading dot
    pub extension: String,
    pub cache_key: String,
    /// Caption text identity
    pub identity: String,
}

impl SourceVideo {
    /// Validate a request without touching the network or the filesystem.
    pub fn resolve(
        request: &WatermarkRequest,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let raw = request
            .video_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                PipelineError::Input("Missing 'videoUrl' in request body".to_string())
            })?;

        let url = normalize_url(raw, config.host_alias.as_ref());
        let (bucket, key) = parse_object_location(&url)?;

        let extension = Path::new(&key)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        if !config.is_supported_extension(&extension) {
            return Err(PipelineError::Input(format!(
                "Unsupported file format: {}",
                extension
            )));
        }

        let identity = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| {
                u.chars()
                    .filter(|c| !c.is_control())
                    .take(MAX_IDENTITY_CHARS)
                    .collect::<String>()
            })
            .unwrap_or_else(|| config.default_identity.clone());

        Ok(SourceVideo {
            cache_key: cache_key(&url),
            url,
            bucket,
            key,
            extension,
            identity,
        })
    }
}

/// Rewrite the CDN alias to the storage host and percent-decode once, so that
/// every spelling of the same object yields the same cache key.
pub fn normalize_url(raw: &str, alias: Option<&HostAlias>) -> String {
    let decoded = match urlencoding::decode(raw.trim()) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.trim().to_string(),
    };
    match alias {
        Some(alias) => decoded.replacen(&alias.alias, &alias.canonical, 1),
        None => decoded,
    }
}

/// Hex SHA-256 of the normalized URL.
pub fn cache_key(normalized_url: &str) -> String {
    format!("{:x}", Sha256::digest(normalized_url.as_bytes()))
}

fn path_style_host() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^s3([.-][a-z0-9-]+)*\.amazonaws\.com$").expect("static regex is valid")
    })
}

/// Split an already-decoded object URL into `(bucket, key)`.
///
/// Virtual-hosted URLs take the bucket from the first host label, path-style
/// S3 URLs from the first path segment, `s3://bucket/key` from the host. The
/// key is taken verbatim from the decoded URL, so a literal `%` in an object
/// name survives.
pub fn parse_object_location(url: &str) -> Result<(String, String), PipelineError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| PipelineError::Input(format!("Invalid video URL: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https" | "s3") {
        return Err(PipelineError::Input(format!(
            "Invalid video URL: unsupported scheme {}",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| PipelineError::Input("Invalid video URL: missing host".to_string()))?
        .to_ascii_lowercase();

    let path = decoded_path(url).trim_start_matches('/');

    let (bucket, key) = if parsed.scheme() != "s3" && path_style_host().is_match(&host) {
        match path.split_once('/') {
            Some((bucket, key)) => (bucket.to_string(), key.to_string()),
            None => (path.to_string(), String::new()),
        }
    } else if parsed.scheme() == "s3" {
        (host.clone(), path.to_string())
    } else {
        let bucket = host.split('.').next().unwrap_or_default().to_string();
        (bucket, path.to_string())
    };

    if bucket.is_empty() || key.is_empty() {
        return Err(PipelineError::Input(
            "Invalid video URL: missing bucket or object key".to_string(),
        ));
    }
    if escapes_bucket(&key) {
        return Err(PipelineError::Input(format!(
            "Invalid video URL: object key {} is not a relative path",
            key
        )));
    }
    Ok((bucket, key))
}

/// Path portion of a URL string, without query or fragment.
fn decoded_path(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = rest.find('/').map(|i| &rest[i..]).unwrap_or_default();
    path.split(['?', '#']).next().unwrap_or_default()
}

fn escapes_bucket(key: &str) -> bool {
    key.starts_with(['/', '\\']) || key.split(['/', '\\']).any(|segment| segment == "..")
}
