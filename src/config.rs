//! Configuration, read once at process start.
//!
//! Components never touch the environment themselves: the binaries build a
//! [`PipelineConfig`] and hand it to the pipeline behind an `Arc`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("{0}")]
    OutOfRange(String),
}

/// How the watermark moves between intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Pseudo-random position, re-sampled every interval.
    Random,
    /// Rotate through the four corners.
    Anchors,
}

impl FromStr for PlacementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(PlacementStrategy::Random),
            "anchors" | "corners" => Ok(PlacementStrategy::Anchors),
            other => Err(format!("unknown placement strategy {:?}", other)),
        }
    }
}

/// CDN host that fronts the storage bucket; rewritten before the cache key is computed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAlias {
    pub alias: String,
    pub canonical: String,
}

const DEFAULT_FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Everything the watermarking pipeline can be tuned with.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Bucket processed videos are published to
    pub output_bucket: String,
    /// Key prefix for processed videos
    pub output_prefix: String,
    /// Base watermark raster (PNG with transparency)
    pub watermark_path: PathBuf,
    /// Branding clip composited onto the outro
    pub branding_clip_path: PathBuf,
    /// Preferred caption font
    pub font_path: Option<PathBuf>,
    /// Fonts tried in order when `font_path` is unset or fails to load
    pub fallback_fonts: Vec<PathBuf>,
    /// Lower-case extensions including the dot
    pub supported_extensions: Vec<String>,
    pub outro_duration_secs: f64,
    /// Watermark height relative to the video height
    pub watermark_size_percent: u32,
    /// 0 < opacity <= 1
    pub watermark_opacity: f32,
    pub position_interval_secs: f64,
    pub placement: PlacementStrategy,
    /// Distance from the frame edge for corner anchors
    pub anchor_margin: u32,
    /// x264 speed preset
    pub encoder_preset: String,
    /// Constant rate factor for the watermark pass
    pub crf: u8,
    pub cache_enabled: bool,
    /// Append a unique suffix to published keys
    pub cache_bust: bool,
    /// Height ceiling for the bounded resolution
    pub max_height: u32,
    pub min_width: u32,
    pub max_width: u32,
    /// Peak video bitrate, ffmpeg syntax (e.g. `2500k`)
    pub video_bitrate: String,
    /// Audio bitrate, ffmpeg syntax (e.g. `128k`)
    pub audio_bitrate: String,
    pub temp_dir: PathBuf,
    /// Remove temp files after a successful job
    pub cleanup_temp_files: bool,
    /// Retry a failed stream-copy concat with a re-encoding one
    pub concat_reencode_fallback: bool,
    pub host_alias: Option<HostAlias>,
    /// Caption identity used when the request carries none
    pub default_identity: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_bucket: String::from("flow-app-media"),
            output_prefix: String::from("processed"),
            watermark_path: PathBuf::from("assets/watermark.png"),
            branding_clip_path: PathBuf::from("assets/branding.mp4"),
            font_path: None,
            fallback_fonts: DEFAULT_FALLBACK_FONTS.iter().map(PathBuf::from).collect(),
            supported_extensions: vec![".mp4".into(), ".mov".into(), ".avi".into()],
            outro_duration_secs: 1.0,
            watermark_size_percent: 10,
            watermark_opacity: 0.5,
            position_interval_secs: 2.0,
            placement: PlacementStrategy::Random,
            anchor_margin: 16,
            encoder_preset: String::from("ultrafast"),
            crf: 23,
            cache_enabled: true,
            cache_bust: false,
            max_height: 720,
            min_width: 320,
            max_width: 1280,
            video_bitrate: String::from("2500k"),
            audio_bitrate: String::from("128k"),
            temp_dir: env::temp_dir().join("vidmark"),
            cleanup_temp_files: true,
            concat_reencode_fallback: false,
            host_alias: None,
            default_identity: String::from("anonymous"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let host_alias = match (env::var("CDN_ALIAS_HOST"), env::var("CANONICAL_HOST")) {
            (Ok(alias), Ok(canonical)) if !alias.is_empty() && !canonical.is_empty() => {
                Some(HostAlias { alias, canonical })
            }
            _ => None,
        };

        let config = Self {
            output_bucket: env::var("OUTPUT_BUCKET").unwrap_or(defaults.output_bucket),
            output_prefix: env::var("OUTPUT_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.output_prefix),
            watermark_path: env::var("WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.watermark_path),
            branding_clip_path: env::var("BRANDING_CLIP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.branding_clip_path),
            font_path: env::var("FONT_PATH").ok().map(PathBuf::from),
            fallback_fonts: env::var("FALLBACK_FONTS")
                .map(|list| split_list(&list).into_iter().map(PathBuf::from).collect())
                .unwrap_or(defaults.fallback_fonts),
            supported_extensions: env::var("SUPPORTED_FORMATS")
                .map(|list| parse_extensions(&list))
                .unwrap_or(defaults.supported_extensions),
            outro_duration_secs: parsed("OUTRO_DURATION", defaults.outro_duration_secs)?,
            watermark_size_percent: parsed(
                "WATERMARK_SIZE_PERCENT",
                defaults.watermark_size_percent,
            )?,
            watermark_opacity: parsed("WATERMARK_OPACITY", defaults.watermark_opacity)?,
            position_interval_secs: parsed(
                "POSITION_CHANGE_INTERVAL",
                defaults.position_interval_secs,
            )?,
            placement: parsed("POSITION_STRATEGY", defaults.placement)?,
            anchor_margin: parsed("ANCHOR_MARGIN", defaults.anchor_margin)?,
            encoder_preset: env::var("FFMPEG_PRESET").unwrap_or(defaults.encoder_preset),
            crf: parsed("QUALITY_FACTOR", defaults.crf)?,
            cache_enabled: flag("CACHE_ENABLED", defaults.cache_enabled)?,
            cache_bust: flag("CACHE_BUST", defaults.cache_bust)?,
            max_height: parsed("TARGET_HEIGHT", defaults.max_height)?,
            min_width: parsed("MIN_WIDTH", defaults.min_width)?,
            max_width: parsed("MAX_WIDTH", defaults.max_width)?,
            video_bitrate: env::var("VIDEO_BITRATE").unwrap_or(defaults.video_bitrate),
            audio_bitrate: env::var("AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            cleanup_temp_files: flag("CLEANUP_TEMP_FILES", defaults.cleanup_temp_files)?,
            concat_reencode_fallback: flag(
                "CONCAT_REENCODE_FALLBACK",
                defaults.concat_reencode_fallback,
            )?,
            host_alias,
            default_identity: env::var("DEFAULT_USERNAME").unwrap_or(defaults.default_identity),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.watermark_opacity > 0.0 && self.watermark_opacity <= 1.0) {
            return Err(ConfigError::OutOfRange(format!(
                "WATERMARK_OPACITY must be in (0, 1], got {}",
                self.watermark_opacity
            )));
        }
        if !(self.position_interval_secs > 0.0) || !self.position_interval_secs.is_finite() {
            return Err(ConfigError::OutOfRange(
                "POSITION_CHANGE_INTERVAL must be positive".to_string(),
            ));
        }
        if !(self.outro_duration_secs > 0.0) || !self.outro_duration_secs.is_finite() {
            return Err(ConfigError::OutOfRange(
                "OUTRO_DURATION must be positive".to_string(),
            ));
        }
        if self.max_height < 2 {
            return Err(ConfigError::OutOfRange(
                "TARGET_HEIGHT must be at least 2".to_string(),
            ));
        }
        if self.min_width > self.max_width || self.max_width < 2 {
            return Err(ConfigError::OutOfRange(format!(
                "width band [{}, {}] is empty",
                self.min_width, self.max_width
            )));
        }
        if self.watermark_size_percent == 0 || self.watermark_size_percent > 100 {
            return Err(ConfigError::OutOfRange(
                "WATERMARK_SIZE_PERCENT must be within 1..=100".to_string(),
            ));
        }
        if self.supported_extensions.is_empty() {
            return Err(ConfigError::OutOfRange(
                "SUPPORTED_FORMATS must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_supported_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.supported_extensions.iter().any(|e| *e == ext)
    }
}

/// Configuration of the HTTP entrypoint.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Root directory for the filesystem storage backend
    pub storage_root: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("5001")),
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
        }
    }
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_bool(&value).ok_or(ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_extensions(list: &str) -> Vec<String> {
    split_list(list)
        .into_iter()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}
