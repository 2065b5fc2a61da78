use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::error::Error;
use std::path::Path;
use tracing::debug;

/// S3Adapter implements StoragePort for AWS S3.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
}

impl S3Adapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

fn content_type(key: &str) -> &'static str {
    let ext = Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl StoragePort for S3Adapter {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| format!("get s3://{}/{}: {}", bucket, key, DisplayErrorContext(e)))?;

        let mut body = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(local_path).await?;
        let bytes = tokio::io::copy(&mut body, &mut file).await?;
        debug!(bucket, key, bytes, "downloaded object");
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let body = ByteStream::from_path(local_path).await?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type(key))
            .body(body)
            .send()
            .await
            .map_err(|e| format!("put s3://{}/{}: {}", bucket, key, DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn find_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| format!("list s3://{}/{}: {}", bucket, prefix, DisplayErrorContext(e)))?;

        Ok(resp
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .next()
            .map(str::to_string))
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type("processed/a_with_outro.mp4"), "video/mp4");
        assert_eq!(content_type("processed/a_with_outro.MOV"), "video/quicktime");
        assert_eq!(content_type("processed/a"), "application/octet-stream");
    }
}
