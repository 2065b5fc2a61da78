use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Download an object from storage to a local path
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Upload a file from a local path to storage
    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Key of the first listed object starting with `prefix`, if any.
    /// Listing order is whatever the backend returns.
    async fn find_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>>;

    /// Public location of an object
    fn object_url(&self, bucket: &str, key: &str) -> String;
}
