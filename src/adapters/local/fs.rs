use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Filesystem-backed storage: object `bucket/key` lives at `root/bucket/key`.
#[derive(Debug, Clone)]
pub struct FsAdapter {
    root: PathBuf,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    /// `object_path`, refusing bucket or key components that would leave the root.
    fn contained_path(&self, bucket: &str, key: &str) -> Result<PathBuf, String> {
        let relative = Path::new(bucket).join(key);
        if relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            Ok(self.root.join(relative))
        } else {
            Err(format!("object {}/{} is outside the storage root", bucket, key))
        }
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let source = self.contained_path(bucket, key)?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, local_path)
            .await
            .map_err(|e| format!("cannot read {}: {}", source.display(), e))?;
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let target = self.contained_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target).await?;
        debug!(target = %target.display(), "stored object");
        Ok(())
    }

    async fn find_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let (dir_key, name_prefix) = match prefix.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", prefix),
        };
        let dir = self.root.join(bucket).join(dir_key);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(name_prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names.into_iter().next().map(|name| {
            if dir_key.is_empty() {
                name
            } else {
                format!("{}/{}", dir_key, name)
            }
        }))
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("file://{}", self.object_path(bucket, key).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upload_then_download_round_trips_through_bucket_dirs() {
        let root = tempdir().unwrap();
        let adapter = FsAdapter::new(root.path());
        let local = root.path().join("local.mp4");
        std::fs::write(&local, b"frames").unwrap();

        adapter
            .upload(&local, "media", "processed/abc_with_outro.mp4")
            .await
            .unwrap();
        assert!(root.path().join("media/processed/abc_with_outro.mp4").exists());

        let copy = root.path().join("work/copy.mp4");
        adapter
            .download("media", "processed/abc_with_outro.mp4", &copy)
            .await
            .unwrap();
        assert_eq!(std::fs::read(copy).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn missing_object_is_an_error() {
        let root = tempdir().unwrap();
        let adapter = FsAdapter::new(root.path());
        let err = adapter
            .download("media", "nope.mp4", &root.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope.mp4"));
    }

    #[tokio::test]
    async fn prefix_lookup_matches_on_file_name() {
        let root = tempdir().unwrap();
        let adapter = FsAdapter::new(root.path());
        let dir = root.path().join("media/processed");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("abc_with_outro.mp4"), b"").unwrap();
        std::fs::write(dir.join("abd_with_outro.mp4"), b"").unwrap();

        assert_eq!(
            adapter.find_by_prefix("media", "processed/abc_").await.unwrap(),
            Some("processed/abc_with_outro.mp4".to_string())
        );
        assert_eq!(
            adapter.find_by_prefix("media", "processed/zzz_").await.unwrap(),
            None
        );
        assert_eq!(
            adapter.find_by_prefix("other", "processed/abc_").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn keys_outside_the_root_are_refused() {
        let root = tempdir().unwrap();
        let storage = root.path().join("storage");
        std::fs::create_dir_all(storage.join("media")).unwrap();
        std::fs::write(root.path().join("secret.mp4"), b"private").unwrap();
        let adapter = FsAdapter::new(&storage);

        for key in ["../../secret.mp4", "/secret.mp4", "a/../../../secret.mp4"] {
            let err = adapter
                .download("media", key, &root.path().join("out.mp4"))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("outside the storage root"), "{}", key);
        }
        assert!(!root.path().join("out.mp4").exists());

        let local = root.path().join("local.mp4");
        std::fs::write(&local, b"frames").unwrap();
        assert!(adapter.upload(&local, "..", "escape.mp4").await.is_err());
        assert!(!root.path().join("escape.mp4").exists());
    }

    #[test]
    fn urls_point_at_the_file() {
        let adapter = FsAdapter::new("/srv/storage");
        assert_eq!(
            adapter.object_url("media", "processed/a.mp4"),
            "file:///srv/storage/media/processed/a.mp4"
        );
    }
}
