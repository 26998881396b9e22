//! Filesystem-backed object store.
//!
//! Objects live at `root/<bucket>/<key>`. Keys may contain slashes, which map
//! to subdirectories created on demand.

use super::ObjectStore;
use crate::error::{GantryError, Result};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Object store rooted at a local directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_component(bucket)?;
        validate_component(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

/// Reject names that would escape the store root.
fn validate_component(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GantryError::Storage("empty object name".to_string()));
    }
    let path = Path::new(name);
    if path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(GantryError::Storage(format!(
            "object name escapes store root: {name}"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ObjectStore for FsStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, store) = store();
        store.put("b", "photos/cat.png", vec![9, 9]).await.unwrap();
        assert_eq!(
            store.get("b", "photos/cat.png").await.unwrap(),
            Some(vec![9, 9])
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("b", "absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (_dir, store) = store();
        assert!(store.put("b", "../outside", vec![1]).await.is_err());
        assert!(store.put("b", "/etc/passwd", vec![1]).await.is_err());
        assert!(store.get("..", "k").await.is_err());
    }
}
