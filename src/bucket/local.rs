use super::{ObjectInfo, ObjectStore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Directory-backed object store
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    name: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { root: root.into(), name: name.into() }
    }

    /// Resolve a key to a path inside the root, rejecting `..` and absolute keys
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();

        let objects = tokio::task::spawn_blocking(move || -> Result<Vec<ObjectInfo>> {
            if !root.exists() {
                return Ok(Vec::new());
            }

            let mut objects = Vec::new();
            for entry in ::ignore::WalkBuilder::new(&root)
                .standard_filters(false)
                .build()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            {
                let Some(key) = key_for(&root, entry.path()) else { continue };
                if !key.starts_with(&prefix) {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                objects.push(ObjectInfo { key, size, etag: None });
            }

            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(objects)
        })
        .await??;

        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(key.to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.resolve(key)?;
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

    #[tokio::test]
    async fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "docs");

        store.put("b.txt", b"beta".to_vec(), "text/plain").await.unwrap();
        store.put("nested/a.md", b"# alpha".to_vec(), "text/markdown").await.unwrap();

        let listed = store.list("").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["b.txt", "nested/a.md"]);
        assert_eq!(listed[0].size, 4);

        assert_eq!(store.get("nested/a.md").await.unwrap(), b"# alpha");
        assert_eq!(store.list("nested/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "docs");
        assert!(matches!(store.get("nope.txt").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "docs");
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("/abs.txt", vec![], "text/plain").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("absent"), "docs");
        assert!(store.list("").await.unwrap().is_empty());
    }
}
