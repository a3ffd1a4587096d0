//! Blob storage for uploaded documents.
//!
//! Files land under `{data_dir}/{user_id}/{task_id}/{role}/{filename}`.
//! Path components are sanitized so a crafted filename cannot escape the
//! namespace.

use review_core::{DocumentRole, ReviewError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Filesystem-backed blob store.
pub struct BlobStorage {
    root: PathBuf,
}

impl BlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_dir(&self, user_id: &str, task_id: &str, role: DocumentRole) -> PathBuf {
        self.root
            .join(sanitize(user_id))
            .join(sanitize(task_id))
            .join(role.as_str())
    }

    /// Store a blob, replacing any previous document of the same role.
    pub async fn put(
        &self,
        user_id: &str,
        task_id: &str,
        role: DocumentRole,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.blob_dir(user_id, task_id, role);
        // One document per role: wipe the role directory first.
        if fs::metadata(&dir).await.is_ok() {
            fs::remove_dir_all(&dir)
                .await
                .map_err(|e| ReviewError::Internal(format!("storage cleanup failed: {e}")))?;
        }
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReviewError::Internal(format!("storage mkdir failed: {e}")))?;

        let path = dir.join(sanitize(filename));
        fs::write(&path, bytes)
            .await
            .map_err(|e| ReviewError::Internal(format!("storage write failed: {e}")))?;
        debug!(path = %path.display(), bytes = bytes.len(), "blob stored");
        Ok(path)
    }

    /// Read a blob back; `None` when absent.
    pub async fn get(
        &self,
        user_id: &str,
        task_id: &str,
        role: DocumentRole,
        filename: &str,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.blob_dir(user_id, task_id, role).join(sanitize(filename));
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReviewError::Internal(format!("storage read failed: {e}"))),
        }
    }

    /// Remove everything stored for a task.
    pub async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        let dir = self.root.join(sanitize(user_id)).join(sanitize(task_id));
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReviewError::Internal(format!("storage delete failed: {e}"))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep only path-safe characters; anything else becomes `_`.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = BlobStorage::new(dir.path());

        storage
            .put("u1", "t1", DocumentRole::Primary, "contract.txt", b"1.1 Terms\n")
            .await
            .unwrap();
        let bytes = storage
            .get("u1", "t1", DocumentRole::Primary, "contract.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"1.1 Terms\n");
        assert!(storage
            .get("u1", "t1", DocumentRole::Primary, "other.txt")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn same_role_upload_replaces() {
        let dir = tempdir().unwrap();
        let storage = BlobStorage::new(dir.path());

        storage
            .put("u1", "t1", DocumentRole::Primary, "first.txt", b"a")
            .await
            .unwrap();
        storage
            .put("u1", "t1", DocumentRole::Primary, "second.txt", b"b")
            .await
            .unwrap();

        assert!(storage
            .get("u1", "t1", DocumentRole::Primary, "first.txt")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .get("u1", "t1", DocumentRole::Primary, "second.txt")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn traversal_components_are_neutralized() {
        let dir = tempdir().unwrap();
        let storage = BlobStorage::new(dir.path());

        let path = storage
            .put("u1", "t1", DocumentRole::Reference, "../../etc/passwd", b"x")
            .await
            .unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(!path.to_string_lossy().contains(".."));
    }

    #[tokio::test]
    async fn delete_task_cascades() {
        let dir = tempdir().unwrap();
        let storage = BlobStorage::new(dir.path());
        storage
            .put("u1", "t1", DocumentRole::Primary, "c.txt", b"x")
            .await
            .unwrap();
        storage.delete_task("u1", "t1").await.unwrap();
        assert!(storage
            .get("u1", "t1", DocumentRole::Primary, "c.txt")
            .await
            .unwrap()
            .is_none());
        // Deleting twice is fine.
        storage.delete_task("u1", "t1").await.unwrap();
    }
}
