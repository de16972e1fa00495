//! Attachment storage for account requests and credentials.
//!
//! Requests and accepted credentials use two separate storage areas; an
//! attachment is stored under a content-hash key so identical re-uploads
//! deduplicate, and migrates from the request area to the credential area
//! when a request is accepted.

use std::path::PathBuf;

use crate::{AppError, AppResult};
use sha2::{Digest, Sha256};

/// Storage backend for request/credential attachments.
#[async_trait::async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store raw bytes under the given key.
    async fn put(&self, key: &str, data: &[u8]) -> AppResult<()>;

    /// Read the bytes stored under a key.
    async fn read(&self, key: &str) -> AppResult<Vec<u8>>;

    /// Delete a file. Absent keys are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem attachment storage.
pub struct LocalAttachmentStore {
    base_path: PathBuf,
}

impl LocalAttachmentStore {
    /// Create a new local storage area rooted at `base_path`.
    #[must_use]
    pub const fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(rel_path_from_key(key))
    }
}

#[async_trait::async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))
    }

    async fn read(&self, key: &str) -> AppResult<Vec<u8>> {
        tokio::fs::read(self.path_for(key))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read file: {e}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.path_for(key).exists())
    }
}

/// Compute the storage key for attachment content: `<sha256-hex>.<ext>`.
#[must_use]
pub fn content_key(data: &[u8], extension: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{}.{}", hex::encode(hasher.finalize()), extension)
}

/// Shard a content key into a relative path, `ab/abc/<key>`.
///
/// Keys are hex-prefixed, so two shard levels keep directories small.
#[must_use]
pub fn rel_path_from_key(key: &str) -> String {
    if key.len() < 3 {
        return key.to_string();
    }
    format!("{}/{}/{}", &key[..2], &key[..3], key)
}

/// Verify that file content plausibly matches its claimed extension.
///
/// Recognized binary formats must carry their magic bytes; text formats must
/// not contain NUL bytes. Unrecognized extensions pass, matching the original
/// "reject only what we can positively identify as wrong" behavior.
#[must_use]
pub fn verify_attachment(data: &[u8], extension: &str) -> bool {
    if data.is_empty() {
        return false;
    }

    match extension.to_ascii_lowercase().as_str() {
        "pdf" => data.starts_with(b"%PDF"),
        "rtf" => data.starts_with(b"{\\rtf"),
        // Legacy OLE container, or a zip for the OOXML/ODF variants.
        "doc" => data.starts_with(&[0xd0, 0xcf, 0x11, 0xe0]) || data.starts_with(b"PK"),
        "sxw" | "odt" | "docx" => data.starts_with(b"PK"),
        "png" => data.starts_with(&[0x89, b'P', b'N', b'G']),
        "jpg" | "jpeg" => data.starts_with(&[0xff, 0xd8, 0xff]),
        "gif" => data.starts_with(b"GIF8"),
        "txt" | "text" | "latex" | "tex" | "wp" | "wpd" => {
            !data.iter().take(1024).any(|&b| b == 0)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalAttachmentStore {
        let dir = std::env::temp_dir().join(format!("vestibule-test-{}", crate::id::generate_id()));
        LocalAttachmentStore::new(dir)
    }

    #[test]
    fn test_content_key() {
        let key = content_key(b"hello", "pdf");
        assert!(key.ends_with(".pdf"));
        assert_eq!(key.len(), 64 + 4);
        // Same content, same key.
        assert_eq!(key, content_key(b"hello", "pdf"));
    }

    #[test]
    fn test_rel_path_from_key() {
        let path = rel_path_from_key("abcdef.pdf");
        assert_eq!(path, "ab/abc/abcdef.pdf");
        assert_eq!(rel_path_from_key("ab"), "ab");
    }

    #[test]
    fn test_verify_attachment() {
        assert!(verify_attachment(b"%PDF-1.4 rest", "pdf"));
        assert!(!verify_attachment(b"MZ not a pdf", "pdf"));
        assert!(verify_attachment(b"{\\rtf1 hello}", "rtf"));
        assert!(verify_attachment(b"plain words", "txt"));
        assert!(!verify_attachment(b"bin\0ary", "txt"));
        assert!(!verify_attachment(b"", "txt"));
        // Unknown extensions are not rejected.
        assert!(verify_attachment(b"anything", "xyz"));
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let store = temp_store();
        let key = content_key(b"attachment body", "txt");

        store.put(&key, b"attachment body").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap(), b"attachment body");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        // Deleting an absent key is fine.
        store.delete(&key).await.unwrap();
    }
}
