use crate::error::BlobError;

/// Metadata for a stored blob.
#[derive(Debug, Clone)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
}

/// BlobStore provides durable storage for binary artifacts (batch sticker
/// sheets, certificate documents).
///
/// Keys are path-like strings: `batches/A1B2C.pdf`, `certificates/MH01X.pdf`.
/// `put` returns the public URL under which the artifact is reachable —
/// the issuance core persists only that URL, never the bytes. The default
/// implementation (`FileStore`) maps keys to local filesystem paths and a
/// configured base URL. Can be swapped for S3/OSS backends by implementing
/// this trait.
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its public URL. Overwrites if the key
    /// already exists.
    fn put(&self, key: &str, data: &[u8]) -> Result<String, BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if the key does not exist.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Check whether a blob exists.
    fn exists(&self, key: &str) -> Result<bool, BlobError>;

    /// List blobs matching a key prefix. Returns metadata sorted by key.
    fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, BlobError>;

    /// The public URL a key is (or would be) served under.
    fn url_for(&self, key: &str) -> String;
}
