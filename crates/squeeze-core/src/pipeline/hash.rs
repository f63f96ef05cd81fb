//! URL hashing for cache partitioning and deduplication.

use blake3::Hasher as Blake3Hasher;

/// Derives stable keys for remote images.
pub struct Hasher;

impl Hasher {
    /// Generate a BLAKE3 hex digest of a normalized source URL.
    ///
    /// The digest names the cache partition for the URL, so two records
    /// pointing at the same remote file share one download.
    pub fn url_hash(url: &str) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(url.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
