//! Content keys for cached metadata.

use sha2::{Digest, Sha256};

/// SHA-256 of `content` as 64 lowercase hex characters.
///
/// Stored configs are hashed as written, so two endpoints sharing the same
/// field-definition text share one cache entry.
pub fn content_key(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}
