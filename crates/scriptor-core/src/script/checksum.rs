//! Content checksums.

use sha2::{Digest, Sha256};

/// Compute the checksum of a script's exact byte content.
///
/// SHA-256, lowercase hex. No normalization is applied: a whitespace or
/// line-ending change produces a different checksum.
pub fn checksum(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(digest)
}
