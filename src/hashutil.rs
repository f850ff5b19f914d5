//! Deterministic hashing for load smoothing (§4.10) and spread-evenly
//! campaign dates (§4.4).
//!
//! Both call sites need a hash that is stable across process restarts and
//! Rust versions — `std::collections::hash_map::DefaultHasher` is seeded
//! randomly per-process and is unsuitable. SHA-256 (already used
//! elsewhere in this codebase for content hashing) gives us that for
//! free.

use sha2::{Digest, Sha256};

/// Hashes the given parts (joined with `:`) to a `u64`, taking the first
/// 8 bytes of the SHA-256 digest as a big-endian integer.
pub fn deterministic_hash(parts: &[&str]) -> u64 {
    let joined = parts.join(":");
    let digest = Sha256::digest(joined.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = deterministic_hash(&["42", "ed", "2025"]);
        let b = deterministic_hash(&["42", "ed", "2025"]);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_input() {
        let a = deterministic_hash(&["42", "ed", "2025"]);
        let b = deterministic_hash(&["43", "ed", "2025"]);
        assert_ne!(a, b);
    }
}
