//! Content hasher (C1). A pure function: no state, no I/O.

use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, rendered as 64 lowercase hex characters.
pub fn hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// `idempotencyKey(bookId, hash) = "<bookId>:<hash>"`.
pub fn idempotency_key(book_id: u64, content_hash: &str) -> String {
    format!("{book_id}:{content_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"hello world");
        let b = hash(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_input() {
        assert_ne!(hash(b"a"), hash(b"b"));
    }

    #[test]
    fn idempotency_key_format() {
        assert_eq!(idempotency_key(42, "abc"), "42:abc");
    }
}
