//! # Hashing Utilities
//!
//! BLAKE3 is the only hash in giftlock. It derives escrow identities today
//! and is the default for anything content-addressed tomorrow. If you need
//! SHA-256 for interop, add it here rather than sprinkling it elsewhere.

/// Hash several byte slices as one contiguous preimage without
/// concatenating them first.
pub fn blake3_hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    #[test]
    fn single_part_matches_plain_hash() {
        assert_eq!(blake3_hash_parts(&[&b"giftlock"[..]]), hash(b"giftlock"));
        assert_ne!(blake3_hash_parts(&[&b"giftlock"[..]]), hash(b"giftlocK"));
    }

    #[test]
    fn parts_match_concatenation() {
        let joined = hash(b"distributor\x00seed");
        let parts = blake3_hash_parts(&[&b"distributor"[..], &[0x00][..], &b"seed"[..]]);
        assert_eq!(joined, parts);
    }
}
