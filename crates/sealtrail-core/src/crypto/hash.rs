//! Domain-tagged Blake3 hashing.

/// Size of a Blake3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Hasher producing domain-separated Blake3 digests.
///
/// Uses Blake3's key-derivation mode with a static context string per
/// domain. Two digests computed under different tags are unrelated even for
/// identical content.
pub struct TaggedHasher {
    inner: blake3::Hasher,
}

impl TaggedHasher {
    /// Tag for contract identifiers (genesis commitments).
    pub const CONTRACT_TAG: &'static str = "sealtrail 2026 contract id v1";
    /// Tag for operation identifiers.
    pub const OPERATION_TAG: &'static str = "sealtrail 2026 operation id v1";
    /// Tag for schema identifiers.
    pub const SCHEMA_TAG: &'static str = "sealtrail 2026 schema id v1";
    /// Tag for multi-protocol commitment leaves.
    pub const MPC_LEAF_TAG: &'static str = "sealtrail 2026 mpc leaf v1";
    /// Tag for multi-protocol commitment inner nodes.
    pub const MPC_NODE_TAG: &'static str = "sealtrail 2026 mpc node v1";

    /// Starts a new hasher under the given domain tag.
    #[must_use]
    pub fn new(tag: &'static str) -> Self {
        Self {
            inner: blake3::Hasher::new_derive_key(tag),
        }
    }

    /// Feeds bytes into the hasher.
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    /// Finalizes the digest.
    #[must_use]
    pub fn finalize(&self) -> Hash {
        *self.inner.finalize().as_bytes()
    }

    /// One-shot hash of `content` under `tag`.
    #[must_use]
    pub fn hash(tag: &'static str, content: &[u8]) -> Hash {
        let mut hasher = Self::new(tag);
        hasher.update(content);
        hasher.finalize()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = TaggedHasher::hash(TaggedHasher::OPERATION_TAG, b"content");
        let b = TaggedHasher::hash(TaggedHasher::OPERATION_TAG, b"content");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_SIZE);
    }

    #[test]
    fn test_tags_separate_domains() {
        let op = TaggedHasher::hash(TaggedHasher::OPERATION_TAG, b"content");
        let contract = TaggedHasher::hash(TaggedHasher::CONTRACT_TAG, b"content");
        assert_ne!(op, contract);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = TaggedHasher::new(TaggedHasher::SCHEMA_TAG);
        hasher.update(b"con").update(b"tent");
        assert_eq!(
            hasher.finalize(),
            TaggedHasher::hash(TaggedHasher::SCHEMA_TAG, b"content")
        );
    }
}
