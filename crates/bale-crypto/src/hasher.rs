/// Domain-separated BLAKE3 digest for item addressing.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so identical input bytes hashed under different domains
/// produce unrelated digests.
pub struct AddressHasher {
    domain: &'static str,
}

impl AddressHasher {
    /// Hasher used to address items onto buckets.
    pub const ITEM: Self = Self {
        domain: "bale-item-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// 256-bit digest of an identifier with domain separation.
    pub fn digest(&self, id: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Raw BLAKE3 hash without domain separation (for low-level use).
    pub fn raw_digest(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let d1 = AddressHasher::ITEM.digest("alice");
        let d2 = AddressHasher::ITEM.digest("alice");
        assert_eq!(d1, d2);
    }

    #[test]
    fn different_ids_produce_different_digests() {
        let d1 = AddressHasher::ITEM.digest("alice");
        let d2 = AddressHasher::ITEM.digest("bob");
        assert_ne!(d1, d2);
    }

    #[test]
    fn different_domains_produce_different_digests() {
        let custom = AddressHasher::new("bale-other-v1");
        assert_ne!(AddressHasher::ITEM.digest("alice"), custom.digest("alice"));
    }

    #[test]
    fn raw_digest_has_no_domain() {
        let raw = AddressHasher::raw_digest(b"alice");
        assert_ne!(raw, AddressHasher::ITEM.digest("alice"));
    }

    #[test]
    fn domain_is_exposed() {
        assert_eq!(AddressHasher::ITEM.domain(), "bale-item-v1");
    }
}
