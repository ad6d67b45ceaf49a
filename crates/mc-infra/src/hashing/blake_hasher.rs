use anyhow::Result;
use mc_core::ports::ContentHashPort;
use mc_core::ContentFingerprint;

pub struct Blake3Hasher;

impl ContentHashPort for Blake3Hasher {
    fn fingerprint(&self, bytes: &[u8]) -> Result<ContentFingerprint> {
        let hash = blake3::hash(bytes);
        Ok(ContentFingerprint::blake3(hash.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_same_fingerprint() {
        let a = Blake3Hasher.fingerprint(b"clipboard text").unwrap();
        let b = Blake3Hasher.fingerprint(b"clipboard text").unwrap();
        let c = Blake3Hasher.fingerprint(b"clipboard text!").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hex_matches_blake3_digest() {
        let fp = Blake3Hasher.fingerprint(b"abc").unwrap();
        assert_eq!(fp.to_hex(), blake3::hash(b"abc").to_hex().to_string());
        assert_eq!(fp.to_hex().len(), 64);
    }
}
