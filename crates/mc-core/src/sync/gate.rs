use super::ContentFingerprint;

/// Process-global "last applied" fingerprint.
///
/// A remote update written to the local clipboard is re-observed by the next
/// poll as a local change. Recording it here first turns that observation
/// into a no-op, so updates never bounce between peers.
#[derive(Debug, Default)]
pub struct FingerprintGate {
    last_applied: Option<ContentFingerprint>,
}

impl FingerprintGate {
    pub fn new() -> Self {
        Self { last_applied: None }
    }

    /// Local sample. Returns `true` (and records it) when it should be broadcast.
    pub fn observe_local(&mut self, fingerprint: ContentFingerprint) -> bool {
        if self.is_current(&fingerprint) {
            return false;
        }
        self.record(fingerprint);
        true
    }

    /// Whether `fingerprint` is what was last observed or applied.
    pub fn is_current(&self, fingerprint: &ContentFingerprint) -> bool {
        self.last_applied.as_ref() == Some(fingerprint)
    }

    /// Record a fingerprint without a check, e.g. after a successful write.
    pub fn record(&mut self, fingerprint: ContentFingerprint) {
        self.last_applied = Some(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(b: u8) -> ContentFingerprint {
        ContentFingerprint::blake3([b; 32])
    }

    #[test]
    fn test_first_local_sample_is_broadcast() {
        let mut gate = FingerprintGate::new();
        assert!(gate.observe_local(fp(1)));
        assert!(!gate.observe_local(fp(1)));
    }

    #[test]
    fn test_applied_remote_content_is_not_echoed() {
        let mut gate = FingerprintGate::new();
        assert!(!gate.is_current(&fp(7)));
        gate.record(fp(7));
        assert!(!gate.observe_local(fp(7)));
        assert!(gate.is_current(&fp(7)));
    }

    #[test]
    fn test_content_already_held_is_current() {
        let mut gate = FingerprintGate::new();
        assert!(gate.observe_local(fp(3)));
        assert!(gate.is_current(&fp(3)));
        assert!(!gate.is_current(&fp(4)));
        assert!(gate.observe_local(fp(4)));
        assert!(!gate.is_current(&fp(3)));
    }

    #[test]
    fn test_record_suppresses_next_local_sample() {
        let mut gate = FingerprintGate::new();
        assert!(!gate.is_current(&fp(9)));
        gate.record(fp(9));
        assert!(gate.is_current(&fp(9)));
        assert!(!gate.observe_local(fp(9)));
    }
}
