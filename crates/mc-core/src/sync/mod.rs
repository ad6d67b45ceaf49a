//! Sync domain: content fingerprints, echo suppression and the application
//! payload envelope carried over open channels.

pub mod envelope;
pub mod fingerprint;
pub mod gate;

pub use envelope::{AppPayload, EnvelopeError};
pub use fingerprint::{ContentFingerprint, HashAlgorithm};
pub use gate::FingerprintGate;
