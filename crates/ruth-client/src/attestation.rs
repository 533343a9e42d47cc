//! The device-attestation collaborator boundary.
//!
//! spec.md treats the attestation provider as an external "verdict oracle":
//! only its interface is specified here. Real implementations are
//! platform-delegated (SafetyNet-style integrity APIs and the like) and are
//! out of scope for this core; we define the trait plus a deterministic
//! test double, mirroring how the teacher isolates small collaborator
//! interfaces behind traits (`ReceiptStore` in the prober crate).

/// An opaque, platform-issued integrity token. Its internal encoding is not
/// specified here — the gatekeeper only ever forwards it to the attestation
/// verdict oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestationToken(pub Vec<u8>);

/// Produces an attestation token binding a nonce (typically
/// `sha256_hex(signing_payload)`) to the current device/process integrity
/// state.
pub trait AttestationProvider {
    fn attest(&self, nonce_hex: &str) -> AttestationToken;
}

/// A deterministic test/dev implementation: the token is just the nonce
/// bytes prefixed with a fixed marker, so tests can assert end-to-end
/// without a real device integrity API.
pub struct MockAttestationProvider {
    marker: &'static [u8],
}

impl MockAttestationProvider {
    pub fn new() -> Self {
        MockAttestationProvider {
            marker: b"mock-attestation:",
        }
    }
}

impl Default for MockAttestationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationProvider for MockAttestationProvider {
    fn attest(&self, nonce_hex: &str) -> AttestationToken {
        let mut bytes = self.marker.to_vec();
        bytes.extend_from_slice(nonce_hex.as_bytes());
        AttestationToken(bytes)
    }
}
