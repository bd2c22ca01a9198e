//! Checksum computation/verification (spec §4.3). Computed over the full
//! message string *without* the `|CHK:` and `|SIG:` segments; hex-encoded
//! lowercase; verified with constant-time equality.

use crate::error::SecurityError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// The checksum algorithm in effect for a [`super::SecurityConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    None,
    Crc32,
    HmacSha256 { secret: Vec<u8> },
}

impl ChecksumAlgorithm {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ChecksumAlgorithm::None)
    }

    /// Name for logging; never includes the `secret` field.
    fn kind_name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::None => "none",
            ChecksumAlgorithm::Crc32 => "crc32",
            ChecksumAlgorithm::HmacSha256 { .. } => "hmac-sha256",
        }
    }

    /// Computes the lowercase hex digest for `content`.
    pub fn compute(&self, content: &str) -> Result<String, SecurityError> {
        match self {
            ChecksumAlgorithm::None => Ok(String::new()),
            ChecksumAlgorithm::Crc32 => {
                let digest = crc32fast::hash(content.as_bytes());
                Ok(format!("{digest:08x}"))
            }
            ChecksumAlgorithm::HmacSha256 { secret } => {
                if secret.is_empty() {
                    return Err(SecurityError::MissingSecret);
                }
                let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                    .map_err(|_| SecurityError::MissingSecret)?;
                mac.update(content.as_bytes());
                Ok(hex::encode(mac.finalize().into_bytes()))
            }
        }
    }

    /// Verifies `content` against a hex digest received on the wire, in
    /// constant time for the cryptographic algorithm.
    pub fn verify(&self, content: &str, received_hex: &str) -> Result<(), SecurityError> {
        let expected = self.compute(content)?;
        let matches = match self {
            ChecksumAlgorithm::HmacSha256 { .. } => {
                constant_time_eq(expected.as_bytes(), received_hex.as_bytes())
            }
            _ => expected == received_hex,
        };
        if matches {
            Ok(())
        } else {
            tracing::warn!(algo = self.kind_name(), "checksum verification failed");
            Err(SecurityError::ChecksumMismatch)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.ct_eq(b).into()
}
