//! Origin signing (spec §4.3): computed over the payload that would be on
//! the wire *including* `|CHK:…` but excluding `|SIG:…`. Either a built-in
//! RSA-SHA256 scheme or a user-supplied "SPI" handler (spec Design Note #3
//! keeps the mapper surface to two methods; the signature SPI mirrors that
//! shape: `sign`/`verify`).

use crate::error::SecurityError;
use std::sync::Arc;

/// A pluggable signature handler, named by `algo` on the wire
/// (`SIG:<algo>:<base64>`).
pub trait SignatureHandler: Send + Sync {
    fn algo_name(&self) -> &str;
    fn sign(&self, content: &str) -> Result<Vec<u8>, SecurityError>;
    fn verify(&self, content: &str, signature: &[u8]) -> Result<(), SecurityError>;
}

/// The signature scheme in effect for a [`super::SecurityConfig`].
#[derive(Clone)]
pub enum SignatureScheme {
    None,
    #[cfg(feature = "signature")]
    RsaSha256(Arc<RsaSha256>),
    Custom(Arc<dyn SignatureHandler>),
}

impl SignatureScheme {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SignatureScheme::None)
    }

    pub fn algo_name(&self) -> &str {
        match self {
            SignatureScheme::None => "",
            #[cfg(feature = "signature")]
            SignatureScheme::RsaSha256(_) => "RSA-SHA256",
            SignatureScheme::Custom(h) => h.algo_name(),
        }
    }

    pub fn sign(&self, content: &str) -> Result<Vec<u8>, SecurityError> {
        match self {
            SignatureScheme::None => Err(SecurityError::MissingKey),
            #[cfg(feature = "signature")]
            SignatureScheme::RsaSha256(inner) => inner.sign(content),
            SignatureScheme::Custom(h) => h.sign(content),
        }
    }

    pub fn verify(&self, content: &str, signature: &[u8]) -> Result<(), SecurityError> {
        let result = match self {
            SignatureScheme::None => Err(SecurityError::MissingKey),
            #[cfg(feature = "signature")]
            SignatureScheme::RsaSha256(inner) => inner.verify(content, signature),
            SignatureScheme::Custom(h) => h.verify(content, signature),
        };
        if let Err(e) = &result {
            tracing::warn!(algo = self.algo_name(), error = %e, "signature verification failed");
        }
        result
    }
}

#[cfg(feature = "signature")]
pub struct RsaSha256 {
    signing_key: Option<rsa::pkcs1v15::SigningKey<sha2::Sha256>>,
    verifying_key: Option<rsa::pkcs1v15::VerifyingKey<sha2::Sha256>>,
}

#[cfg(feature = "signature")]
impl RsaSha256 {
    /// Signing requires this side's private key; verifying requires the
    /// peer's public key. Either or both may be supplied depending on
    /// whether this side is a client (signs) or server (verifies), or both
    /// in a mutually-authenticated setup.
    pub fn new(
        private_key: Option<rsa::RsaPrivateKey>,
        public_key: Option<rsa::RsaPublicKey>,
    ) -> Self {
        Self {
            signing_key: private_key.map(rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new),
            verifying_key: public_key.map(rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new),
        }
    }

    fn sign(&self, content: &str) -> Result<Vec<u8>, SecurityError> {
        use rsa::signature::{RandomizedSigner, SignatureEncoding};
        let key = self.signing_key.as_ref().ok_or(SecurityError::MissingKey)?;
        let mut rng = rand::thread_rng();
        let sig = key.sign_with_rng(&mut rng, content.as_bytes());
        Ok(sig.to_vec())
    }

    fn verify(&self, content: &str, signature: &[u8]) -> Result<(), SecurityError> {
        use rsa::signature::Verifier;
        let key = self
            .verifying_key
            .as_ref()
            .ok_or(SecurityError::MissingKey)?;
        let sig = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|_| SecurityError::SignatureInvalid)?;
        key.verify(content.as_bytes(), &sig)
            .map_err(|_| SecurityError::SignatureInvalid)
    }
}
