//! SecurityConfig + ProtocolSecurity (spec §4.3): Base64 framing, checksum
//! and signature enforcement, and class/method validation + whitelisting.

mod base64url;
mod checksum;
mod signature;
mod validate;

pub use base64url::{decode as b64_decode, encode as b64_encode};
pub use checksum::ChecksumAlgorithm;
pub use signature::{SignatureHandler, SignatureScheme};
pub use validate::{is_valid_class_name, is_valid_method_name};

use crate::error::SecurityError;
use std::collections::HashSet;

/// Optional allow-list of fully-qualified class names permitted in a
/// request's META (spec §4.3 `classWhitelist`).
#[derive(Clone, Debug, Default)]
pub enum Whitelist {
    #[default]
    Disabled,
    Enabled(HashSet<String>),
}

impl Whitelist {
    pub fn enabled(classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Whitelist::Enabled(classes.into_iter().map(Into::into).collect())
    }

    pub fn check(&self, class_name: &str) -> Result<(), SecurityError> {
        match self {
            Whitelist::Disabled => Ok(()),
            Whitelist::Enabled(allowed) => {
                if allowed.contains(class_name) {
                    Ok(())
                } else {
                    Err(SecurityError::NotWhitelisted(class_name.to_string()))
                }
            }
        }
    }
}

/// Process-owned security configuration; see SPEC_FULL.md §5 for the
/// "replaced atomically, readers never observe a torn value" requirement,
/// realized by [`crate::server::ServerHandle::set_security_config`] storing
/// this behind an `Arc<RwLock<_>>`.
#[derive(Clone)]
pub struct SecurityConfig {
    pub checksum: ChecksumAlgorithm,
    pub signature: SignatureScheme,
    pub whitelist: Whitelist,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumAlgorithm::None,
            signature: SignatureScheme::None,
            whitelist: Whitelist::Disabled,
        }
    }
}

/// Stateless helper bundling the checksum/signature operations a codec
/// needs, driven by a [`SecurityConfig`] snapshot.
pub struct ProtocolSecurity<'a> {
    config: &'a SecurityConfig,
}

impl<'a> ProtocolSecurity<'a> {
    pub fn new(config: &'a SecurityConfig) -> Self {
        Self { config }
    }

    /// Appends `|CHK:<hex>` (if enabled) then `|SIG:<algo>:<b64>` (if
    /// enabled, computed over the content *with* the checksum segment
    /// already appended) to `frame`.
    pub fn append_trailers(&self, mut frame: String) -> Result<String, SecurityError> {
        if self.config.checksum.is_enabled() {
            let digest = self.config.checksum.compute(&frame)?;
            frame = format!("{frame}|CHK:{digest}");
        }
        if self.config.signature.is_enabled() {
            let sig = self.config.signature.sign(&frame)?;
            frame = format!(
                "{frame}|SIG:{}:{}",
                self.config.signature.algo_name(),
                b64_encode(sig)
            );
        }
        Ok(frame)
    }

    /// Strips and verifies `|SIG:` then `|CHK:` suffixes from `frame`,
    /// returning the remaining content with both trailers removed.
    pub fn strip_and_verify_trailers<'b>(&self, frame: &'b str) -> Result<&'b str, SecurityError> {
        let mut remaining = frame;

        if self.config.signature.is_enabled() {
            let (content, sig_segment) =
                split_last_segment(remaining, "|SIG:").ok_or(SecurityError::SignatureMissing)?;
            let mut parts = sig_segment.splitn(2, ':');
            let _algo = parts.next().unwrap_or_default();
            let sig_b64 = parts.next().ok_or(SecurityError::SignatureInvalid)?;
            let sig_bytes =
                b64_decode(sig_b64).map_err(|_| SecurityError::SignatureInvalid)?;
            self.config.signature.verify(content, &sig_bytes)?;
            remaining = content;
        }

        if self.config.checksum.is_enabled() {
            let (content, digest) =
                split_last_segment(remaining, "|CHK:").ok_or(SecurityError::ChecksumMismatch)?;
            self.config.checksum.verify(content, digest)?;
            remaining = content;
        }

        Ok(remaining)
    }
}

fn split_last_segment<'a>(frame: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let idx = frame.rfind(tag)?;
    let (content, rest) = frame.split_at(idx);
    Some((content, &rest[tag.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_disabled_allows_anything() {
        let w = Whitelist::Disabled;
        assert!(w.check("anything.AtAll").is_ok());
    }

    #[test]
    fn whitelist_enabled_rejects_unlisted_class() {
        let w = Whitelist::enabled(["demo.Allowed"]);
        assert!(w.check("demo.Allowed").is_ok());
        assert!(w.check("demo.Forbidden").is_err());
    }

    #[test]
    fn append_then_strip_round_trips_with_checksum_only() {
        let config = SecurityConfig {
            checksum: ChecksumAlgorithm::Crc32,
            ..Default::default()
        };
        let sec = ProtocolSecurity::new(&config);
        let framed = sec.append_trailers("V2|0|abc".to_string()).unwrap();
        assert!(framed.contains("|CHK:"));
        let stripped = sec.strip_and_verify_trailers(&framed).unwrap();
        assert_eq!(stripped, "V2|0|abc");
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let config = SecurityConfig {
            checksum: ChecksumAlgorithm::HmacSha256 {
                secret: b"s1".to_vec(),
            },
            ..Default::default()
        };
        let sec = ProtocolSecurity::new(&config);
        let framed = sec.append_trailers("V2|0|abc".to_string()).unwrap();
        let tampered = framed.replace("V2|0|abc", "V2|0|abd");
        assert!(sec.strip_and_verify_trailers(&tampered).is_err());
    }
}
