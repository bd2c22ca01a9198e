//! URL-safe, unpadded Base64 — applied to every variable wire component
//! (spec §4.3 "Encoding"). `~` is deliberately excluded from this alphabet
//! so it can serve as the null-argument sentinel.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(text)
}
