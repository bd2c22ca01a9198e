//! Generic wire encoding/decoding (spec §4.4): owns the V2 canonical grammar
//! and the V1 legacy grammar, and the status-code semantics shared by both.

pub mod v1;
pub mod v2;

use crate::descriptor::{describe_params, MethodSignature, WireType};
use crate::error::{MapperError, ProtocolError, RpcError};
use crate::mapper::MapperRegistry;
use crate::security::{self, SecurityConfig};
use crate::status::Code;
use crate::value::Value;

/// The outcome a server-side pipeline hands to the codec to render as a
/// response frame (spec §4.4 `encodeResponse`).
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    Success(Value),
    Business { class: String, message: String },
    ServerError { class: String, message: String },
    ProtocolError { reason: String },
}

impl ResponseOutcome {
    pub fn status(&self) -> Code {
        match self {
            ResponseOutcome::Success(_) => Code::Success,
            ResponseOutcome::Business { .. } => Code::BusinessException,
            ResponseOutcome::ServerError { .. } => Code::ServerError,
            ResponseOutcome::ProtocolError { .. } => Code::ProtocolError,
        }
    }
}

impl From<&RpcError> for ResponseOutcome {
    fn from(err: &RpcError) -> Self {
        match err {
            RpcError::Business { class, message } => ResponseOutcome::Business {
                class: class.clone(),
                message: message.clone(),
            },
            RpcError::Server { class, message } => ResponseOutcome::ServerError {
                class: class.clone(),
                message: message.clone(),
            },
            other => ResponseOutcome::ProtocolError {
                reason: other.to_string(),
            },
        }
    }
}

/// `protocolVersion` (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// A fully-resolved method signature used when encoding a request: the
/// descriptor is derived from `params`, never supplied directly by the
/// caller, so `decodeRequest(encodeRequest(...))` always agrees (spec §8
/// invariant 1).
pub struct MethodRef<'a> {
    pub class: &'a str,
    pub method: &'a str,
    pub params: &'a [WireType],
}

impl<'a> MethodRef<'a> {
    pub fn descriptor(&self) -> String {
        describe_params(self.params)
    }

    pub fn meta(&self) -> String {
        format!("{}/{}{}", self.class, self.method, self.descriptor())
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature::new(self.method, self.params.to_vec())
    }
}

fn encode_body(value: &Value, mappers: &MapperRegistry) -> Result<String, MapperError> {
    mappers.encode(value)
}

pub(crate) fn wrap_b64(text: &str) -> String {
    format!("{{{{{}}}}}", security::b64_encode(text.as_bytes()))
}

pub(crate) fn unwrap_b64(token: &str) -> Result<String, ProtocolError> {
    let inner = token
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: token.to_string(),
            reason: "expected `{{...}}` wrapper".to_string(),
        })?;
    let bytes =
        security::b64_decode(inner).map_err(|e| ProtocolError::NotBase64(e.to_string()))?;
    String::from_utf8(bytes)
        .map_err(|e| ProtocolError::MalformedSegment {
            segment: token.to_string(),
            reason: format!("not valid UTF-8: {e}"),
        })
}

/// True if the null sentinel `~` applies to this raw parameter token.
pub(crate) fn is_null_token(raw: &str) -> bool {
    raw == "~"
}

pub(crate) fn security_ctx(config: &SecurityConfig) -> security::ProtocolSecurity<'_> {
    security::ProtocolSecurity::new(config)
}
