//! The legacy V1 wire grammar (spec §4.4), retained for compatibility:
//!
//! ```text
//! 0|{{b64(ClassName/methodName)}}|{{b64("tok1:::tok2:::…")}}   (CHK? SIG?)
//! tok_i ::= "{{<urlsafe-base64>}}"
//! ```
//!
//! V1 has no status channel: a response is always `0|{{b64(BODY)}}`, and any
//! server-side failure collapses to the `"NullObj"` sentinel (spec §4.4,
//! "losing fidelity").

use super::{encode_body, security_ctx, unwrap_b64, wrap_b64};
use crate::descriptor::WireType;
use crate::error::{ProtocolError, RpcError, SecurityError};
use crate::mapper::MapperRegistry;
use crate::security::{self, SecurityConfig};
use crate::value::Value;

const NULL_OBJ: &str = "NullObj";

/// Encodes a V1 request. `overload_exists` must be supplied by the caller
/// (it requires knowledge of the full candidate table, which the codec
/// itself does not hold) — V1 refuses whenever the called name is
/// ambiguous (spec §4.4, §8 "Method with overload present").
pub fn encode_request(
    class: &str,
    method: &str,
    overload_exists: bool,
    args: &[Value],
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<String, RpcError> {
    if overload_exists {
        return Err(ProtocolError::AmbiguousOverload(method.to_string()).into());
    }
    security::is_valid_class_name(class)
        .then_some(())
        .ok_or_else(|| SecurityError::InvalidClassName(class.to_string()))?;
    security::is_valid_method_name(method)
        .then_some(())
        .ok_or_else(|| SecurityError::InvalidMethodName(method.to_string()))?;
    security_cfg.whitelist.check(class)?;

    let meta_b64 = wrap_b64(&format!("{class}/{method}"));

    let mut tokens = Vec::with_capacity(args.len());
    for arg in args {
        if arg.is_null() {
            tokens.push("~".to_string());
        } else {
            let raw = encode_body(arg, mappers)?;
            tokens.push(wrap_b64(&raw));
        }
    }
    let body_b64 = wrap_b64(&tokens.join(":::"));

    let frame = format!("0|{meta_b64}|{body_b64}");
    Ok(security_ctx(security_cfg).append_trailers(frame)?)
}

/// Splits a decoded V1 parameter body (`"tok1:::tok2:::…"`) into raw
/// per-parameter tokens. Used by the server-side parser.
pub fn split_legacy_tokens(body: &str) -> Vec<&str> {
    if body.is_empty() {
        Vec::new()
    } else {
        body.split(":::").collect()
    }
}

pub fn decode_legacy_token(raw: &str) -> Result<Option<String>, ProtocolError> {
    if raw == "~" {
        return Ok(None);
    }
    unwrap_b64(raw).map(Some)
}

pub fn encode_response(
    outcome: Option<&Value>,
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<String, RpcError> {
    let body_str = match outcome {
        Some(value) => encode_body(value, mappers)?,
        None => NULL_OBJ.to_string(),
    };
    let frame = format!("0|{}", wrap_b64(&body_str));
    Ok(security_ctx(security_cfg).append_trailers(frame)?)
}

pub fn decode_response(
    line: &str,
    expected: &WireType,
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<Value, RpcError> {
    let content = security_ctx(security_cfg).strip_and_verify_trailers(line)?;
    let parts: Vec<&str> = content.splitn(2, '|').collect();
    if parts.len() < 2 || parts[0] != "0" {
        return Err(ProtocolError::UnknownVersion.into());
    }
    let body_str = unwrap_b64(parts[1])?;
    if body_str == NULL_OBJ {
        return Err(RpcError::Server {
            class: NULL_OBJ.to_string(),
            message: "the V1 protocol carries no exception detail".to_string(),
        });
    }
    Ok(mappers.decode(expected, &body_str)?)
}
