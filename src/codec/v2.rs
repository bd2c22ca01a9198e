//! The canonical V2 wire grammar (spec §4.4):
//!
//! ```text
//! V2|0|{{b64(META)}}|[tok1,tok2,…]            (CHK? SIG?)
//! V2|0|STATUS|{{b64(BODY)}}                   (CHK? SIG?)
//! ```

use super::{encode_body, is_null_token, security_ctx, unwrap_b64, wrap_b64, MethodRef, ResponseOutcome};
use crate::descriptor::WireType;
use crate::error::{ProtocolError, RpcError, SecurityError};
use crate::mapper::MapperRegistry;
use crate::security::{self, SecurityConfig};
use crate::status::Code;
use crate::value::Value;

pub fn encode_request(
    method_ref: &MethodRef<'_>,
    args: &[Value],
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<String, RpcError> {
    security::is_valid_class_name(method_ref.class)
        .then_some(())
        .ok_or_else(|| SecurityError::InvalidClassName(method_ref.class.to_string()))?;
    security::is_valid_method_name(method_ref.method)
        .then_some(())
        .ok_or_else(|| SecurityError::InvalidMethodName(method_ref.method.to_string()))?;
    security_cfg.whitelist.check(method_ref.class)?;

    let meta_b64 = wrap_b64(&method_ref.meta());

    let mut tokens = Vec::with_capacity(args.len());
    for arg in args {
        if arg.is_null() {
            tokens.push("~".to_string());
        } else {
            let encoded = encode_body(arg, mappers)?;
            tokens.push(security::b64_encode(encoded.as_bytes()));
        }
    }

    let frame = format!("V2|0|{meta_b64}|[{}]", tokens.join(","));
    Ok(security_ctx(security_cfg).append_trailers(frame)?)
}

pub fn encode_response(
    outcome: &ResponseOutcome,
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<String, RpcError> {
    let body_str = match outcome {
        ResponseOutcome::Success(value) => encode_body(value, mappers)?,
        ResponseOutcome::Business { class, message } | ResponseOutcome::ServerError { class, message } => {
            format!("{class}: {message}")
        }
        ResponseOutcome::ProtocolError { reason } => reason.clone(),
    };
    let frame = format!(
        "V2|0|{}|{}",
        outcome.status().as_u8(),
        wrap_b64(&body_str)
    );
    Ok(security_ctx(security_cfg).append_trailers(frame)?)
}

pub fn decode_response(
    line: &str,
    expected: &WireType,
    mappers: &MapperRegistry,
    security_cfg: &SecurityConfig,
) -> Result<Value, RpcError> {
    let content = security_ctx(security_cfg).strip_and_verify_trailers(line)?;
    if !content.starts_with("V2|") {
        return Err(ProtocolError::UnknownVersion.into());
    }
    let parts: Vec<&str> = content.splitn(4, '|').collect();
    if parts.len() < 4 {
        return Err(ProtocolError::TooFewSegments.into());
    }
    let status_code = parts[2]
        .parse::<u8>()
        .ok()
        .and_then(Code::from_u8)
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: parts[2].to_string(),
            reason: "not a valid status code".to_string(),
        })?;
    let body_str = unwrap_b64(parts[3])?;

    match status_code {
        Code::Success => {
            if body_str == "null" || body_str == "NullObj" {
                Ok(Value::Null)
            } else {
                Ok(mappers.decode(expected, &body_str)?)
            }
        }
        Code::BusinessException => {
            let (class, message) = split_class_message(&body_str);
            Err(RpcError::Business { class, message })
        }
        Code::ServerError => {
            let (class, message) = split_class_message(&body_str);
            Err(RpcError::Server { class, message })
        }
        Code::ProtocolError => Err(ProtocolError::Remote(body_str).into()),
    }
}

/// Splits `"<ShortClassName>: <message>"` (spec §4.4 BODY grammar for
/// failures) on the first `": "`.
fn split_class_message(body: &str) -> (String, String) {
    match body.split_once(": ") {
        Some((class, message)) => (class.to_string(), message.to_string()),
        None => (body.to_string(), String::new()),
    }
}

/// Splits the bracketed, comma-joined V2 parameter list into raw tokens
/// (used by the server-side parser, kept here since it is the mirror image
/// of the join performed by `encode_request`).
pub fn split_param_tokens(list: &str) -> Result<Vec<&str>, ProtocolError> {
    let body = list
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: list.to_string(),
            reason: "expected `[...]` parameter list".to_string(),
        })?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(body.split(',').collect())
}

pub fn decode_param_token(raw: &str) -> Result<Option<String>, ProtocolError> {
    if is_null_token(raw) {
        return Ok(None);
    }
    if raw.is_empty() {
        return Ok(Some(String::new()));
    }
    let bytes = security::b64_decode(raw).map_err(|e| ProtocolError::NotBase64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| ProtocolError::MalformedSegment {
        segment: raw.to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })?;
    Ok(Some(text))
}
