//! RequestParser (spec §4.5): turns one wire-format request line into a
//! class/method/descriptor header plus positional parameter tokens. Typed
//! decoding of those tokens is deferred until the method signature is known
//! (V1 has no on-wire descriptor, so its parameter types can only be
//! recovered once the target resource is resolved — see
//! [`decode_params`]).

use crate::codec::{v1, v2, ProtocolVersion};
use crate::descriptor::WireType;
use crate::error::{ProtocolError, RpcError, SecurityError};
use crate::mapper::MapperRegistry;
use crate::security::{self, SecurityConfig};
use crate::value::Value;

/// The syntactic result of parsing one request line, before parameter
/// tokens are decoded against a resolved method signature.
#[derive(Debug)]
pub struct ParsedHeader {
    pub version: ProtocolVersion,
    pub class: String,
    pub method: String,
    /// `Some` for V2 (carried on the wire); `None` for V1, where the callee
    /// must be unambiguous by name alone (spec §4.4, §4.5).
    pub descriptor: Option<String>,
    /// Parameter tokens after base64/trailer handling, before mapper
    /// decoding; `None` marks the `~` null sentinel.
    pub raw_params: Vec<Option<String>>,
}

/// `parse(line) → context | raise` (spec §4.5). Dispatches on the version
/// prefix; `AUTO` pinning is the caller's responsibility (spec §4.8 step 3).
pub fn parse(line: &str, security_cfg: &SecurityConfig) -> Result<ParsedHeader, RpcError> {
    if line.is_empty() {
        return Err(ProtocolError::EmptyLine.into());
    }
    let content = security::ProtocolSecurity::new(security_cfg).strip_and_verify_trailers(line)?;
    if let Some(rest) = content.strip_prefix("V2|") {
        parse_v2(rest, security_cfg)
    } else if content.starts_with("0|") {
        parse_v1(content, security_cfg)
    } else {
        Err(ProtocolError::UnknownVersion.into())
    }
}

fn parse_v2(rest: &str, security_cfg: &SecurityConfig) -> Result<ParsedHeader, RpcError> {
    let parts: Vec<&str> = rest.splitn(3, '|').collect();
    if parts.len() < 2 || parts[0] != "0" {
        return Err(ProtocolError::TooFewSegments.into());
    }
    let meta_token = parts[1];
    if !meta_token.starts_with("{{") {
        return Err(ProtocolError::MalformedSegment {
            segment: meta_token.to_string(),
            reason: "expected `{{...}}` META wrapper".to_string(),
        }
        .into());
    }
    let meta = v2_unwrap_meta(meta_token)?;
    let (class, method_part) = meta
        .split_once('/')
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: meta.clone(),
            reason: "META missing `/` separator".to_string(),
        })?;
    let paren = method_part
        .find('(')
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: method_part.to_string(),
            reason: "method part missing descriptor".to_string(),
        })?;
    let method = &method_part[..paren];
    let descriptor = &method_part[paren..];

    validate_names(class, method, security_cfg)?;

    let param_section = parts.get(2).copied().unwrap_or("[]");
    let tokens = v2::split_param_tokens(param_section)?;
    let mut raw_params = Vec::with_capacity(tokens.len());
    for token in tokens {
        raw_params.push(v2::decode_param_token(token)?);
    }

    Ok(ParsedHeader {
        version: ProtocolVersion::V2,
        class: class.to_string(),
        method: method.to_string(),
        descriptor: Some(descriptor.to_string()),
        raw_params,
    })
}

fn parse_v1(content: &str, security_cfg: &SecurityConfig) -> Result<ParsedHeader, RpcError> {
    let parts: Vec<&str> = content.splitn(3, '|').collect();
    if parts.len() != 3 {
        return Err(ProtocolError::TooFewSegments.into());
    }
    let meta = v1_unwrap(parts[1])?;
    let (class, method) = meta
        .split_once('/')
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: meta.clone(),
            reason: "META missing `/` separator".to_string(),
        })?;

    validate_names(class, method, security_cfg)?;

    let body = v1_unwrap(parts[2])?;
    let tokens = v1::split_legacy_tokens(&body);
    let mut raw_params = Vec::with_capacity(tokens.len());
    for token in tokens {
        raw_params.push(v1::decode_legacy_token(token)?);
    }

    Ok(ParsedHeader {
        version: ProtocolVersion::V1,
        class: class.to_string(),
        method: method.to_string(),
        descriptor: None,
        raw_params,
    })
}

fn validate_names(class: &str, method: &str, security_cfg: &SecurityConfig) -> Result<(), RpcError> {
    if !security::is_valid_class_name(class) {
        return Err(SecurityError::InvalidClassName(class.to_string()).into());
    }
    if !security::is_valid_method_name(method) {
        return Err(SecurityError::InvalidMethodName(method.to_string()).into());
    }
    security_cfg.whitelist.check(class)?;
    Ok(())
}

fn v2_unwrap_meta(token: &str) -> Result<String, ProtocolError> {
    let inner = token
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: token.to_string(),
            reason: "expected `{{...}}` META wrapper".to_string(),
        })?;
    let bytes = security::b64_decode(inner).map_err(|e| ProtocolError::NotBase64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ProtocolError::MalformedSegment {
        segment: token.to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })
}

fn v1_unwrap(token: &str) -> Result<String, RpcError> {
    let inner = token
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .ok_or_else(|| ProtocolError::MalformedSegment {
            segment: token.to_string(),
            reason: "expected `{{...}}` wrapper".to_string(),
        })?;
    let bytes = security::b64_decode(inner).map_err(|e| ProtocolError::NotBase64(e.to_string()))?;
    Ok(String::from_utf8(bytes).map_err(|e| ProtocolError::MalformedSegment {
        segment: token.to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })?)
}

/// Decodes `raw_params` against the now-known positional `expected` types
/// (spec §4.5 step 7). A count mismatch is a `ProtocolError`, as is any
/// individual decode failure.
pub fn decode_params(
    raw_params: &[Option<String>],
    expected: &[WireType],
    mappers: &MapperRegistry,
) -> Result<Vec<Value>, ProtocolError> {
    if raw_params.len() != expected.len() {
        return Err(ProtocolError::ParamCountMismatch {
            expected: expected.len(),
            actual: raw_params.len(),
        });
    }
    let mut values = Vec::with_capacity(expected.len());
    for (raw, ty) in raw_params.iter().zip(expected) {
        values.push(match raw {
            None => Value::Null,
            Some(text) => mappers.decode(ty, text)?,
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodSignature;

    #[test]
    fn parses_a_v2_request_header() {
        let mappers = MapperRegistry::new();
        let security = SecurityConfig::default();
        let method_ref = crate::codec::MethodRef {
            class: "Demo.Calc",
            method: "add",
            params: &[WireType::I32, WireType::I32],
        };
        let frame = v2::encode_request(
            &method_ref,
            &[Value::I32(5), Value::I32(3)],
            &mappers,
            &security,
        )
        .unwrap();

        let header = parse(&frame, &security).unwrap();
        assert_eq!(header.class, "Demo.Calc");
        assert_eq!(header.method, "add");
        assert_eq!(header.descriptor.as_deref(), Some("(II)"));
        assert_eq!(header.raw_params.len(), 2);

        let sig = MethodSignature::new("add", vec![WireType::I32, WireType::I32]);
        let values = decode_params(&header.raw_params, &sig.params, &mappers).unwrap();
        assert_eq!(values, vec![Value::I32(5), Value::I32(3)]);
    }

    #[test]
    fn parses_a_v1_request_header_with_no_on_wire_descriptor() {
        let mappers = MapperRegistry::new();
        let security = SecurityConfig::default();
        let frame = v1::encode_request(
            "Demo.Calc",
            "add",
            false,
            &[Value::I32(5), Value::I32(3)],
            &mappers,
            &security,
        )
        .unwrap();

        let header = parse(&frame, &security).unwrap();
        assert_eq!(header.class, "Demo.Calc");
        assert_eq!(header.method, "add");
        assert!(header.descriptor.is_none());
        assert_eq!(header.raw_params.len(), 2);
    }

    #[test]
    fn empty_line_is_rejected() {
        let security = SecurityConfig::default();
        let err = parse("", &security).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(ProtocolError::EmptyLine)));
    }

    #[test]
    fn unknown_version_prefix_is_rejected() {
        let security = SecurityConfig::default();
        let err = parse("V9|garbage", &security).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(ProtocolError::UnknownVersion)));
    }

    #[test]
    fn param_count_mismatch_is_a_protocol_error() {
        let mappers = MapperRegistry::new();
        let raw = vec![Some("1".to_string())];
        let err = decode_params(&raw, &[WireType::I32, WireType::I32], &mappers).unwrap_err();
        assert!(matches!(err, ProtocolError::ParamCountMismatch { .. }));
    }
}
