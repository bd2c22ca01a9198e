//! The mapper registry (spec §4.2): resolves a [`WireType`] to an
//! encode/decode pair, consulting built-ins, user registrations, and the
//! self-describing fallback in that priority order.

use crate::descriptor::WireType;
use crate::error::MapperError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The canonical `(type_name, fields)` tuple a self-describing object is
/// serialized to on the wire (spec §9.1), carried through `serde_json`
/// rather than a hand-rolled field walker.
#[derive(Serialize, Deserialize)]
struct SelfDescribingEnvelope {
    type_name: String,
    fields: serde_json::Value,
}

/// A type-specific `(object → string, string → object)` pair (spec §4.2).
pub trait Mapper: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, MapperError>;
    fn decode(&self, type_name: &str, input: &str) -> Result<Value, MapperError>;
}

type MapperFn = Arc<dyn Mapper>;

/// A [`Mapper`] built from a pair of closures, for registering a mapper
/// without writing a named type.
pub struct ClosureMapper<E, D> {
    pub encode: E,
    pub decode: D,
}

impl<E, D> ClosureMapper<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<E, D> Mapper for ClosureMapper<E, D>
where
    E: Fn(&Value) -> Result<String, MapperError> + Send + Sync,
    D: Fn(&str, &str) -> Result<Value, MapperError> + Send + Sync,
{
    fn encode(&self, value: &Value) -> Result<String, MapperError> {
        (self.encode)(value)
    }

    fn decode(&self, type_name: &str, input: &str) -> Result<Value, MapperError> {
        (self.decode)(type_name, input)
    }
}

/// Registry of nominal-type-name → [`Mapper`] entries, carrying built-ins
/// plus whatever the user registers with [`MapperRegistry::add_mapper`].
#[derive(Clone)]
pub struct MapperRegistry {
    mappers: HashMap<String, MapperFn>,
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// `addMapper(typeName, pair)` — overwrites silently replaced entries
    /// with a `warn` event (spec §4.2, §4.7 "replaces the previous value and
    /// emits a warning").
    pub fn add_mapper(&mut self, type_name: impl Into<String>, mapper: impl Mapper + 'static) {
        let type_name = type_name.into();
        if self.mappers.contains_key(&type_name) {
            tracing::warn!(type_name = %type_name, "replacing previously registered mapper");
        }
        self.mappers.insert(type_name, Arc::new(mapper));
    }

    fn exact(&self, type_name: &str) -> Option<&MapperFn> {
        self.mappers.get(type_name)
    }

    /// Whether an exact mapper is registered for `type_name`, consulted by
    /// strict-type-check registration (spec §4.7).
    pub(crate) fn has_exact(&self, type_name: &str) -> bool {
        self.mappers.contains_key(type_name)
    }

    /// Encodes `value` by consulting the resolution order in spec §4.2,
    /// using the value's *runtime* canonical type name as required on the
    /// sending side.
    pub fn encode(&self, value: &Value) -> Result<String, MapperError> {
        if let Value::Array(items) = value {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(self.encode(item)?);
            }
            return Ok(format!("[{}]", rendered.join(", ")));
        }

        let canonical = value.canonical_name();
        if let Some(mapper) = self.exact(&canonical) {
            return mapper.encode(value);
        }
        if let Value::SelfDescribing { type_name, json } = value {
            return encode_self_describing(type_name, json);
        }
        builtin_encode(value)
    }

    /// Decodes `input` into a [`Value`] of declared wire type `ty`,
    /// consulting the resolution order in spec §4.2 driven by the
    /// *declared* type on the receiving side.
    pub fn decode(&self, ty: &WireType, input: &str) -> Result<Value, MapperError> {
        if let WireType::Array(elem) = ty {
            let trimmed = input.trim();
            let body = trimmed
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .unwrap_or(trimmed);
            if body.trim().is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            let mut items = Vec::new();
            for part in split_top_level(body) {
                items.push(self.decode(elem, part.trim())?);
            }
            return Ok(Value::Array(items));
        }

        let canonical = ty.canonical_name();
        if let Some(mapper) = self.exact(&canonical) {
            return mapper.decode(&canonical, input);
        }
        if ty.is_nominal() {
            if let Some(value) = decode_self_describing(input)? {
                return Ok(value);
            }
        }
        builtin_decode(ty, input)
    }
}

fn split_top_level(body: &str) -> Vec<&str> {
    // Elements never themselves contain nested `[`/`]` with commas inside
    // at the layer this helper is used (primitive arrays only, per spec
    // §4.4 "arrays of primitives use the canonical rendering"), so a plain
    // comma split is sufficient.
    body.split(',').collect()
}

/// Serializes a self-describing object's `fields` blob (itself a JSON
/// document) into the canonical `(type_name, fields)` envelope.
fn encode_self_describing(type_name: &str, fields_json: &str) -> Result<String, MapperError> {
    let fail = |reason: String| MapperError::Encode {
        type_name: type_name.to_string(),
        reason,
    };
    let fields: serde_json::Value =
        serde_json::from_str(fields_json).map_err(|e| fail(format!("{e}")))?;
    let envelope = SelfDescribingEnvelope {
        type_name: type_name.to_string(),
        fields,
    };
    serde_json::to_string(&envelope).map_err(|e| fail(format!("{e}")))
}

/// Recognizes and unwraps a `(type_name, fields)` envelope on the receiving
/// side. Returns `Ok(None)` for any input that isn't one, so the caller can
/// fall through to the next resolution step (spec §4.2) instead of failing.
fn decode_self_describing(input: &str) -> Result<Option<Value>, MapperError> {
    let Ok(envelope) = serde_json::from_str::<SelfDescribingEnvelope>(input) else {
        return Ok(None);
    };
    let fields = serde_json::to_string(&envelope.fields).map_err(|e| MapperError::Decode {
        type_name: envelope.type_name.clone(),
        reason: format!("{e}"),
    })?;
    Ok(Some(Value::SelfDescribing {
        type_name: envelope.type_name,
        json: fields,
    }))
}

fn builtin_encode(value: &Value) -> Result<String, MapperError> {
    Ok(match value {
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::Str(v) => v.clone(),
        Value::Null => "null".to_string(),
        Value::Void => String::new(),
        Value::Array(_) => unreachable!("arrays are handled before builtin_encode"),
        Value::SelfDescribing { json, .. } => json.clone(),
    })
}

fn builtin_decode(ty: &WireType, input: &str) -> Result<Value, MapperError> {
    let fail = |reason: String| MapperError::Decode {
        type_name: ty.describe(),
        reason,
    };
    Ok(match ty {
        WireType::I8 => Value::I8(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::I16 => Value::I16(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::I32 => Value::I32(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::I64 => Value::I64(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::F32 => Value::F32(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::F64 => Value::F64(input.parse().map_err(|e| fail(format!("{e}")))?),
        WireType::Bool => {
            Value::Bool(match input.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => return Err(fail(format!("`{other}` is not a boolean"))),
            })
        }
        WireType::Char => Value::Char(
            input
                .encode_utf16()
                .next()
                .and_then(|code_unit| char::from_u32(code_unit as u32))
                .ok_or_else(|| fail("empty char payload".into()))?,
        ),
        WireType::Void => Value::Void,
        WireType::Nominal(name) if name == "java.lang.String" => Value::Str(input.to_string()),
        WireType::Nominal(name) => {
            return Err(MapperError::NotFound(name.clone()));
        }
        WireType::Array(_) => unreachable!("arrays are handled before builtin_decode"),
    })
}
