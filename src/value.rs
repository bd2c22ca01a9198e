//! [`Value`]: the in-memory counterpart of a wire-typed argument or return
//! slot. Stands in for "reflective object" in a language without runtime
//! reflection (see SPEC_FULL.md §3.1).

use crate::descriptor::WireType;
use std::fmt;

/// A decoded/encodable argument or return value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
    /// Distinct from `Null`: an explicit empty string never maps to null.
    Str(String),
    Array(Vec<Value>),
    /// An opaque, self-describing object: a type tag plus its field tuples,
    /// the language-neutral replacement for Java `Serializable` (spec §4.2,
    /// §9 "Self-describing mapper").
    SelfDescribing { type_name: String, json: String },
    Null,
    /// `void`/unit — only ever a return value.
    Void,
}

impl Value {
    /// The wire type this value was produced for/against, used to pick the
    /// canonical mapper key on the sending side (runtime type) as required
    /// by spec §4.2.
    pub fn canonical_name(&self) -> String {
        match self {
            Value::I8(_) => WireType::I8.canonical_name(),
            Value::I16(_) => WireType::I16.canonical_name(),
            Value::I32(_) => WireType::I32.canonical_name(),
            Value::I64(_) => WireType::I64.canonical_name(),
            Value::F32(_) => WireType::F32.canonical_name(),
            Value::F64(_) => WireType::F64.canonical_name(),
            Value::Bool(_) => WireType::Bool.canonical_name(),
            Value::Char(_) => WireType::Char.canonical_name(),
            Value::Str(_) => "java.lang.String".to_string(),
            Value::Array(items) => {
                let elem = items.first().map(|v| v.canonical_name()).unwrap_or_default();
                format!("[{elem}")
            }
            Value::SelfDescribing { type_name, .. } => type_name.clone(),
            Value::Null | Value::Void => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::SelfDescribing { json, .. } => write!(f, "{json}"),
            Value::Null => write!(f, "null"),
            Value::Void => Ok(()),
        }
    }
}
