//! TypeDescriptor: bidirectional mapping between wire type descriptors and
//! the in-memory [`Value`] shapes they describe.
//!
//! The alphabet is the JVM field-descriptor grammar (see spec §4.1):
//! `B S I J F D Z C V` for primitives, `L<name>;` for nominal types, and a
//! `[` prefix per array dimension.

use crate::error::DescriptorError;
use std::fmt;

/// A single wire-level type, as parsed from a descriptor string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Char,
    Void,
    /// A nominal type, named by its fully-qualified (dot-separated) name.
    Nominal(String),
    /// An array, recursively typed.
    Array(Box<WireType>),
}

impl WireType {
    /// Renders this type as its wire descriptor string (spec §4.1 `describe`).
    pub fn describe(&self) -> String {
        match self {
            WireType::I8 => "B".to_string(),
            WireType::I16 => "S".to_string(),
            WireType::I32 => "I".to_string(),
            WireType::I64 => "J".to_string(),
            WireType::F32 => "F".to_string(),
            WireType::F64 => "D".to_string(),
            WireType::Bool => "Z".to_string(),
            WireType::Char => "C".to_string(),
            WireType::Void => "V".to_string(),
            WireType::Nominal(name) => format!("L{};", name.replace('.', "/")),
            WireType::Array(inner) => format!("[{}", inner.describe()),
        }
    }

    /// The canonical type name used to key the mapper registry: primitives
    /// use their descriptor letter, nominal types use their dotted name.
    pub fn canonical_name(&self) -> String {
        match self {
            WireType::Nominal(name) => name.clone(),
            WireType::Array(inner) => format!("[{}", inner.canonical_name()),
            other => other.describe(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, WireType::Array(_))
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, WireType::Nominal(_))
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Renders a parameter list as `"(" + join(describe(T)) + ")"` (spec §4.1
/// `describeParams`).
pub fn describe_params(params: &[WireType]) -> String {
    let mut out = String::from("(");
    for p in params {
        out.push_str(&p.describe());
    }
    out.push(')');
    out
}

/// Streaming-scans a parenthesized parameter descriptor into its component
/// types (spec §4.1 `parseParams`).
pub fn parse_params(descriptor: &str) -> Result<Vec<WireType>, DescriptorError> {
    let body = descriptor
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| DescriptorError::Malformed {
            offset: 0,
            reason: "descriptor must be wrapped in parentheses".into(),
        })?;

    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    let mut out = Vec::new();
    while i < chars.len() {
        let (ty, next) = parse_one(&chars, i)?;
        out.push(ty);
        i = next;
    }
    Ok(out)
}

fn parse_one(chars: &[char], pos: usize) -> Result<(WireType, usize), DescriptorError> {
    if pos >= chars.len() {
        return Err(DescriptorError::Malformed {
            offset: pos,
            reason: "truncated descriptor".into(),
        });
    }
    match chars[pos] {
        'B' => Ok((WireType::I8, pos + 1)),
        'S' => Ok((WireType::I16, pos + 1)),
        'I' => Ok((WireType::I32, pos + 1)),
        'J' => Ok((WireType::I64, pos + 1)),
        'F' => Ok((WireType::F32, pos + 1)),
        'D' => Ok((WireType::F64, pos + 1)),
        'Z' => Ok((WireType::Bool, pos + 1)),
        'C' => Ok((WireType::Char, pos + 1)),
        'V' => Ok((WireType::Void, pos + 1)),
        '[' => {
            let (inner, next) = parse_one(chars, pos + 1)?;
            Ok((WireType::Array(Box::new(inner)), next))
        }
        'L' => {
            let start = pos + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != ';' {
                end += 1;
            }
            if end >= chars.len() {
                return Err(DescriptorError::Malformed {
                    offset: pos,
                    reason: "nominal type missing terminating `;`".into(),
                });
            }
            let slashed: String = chars[start..end].iter().collect();
            let dotted = slashed.replace('/', ".");
            Ok((WireType::Nominal(dotted), end + 1))
        }
        other => Err(DescriptorError::Malformed {
            offset: pos,
            reason: format!("unknown descriptor letter `{other}`"),
        }),
    }
}

/// A method's signature as known to the dispatch table: name plus
/// positional wire types. `findMethod` (spec §4.1) compares the computed
/// descriptor of such a signature against the one carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<WireType>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<WireType>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn descriptor(&self) -> String {
        describe_params(&self.params)
    }
}

/// Finds the unique signature in `candidates` (all declared under `name`)
/// whose descriptor byte-equals `descriptor`. There is no implicit
/// widening: arity and type must match exactly.
pub fn find_method<'a>(
    class: &str,
    name: &str,
    descriptor: &str,
    candidates: &'a [MethodSignature],
) -> Result<&'a MethodSignature, DescriptorError> {
    candidates
        .iter()
        .find(|m| m.name == name && m.descriptor() == descriptor)
        .ok_or_else(|| DescriptorError::NoSuchMethod {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
}
