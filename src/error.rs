//! Error hierarchy shared by every layer of the pipeline.
//!
//! Each layer owns its own `thiserror`-derived enum; [`RpcError`] aggregates
//! them and is the only error type that crosses the codec/parser boundary
//! into the server pipeline and client proxy.

use thiserror::Error;

/// Failures raised while describing or parsing a [`crate::descriptor`] string.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DescriptorError {
    #[error("type cannot be represented as a wire descriptor: {0}")]
    InvalidType(String),
    #[error("malformed descriptor at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("no method named `{name}` on `{class}` matches descriptor `{descriptor}`")]
    NoSuchMethod {
        class: String,
        name: String,
        descriptor: String,
    },
}

/// Failures raised while resolving or applying a [`crate::mapper::Mapper`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MapperError {
    #[error("no mapper registered for type `{0}`")]
    NotFound(String),
    #[error("failed to decode value of type `{type_name}`: {reason}")]
    Decode { type_name: String, reason: String },
    #[error("failed to encode value of type `{type_name}`: {reason}")]
    Encode { type_name: String, reason: String },
}

/// Failures raised by [`crate::security::ProtocolSecurity`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SecurityError {
    #[error("checksum verification failed")]
    ChecksumMismatch,
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("signature required but absent")]
    SignatureMissing,
    #[error("class `{0}` is not present in the whitelist")]
    NotWhitelisted(String),
    #[error("class name `{0}` is not a valid identifier")]
    InvalidClassName(String),
    #[error("method name `{0}` is not a valid identifier")]
    InvalidMethodName(String),
    #[error("checksum algorithm requires a shared secret")]
    MissingSecret,
    #[error("signature algorithm requires key material")]
    MissingKey,
}

/// Failures raised while parsing a request/response frame, prior to dispatch.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    #[error("empty request line")]
    EmptyLine,
    #[error("unrecognized protocol version prefix")]
    UnknownVersion,
    #[error("frame does not have the required number of `|`-separated segments")]
    TooFewSegments,
    #[error("malformed segment `{segment}`: {reason}")]
    MalformedSegment { segment: String, reason: String },
    #[error("expected {expected} parameters, got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },
    #[error("not base64: {0}")]
    NotBase64(String),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Mapper(#[from] MapperError),
    #[error("class `{0}` is not registered")]
    ClassNotFound(String),
    #[error("overload present for `{0}`; V1 requires an unambiguous method name")]
    AmbiguousOverload(String),
    #[error("{0}")]
    Remote(String),
}

/// The top-level error type, produced by the parser/invoker/codec and
/// consumed by the server pipeline (to pick a status code) and the client
/// proxy (to re-materialize a local exception).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Mapper(#[from] MapperError),
    /// A business-layer exception, raised by user resource code and marked
    /// as such; propagated as status 1.
    #[error("{class}: {message}")]
    Business { class: String, message: String },
    /// Any other in-handler failure; propagated as status 2.
    #[error("{class}: {message}")]
    Server { class: String, message: String },
    /// Client-side socket read timeout. Never produced by the server.
    #[error("request timed out")]
    Timeout,
    /// Local transport failure (connect/read/write), distinct from a
    /// server-reported status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The client-side interface check in ClientProxy::invoke failed before
    /// any network call was made.
    #[error("proxy is bound to `{expected}`, not `{actual}`")]
    WrongInterface { expected: String, actual: String },
}

impl RpcError {
    /// Maps this error onto the normative status-code table in the spec's
    /// external-interfaces section.
    pub fn status_code(&self) -> crate::status::Code {
        use crate::status::Code;
        match self {
            RpcError::Business { .. } => Code::BusinessException,
            RpcError::Protocol(_) | RpcError::Descriptor(_) | RpcError::Mapper(_) => {
                Code::ProtocolError
            }
            RpcError::Security(_) => Code::ProtocolError,
            RpcError::Server { .. } => Code::ServerError,
            RpcError::Timeout | RpcError::Transport(_) | RpcError::WrongInterface { .. } => {
                Code::ServerError
            }
        }
    }
}
