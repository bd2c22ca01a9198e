//! linerpc: a line-oriented, text-over-TCP RPC framework.
//!
//! A client obtains a transparent proxy for a service interface and
//! invokes its methods locally; each call is serialized into one request
//! line, sent over TCP, executed on the server against a registered
//! resource instance, and the result comes back as one response line.
//!
//! ```text
//! ClientProxy.invoke → Codec.encodeRequest → TCP line → ServerPipeline
//!   → RequestParser.parse → ResourceResolver.find → Invoker.invoke
//!   → Codec.encodeResponse → TCP line → ClientProxy decodes
//! ```

pub mod codec;
pub mod descriptor;
pub mod error;
#[macro_use]
pub mod macros;
pub mod invoker;
pub mod mapper;
pub mod parser;
pub mod registry;
pub mod security;
pub mod status;
pub mod value;

#[cfg(feature = "tls")]
pub mod tls;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub mod client;

pub use codec::ProtocolVersion;
pub use descriptor::WireType;
pub use error::RpcError;
pub use status::Code;
pub use value::Value;
