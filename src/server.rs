//! ServerPipeline (spec §4.8): binds a TCP listener, and for each connection
//! reads one request line, routes it through parser → resolver → invoker →
//! codec, writes one response line, then closes the connection. The
//! protocol is one-shot per connection in the specified core (spec §4.8
//! step 7); long-lived sessions are out of scope.

use crate::codec::{v1, v2, ProtocolVersion, ResponseOutcome};
use crate::descriptor::{self, MethodSignature};
use crate::error::{ProtocolError, RpcError};
use crate::invoker::{self, InvocationContext};
use crate::parser::{self, ParsedHeader};
use crate::registry::{ResourceRegistry, ResourceResolver};
use crate::security::SecurityConfig;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Which wire version(s) a listener accepts (spec §4.8 step 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    #[default]
    Auto,
    V1Only,
    V2Only,
}

/// Builder for the listener's runtime knobs (ambient configuration layer,
/// SPEC_FULL.md §4.11).
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub version_policy: VersionPolicy,
    /// Maximum accepted request-line length; spec §5 "a sensible minimum is
    /// 16 MiB".
    pub max_line_bytes: usize,
    pub security: SecurityConfig,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            version_policy: VersionPolicy::Auto,
            max_line_bytes: 16 * 1024 * 1024,
            security: SecurityConfig::default(),
        }
    }

    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }
}

/// A running (or about-to-run) server: owns the resource registry and a
/// hot-swappable security configuration (spec SPEC_FULL.md §5 "readers
/// never observe a torn value").
pub struct Server {
    config: ServerConfig,
    registry: Arc<ResourceRegistry>,
    security: Arc<RwLock<SecurityConfig>>,
}

impl Server {
    pub fn new(config: ServerConfig, registry: Arc<ResourceRegistry>) -> Self {
        let security = Arc::new(RwLock::new(config.security.clone()));
        Self {
            config,
            registry,
            security,
        }
    }

    /// Atomically replaces the security configuration used by subsequent
    /// connections; in-flight connections keep the snapshot they already
    /// took.
    pub fn set_security_config(&self, security: SecurityConfig) {
        *self.security.write().expect("security config lock poisoned") = security;
    }

    pub async fn serve(&self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "listening");
        loop {
            let (socket, peer) = listener.accept().await?;
            let registry = Arc::clone(&self.registry);
            let security = self.security.read().expect("security config lock poisoned").clone();
            let policy = self.config.version_policy;
            let max_line_bytes = self.config.max_line_bytes;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, registry, security, policy, max_line_bytes).await {
                    tracing::warn!(peer = %peer, error = %e, "connection ended with an I/O error");
                }
            });
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    registry: Arc<ResourceRegistry>,
    security: SecurityConfig,
    policy: VersionPolicy,
    max_line_bytes: usize,
) -> Result<(), std::io::Error> {
    let (read_half, mut write_half) = socket.into_split();
    let reader = BufReader::new(read_half);
    let mut line = String::new();
    let read = reader.take(max_line_bytes as u64).read_line(&mut line).await?;
    if read == 0 {
        return Ok(());
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);

    let response = process_request(trimmed, &registry, &security, policy).await;
    write_half.write_all(response.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.shutdown().await?;
    Ok(())
}

/// Steps 2–6 of spec §4.8, isolated from socket I/O for unit testing.
async fn process_request(
    line: &str,
    registry: &ResourceRegistry,
    security: &SecurityConfig,
    policy: VersionPolicy,
) -> String {
    let version_guess = if line.starts_with("V2|") {
        ProtocolVersion::V2
    } else {
        ProtocolVersion::V1
    };
    // A pinned server only ever speaks its pinned wire format, even in its
    // refusal of a frame in the other version.
    let render_version = match policy {
        VersionPolicy::V1Only => ProtocolVersion::V1,
        VersionPolicy::V2Only => ProtocolVersion::V2,
        VersionPolicy::Auto => version_guess,
    };

    if let Err(reason) = check_version_policy(line, policy) {
        return render_error(render_version, registry, security, &RpcError::Protocol(reason));
    }

    match run_pipeline(line, registry, security).await {
        Ok((version, value)) => render_success(version, value, registry, security),
        Err(err) => render_error(render_version, registry, security, &err),
    }
}

fn check_version_policy(line: &str, policy: VersionPolicy) -> Result<(), ProtocolError> {
    match policy {
        VersionPolicy::Auto => Ok(()),
        VersionPolicy::V2Only if line.starts_with("V2|") => Ok(()),
        VersionPolicy::V1Only if line.starts_with("0|") => Ok(()),
        _ => Err(ProtocolError::UnknownVersion),
    }
}

async fn run_pipeline(
    line: &str,
    registry: &ResourceRegistry,
    security: &SecurityConfig,
) -> Result<(ProtocolVersion, Option<crate::value::Value>), RpcError> {
    let header: ParsedHeader = parser::parse(line, security)?;
    let resolver = ResourceResolver::new(registry);
    let instance = resolver.find(&header.class)?;

    let signature = resolve_signature(&header, instance.signatures())?;
    let mappers = registry.mapper_snapshot();
    let args = parser::decode_params(&header.raw_params, &signature.params, &mappers)?;

    let context = InvocationContext {
        target_instance: instance,
        target_method: header.method.clone(),
        descriptor: signature.descriptor(),
        params: args,
        version: header.version,
    };
    let outcome = invoker::invoke(context).await?;
    Ok((header.version, outcome))
}

fn resolve_signature(
    header: &ParsedHeader,
    candidates: &[MethodSignature],
) -> Result<MethodSignature, RpcError> {
    match &header.descriptor {
        Some(descriptor) => {
            let found = descriptor::find_method(&header.class, &header.method, descriptor, candidates)?;
            Ok(found.clone())
        }
        None => {
            let matches: Vec<&MethodSignature> = candidates
                .iter()
                .filter(|m| m.name == header.method)
                .collect();
            match matches.as_slice() {
                [] => Err(crate::error::DescriptorError::NoSuchMethod {
                    class: header.class.clone(),
                    name: header.method.clone(),
                    descriptor: "<none, V1 request>".to_string(),
                }
                .into()),
                [single] => Ok((*single).clone()),
                _ => Err(ProtocolError::AmbiguousOverload(header.method.clone()).into()),
            }
        }
    }
}

fn render_success(
    version: ProtocolVersion,
    value: Option<crate::value::Value>,
    registry: &ResourceRegistry,
    security: &SecurityConfig,
) -> String {
    let mappers = registry.mapper_snapshot();
    let result = match version {
        ProtocolVersion::V2 => {
            let outcome = match value {
                Some(v) => ResponseOutcome::Success(v),
                None => ResponseOutcome::Success(crate::value::Value::Null),
            };
            v2::encode_response(&outcome, &mappers, security)
        }
        ProtocolVersion::V1 => v1::encode_response(value.as_ref(), &mappers, security),
    };
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode a success response");
        fallback_protocol_error(version)
    })
}

fn render_error(
    version: ProtocolVersion,
    registry: &ResourceRegistry,
    security: &SecurityConfig,
    err: &RpcError,
) -> String {
    tracing::warn!(error = %err, "request failed");
    let mappers = registry.mapper_snapshot();
    let result = match version {
        ProtocolVersion::V2 => v2::encode_response(&ResponseOutcome::from(err), &mappers, security),
        ProtocolVersion::V1 => v1::encode_response(None, &mappers, security),
    };
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode an error response");
        fallback_protocol_error(version)
    })
}

/// Last-resort response when even the codec's error path fails to encode
/// (e.g. a security config that cannot sign); never exercised in practice
/// since `SecurityConfig::default()` always succeeds.
fn fallback_protocol_error(version: ProtocolVersion) -> String {
    let body = crate::security::b64_encode(b"internal encoding failure");
    match version {
        ProtocolVersion::V2 => format!("V2|0|3|{{{{{body}}}}}"),
        ProtocolVersion::V1 => format!("0|{{{{{body}}}}}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::WireType;
    use crate::registry::ResourceObject;
    use crate::value::Value;
    use async_trait::async_trait;

    struct CalcResource;

    #[async_trait]
    impl ResourceObject for CalcResource {
        fn class_name(&self) -> &str {
            "Demo.Calc"
        }

        fn signatures(&self) -> &[MethodSignature] {
            use std::sync::OnceLock;
            static SIGS: OnceLock<Vec<MethodSignature>> = OnceLock::new();
            SIGS.get_or_init(|| vec![MethodSignature::new("add", vec![WireType::I32, WireType::I32])])
        }

        async fn invoke(&self, method: &str, _descriptor: &str, args: Vec<Value>) -> Result<Value, RpcError> {
            match method {
                "add" => {
                    let (Value::I32(a), Value::I32(b)) = (&args[0], &args[1]) else {
                        return Err(RpcError::Server {
                            class: "TypeError".to_string(),
                            message: "expected two ints".to_string(),
                        });
                    };
                    Ok(Value::I32(a + b))
                }
                other => Err(RpcError::Server {
                    class: "NoSuchMethodError".to_string(),
                    message: other.to_string(),
                }),
            }
        }
    }

    fn registry_with_calc() -> ResourceRegistry {
        let registry = ResourceRegistry::new();
        registry.add_singleton(Arc::new(CalcResource)).unwrap();
        registry
    }

    #[tokio::test]
    async fn v2_round_trip_invokes_the_registered_resource() {
        let registry = registry_with_calc();
        let security = SecurityConfig::default();
        let mappers = registry.mapper_snapshot();
        let method_ref = crate::codec::MethodRef {
            class: "Demo.Calc",
            method: "add",
            params: &[WireType::I32, WireType::I32],
        };
        let request = v2::encode_request(&method_ref, &[Value::I32(5), Value::I32(3)], &mappers, &security).unwrap();
        drop(mappers);

        let response = process_request(&request, &registry, &security, VersionPolicy::Auto).await;
        let mappers = registry.mapper_snapshot();
        let value = v2::decode_response(&response, &WireType::I32, &mappers, &security).unwrap();
        assert_eq!(value, Value::I32(8));
    }

    #[tokio::test]
    async fn unknown_class_yields_a_protocol_error_response() {
        let registry = registry_with_calc();
        let security = SecurityConfig::default();
        let mappers = registry.mapper_snapshot();
        let method_ref = crate::codec::MethodRef {
            class: "Demo.Missing",
            method: "add",
            params: &[WireType::I32, WireType::I32],
        };
        let request = v2::encode_request(&method_ref, &[Value::I32(1), Value::I32(2)], &mappers, &security).unwrap();
        drop(mappers);

        let response = process_request(&request, &registry, &security, VersionPolicy::Auto).await;
        let mappers = registry.mapper_snapshot();
        let err = v2::decode_response(&response, &WireType::I32, &mappers, &security).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[tokio::test]
    async fn v1_request_pinned_server_rejects_v2_frames() {
        let registry = registry_with_calc();
        let security = SecurityConfig::default();
        let response = process_request("V2|0|garbage", &registry, &security, VersionPolicy::V1Only).await;
        assert!(response.starts_with("0|"));
    }

    #[tokio::test]
    async fn v1_invocation_failure_collapses_to_null_obj() {
        let registry = registry_with_calc();
        let security = SecurityConfig::default();
        let mappers = registry.mapper_snapshot();
        let request = v1::encode_request(
            "Demo.Calc",
            "add",
            false,
            &[Value::Str("not-an-int".into()), Value::I32(1)],
            &mappers,
            &security,
        )
        .unwrap();
        drop(mappers);

        let response = process_request(&request, &registry, &security, VersionPolicy::Auto).await;
        let mappers = registry.mapper_snapshot();
        let err = v1::decode_response(&response, &WireType::I32, &mappers, &security).unwrap_err();
        assert!(matches!(err, RpcError::Server { .. }));
    }
}
