//! ClientProxy (spec §4.9): a generated proxy for a service interface,
//! bound to `(host, port, expectedClassName, codec, mappers, security)`.
//! Every call opens a fresh connection, writes one request line, reads one
//! response line, and closes — mirroring the one-shot-per-connection
//! contract of [`crate::server`].

use crate::codec::{v1, v2, MethodRef, ProtocolVersion};
use crate::descriptor::WireType;
use crate::error::RpcError;
use crate::mapper::MapperRegistry;
use crate::security::SecurityConfig;
use crate::tls::TlsConfig;
use crate::value::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Runtime knobs for a [`ClientProxy`] (ambient config layer,
/// SPEC_FULL.md §4.11).
#[derive(Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub version: ProtocolVersion,
    /// Used whenever a call site supplies no per-method `@Timeout` override
    /// (spec §4.9 step 2). `None` means the call blocks indefinitely, the
    /// spec's normative default.
    pub default_timeout: Option<Duration>,
    pub security: SecurityConfig,
    pub tls: Option<Arc<TlsConfig>>,
}

impl ClientOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            version: ProtocolVersion::V2,
            default_timeout: None,
            security: SecurityConfig::default(),
            tls: None,
        }
    }

    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(Arc::new(tls));
        self
    }
}

/// Bound to one service interface; `expected_class_name` is checked against
/// every call site before any network I/O happens (spec §4.9 step 1).
pub struct ClientProxy {
    expected_class_name: String,
    options: ClientOptions,
    mappers: MapperRegistry,
}

impl ClientProxy {
    pub fn new(expected_class_name: impl Into<String>, options: ClientOptions, mappers: MapperRegistry) -> Self {
        Self {
            expected_class_name: expected_class_name.into(),
            options,
            mappers,
        }
    }

    /// Invokes `method` on the bound interface. `declaring_type` is the
    /// interface name the call site believes it is calling through — a
    /// mismatch is rejected locally (spec §4.9 step 1), never reaching the
    /// network. `overload_exists` must be known statically by the
    /// generated call site (spec §4.4 V1 refusal).
    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        declaring_type: &str,
        method: &str,
        params: &[WireType],
        args: &[Value],
        expected_return: &WireType,
        overload_exists: bool,
        timeout_override: Option<Duration>,
    ) -> Result<Value, RpcError> {
        if declaring_type != self.expected_class_name {
            return Err(RpcError::WrongInterface {
                expected: self.expected_class_name.clone(),
                actual: declaring_type.to_string(),
            });
        }

        let start = Instant::now();
        tracing::debug!(class = %self.expected_class_name, method, "call start");
        let result = self.invoke_inner(method, params, args, expected_return, overload_exists, timeout_override).await;
        match &result {
            Ok(_) => tracing::debug!(
                class = %self.expected_class_name,
                method,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "call end"
            ),
            Err(RpcError::Timeout) => tracing::warn!(
                class = %self.expected_class_name,
                method,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "call timed out"
            ),
            Err(e) => tracing::debug!(
                class = %self.expected_class_name,
                method,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "call end"
            ),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn invoke_inner(
        &self,
        method: &str,
        params: &[WireType],
        args: &[Value],
        expected_return: &WireType,
        overload_exists: bool,
        timeout_override: Option<Duration>,
    ) -> Result<Value, RpcError> {
        let request = match self.options.version {
            ProtocolVersion::V2 => {
                let method_ref = MethodRef {
                    class: &self.expected_class_name,
                    method,
                    params,
                };
                v2::encode_request(&method_ref, args, &self.mappers, &self.options.security)?
            }
            ProtocolVersion::V1 => v1::encode_request(
                &self.expected_class_name,
                method,
                overload_exists,
                args,
                &self.mappers,
                &self.options.security,
            )?,
        };

        let timeout = timeout_override.or(self.options.default_timeout);
        let line = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.round_trip(&request)).await {
                Err(_) => return Err(RpcError::Timeout),
                Ok(Err(e)) => return Err(RpcError::Transport(e.to_string())),
                Ok(Ok(line)) => line,
            },
            None => self.round_trip(&request).await.map_err(|e| RpcError::Transport(e.to_string()))?,
        };

        match self.options.version {
            ProtocolVersion::V2 => v2::decode_response(&line, expected_return, &self.mappers, &self.options.security),
            ProtocolVersion::V1 => v1::decode_response(&line, expected_return, &self.mappers, &self.options.security),
        }
    }

    async fn round_trip(&self, request: &str) -> Result<String, std::io::Error> {
        let stream = TcpStream::connect((self.options.host.as_str(), self.options.port)).await?;

        match &self.options.tls {
            None => self.round_trip_on(stream, request).await,
            Some(tls) => {
                let connector = tls
                    .connector()
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                let server_name = tokio_rustls::rustls::pki_types::ServerName::try_from(self.options.host.clone())
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                let stream = connector.connect(server_name, stream).await?;
                self.round_trip_on(stream, request).await
            }
        }
    }

    async fn round_trip_on<S>(&self, mut stream: S, request: &str) -> Result<String, std::io::Error>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        stream.write_all(request.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}
