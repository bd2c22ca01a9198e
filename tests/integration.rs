//! End-to-end tests driving a real `Server` over a loopback TCP socket
//! through a real `ClientProxy`, covering the concrete scenarios in the
//! wire-protocol specification (S1-S6) plus its boundary behaviors.

use async_trait::async_trait;
use linerpc::client::{ClientOptions, ClientProxy};
use linerpc::codec::ProtocolVersion;
use linerpc::descriptor::{MethodSignature, WireType};
use linerpc::error::RpcError;
use linerpc::mapper::MapperRegistry;
use linerpc::registry::{ResourceObject, ResourceRegistry};
use linerpc::security::{ChecksumAlgorithm, SecurityConfig, Whitelist};
use linerpc::server::{Server, ServerConfig};
use linerpc::value::Value;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

struct CalcResource;

#[async_trait]
impl ResourceObject for CalcResource {
    fn class_name(&self) -> &str {
        "Demo.Calc"
    }

    fn signatures(&self) -> &[MethodSignature] {
        static SIGS: OnceLock<Vec<MethodSignature>> = OnceLock::new();
        SIGS.get_or_init(|| {
            vec![
                MethodSignature::new("add", vec![WireType::I32, WireType::I32]),
                MethodSignature::new("add", vec![WireType::F64, WireType::F64]),
            ]
        })
    }

    async fn invoke(&self, method: &str, descriptor: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        match (method, descriptor) {
            ("add", "(II)") => {
                let (Value::I32(a), Value::I32(b)) = (&args[0], &args[1]) else {
                    unreachable!()
                };
                Ok(Value::I32(a + b))
            }
            ("add", "(DD)") => {
                let (Value::F64(a), Value::F64(b)) = (&args[0], &args[1]) else {
                    unreachable!()
                };
                Ok(Value::F64(a + b))
            }
            _ => Err(RpcError::Server {
                class: "NoSuchMethodError".to_string(),
                message: format!("{method}{descriptor}"),
            }),
        }
    }
}

struct NullResource;

#[async_trait]
impl ResourceObject for NullResource {
    fn class_name(&self) -> &str {
        "Demo.Null"
    }

    fn signatures(&self) -> &[MethodSignature] {
        static SIGS: OnceLock<Vec<MethodSignature>> = OnceLock::new();
        SIGS.get_or_init(|| {
            vec![MethodSignature::new(
                "nullMethod",
                vec![
                    WireType::Nominal("java.lang.String".into()),
                    WireType::Nominal("java.lang.String".into()),
                    WireType::Nominal("java.lang.String".into()),
                ],
            )]
        })
    }

    async fn invoke(&self, _method: &str, _descriptor: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let rendered: String = args
            .into_iter()
            .map(|v| if v.is_null() { String::new() } else { v.to_string() })
            .collect();
        Ok(Value::Str(rendered))
    }
}

struct FlakyResource;

#[async_trait]
impl ResourceObject for FlakyResource {
    fn class_name(&self) -> &str {
        "Demo.Flaky"
    }

    fn signatures(&self) -> &[MethodSignature] {
        static SIGS: OnceLock<Vec<MethodSignature>> = OnceLock::new();
        SIGS.get_or_init(|| {
            vec![MethodSignature::new(
                "explode",
                vec![],
            )]
        })
    }

    async fn invoke(&self, _method: &str, _descriptor: &str, _args: Vec<Value>) -> Result<Value, RpcError> {
        Err(RpcError::Business {
            class: "ValidationException".to_string(),
            message: "bad".to_string(),
        })
    }
}

struct EchoResource;

#[async_trait]
impl ResourceObject for EchoResource {
    fn class_name(&self) -> &str {
        "Demo.Echo"
    }

    fn signatures(&self) -> &[MethodSignature] {
        static SIGS: OnceLock<Vec<MethodSignature>> = OnceLock::new();
        SIGS.get_or_init(|| {
            vec![MethodSignature::new(
                "echo",
                vec![WireType::Nominal("java.lang.String".into())],
            )]
        })
    }

    async fn invoke(&self, _method: &str, _descriptor: &str, mut args: Vec<Value>) -> Result<Value, RpcError> {
        Ok(args.pop().unwrap_or(Value::Null))
    }
}

async fn spawn_server(registry: Arc<ResourceRegistry>, security: SecurityConfig) -> SocketAddr {
    let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = tokio::net::TcpListener::bind(bind_addr).await.unwrap();
    let actual_addr = listener.local_addr().unwrap();
    drop(listener);

    let server = Server::new(ServerConfig::new(actual_addr).with_security(security), registry);
    tokio::spawn(async move {
        let _ = server.serve().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    actual_addr
}

fn full_registry() -> Arc<ResourceRegistry> {
    let registry = Arc::new(ResourceRegistry::new());
    registry.add_singleton(Arc::new(CalcResource)).unwrap();
    registry.add_singleton(Arc::new(NullResource)).unwrap();
    registry.add_singleton(Arc::new(FlakyResource)).unwrap();
    registry.add_singleton(Arc::new(EchoResource)).unwrap();
    registry
}

#[tokio::test]
async fn s1_primitive_echo_over_v2() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Calc",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let result = proxy
        .invoke(
            "Demo.Calc",
            "add",
            &[WireType::I32, WireType::I32],
            &[Value::I32(5), Value::I32(3)],
            &WireType::I32,
            false,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, Value::I32(8));
}

#[tokio::test]
async fn s2_string_echo_with_a_null_argument() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Null",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let params = [
        WireType::Nominal("java.lang.String".into()),
        WireType::Nominal("java.lang.String".into()),
        WireType::Nominal("java.lang.String".into()),
    ];
    let result = proxy
        .invoke(
            "Demo.Null",
            "nullMethod",
            &params,
            &[Value::Str("one".into()), Value::Null, Value::Str("two".into())],
            &WireType::Nominal("java.lang.String".into()),
            false,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, Value::Str("onetwo".to_string()));
}

#[tokio::test]
async fn s3_overload_resolution_dispatches_to_the_double_variant() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Calc",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let result = proxy
        .invoke(
            "Demo.Calc",
            "add",
            &[WireType::F64, WireType::F64],
            &[Value::F64(2.5), Value::F64(3.5)],
            &WireType::F64,
            true,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, Value::F64(6.0));
}

#[tokio::test]
async fn s4_business_exception_is_raised_client_side_with_a_tagged_message() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Flaky",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let err = proxy
        .invoke("Demo.Flaky", "explode", &[], &[], &WireType::Void, false, None)
        .await
        .unwrap_err();
    match err {
        RpcError::Business { class, message } => {
            assert_eq!(class, "ValidationException");
            assert_eq!(message, "bad");
        }
        other => panic!("expected Business, got {other:?}"),
    }
}

#[tokio::test]
async fn s5_checksum_tamper_is_rejected_with_a_protocol_error() {
    let security = SecurityConfig {
        checksum: ChecksumAlgorithm::HmacSha256 {
            secret: b"s1".to_vec(),
        },
        ..Default::default()
    };
    let addr = spawn_server(full_registry(), security.clone()).await;

    // Hand-roll the round trip so we can corrupt one byte of the frame
    // before it reaches the server; `ClientProxy` has no hook for that.
    let mappers = MapperRegistry::new();
    let method_ref = linerpc::codec::MethodRef {
        class: "Demo.Calc",
        method: "add",
        params: &[WireType::I32, WireType::I32],
    };
    let frame = linerpc::codec::v2::encode_request(
        &method_ref,
        &[Value::I32(1), Value::I32(2)],
        &mappers,
        &security,
    )
    .unwrap();
    let meta_start = frame.find("{{").unwrap() + 2;
    let mut bytes = frame.into_bytes();
    bytes[meta_start] ^= 0x01;
    let tampered = String::from_utf8_lossy(&bytes).to_string();

    let response = send_raw_line(addr, &tampered).await;
    let err = linerpc::codec::v2::decode_response(&response, &WireType::I32, &mappers, &security).unwrap_err();
    assert!(matches!(err, RpcError::Protocol(_)));
}

#[tokio::test]
async fn s6_whitelist_violation_is_rejected_before_resolution() {
    let security = SecurityConfig {
        whitelist: Whitelist::enabled(["Demo.Calc"]),
        ..Default::default()
    };
    let addr = spawn_server(full_registry(), security.clone()).await;
    let proxy = ClientProxy::new(
        "Demo.Forbidden",
        ClientOptions::new(addr.ip().to_string(), addr.port()).with_security(security),
        MapperRegistry::new(),
    );
    let err = proxy
        .invoke(
            "Demo.Forbidden",
            "op",
            &[],
            &[],
            &WireType::Void,
            false,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Security(_) | RpcError::Protocol(_)));
}

#[tokio::test]
async fn empty_argument_list_round_trips() {
    let registry = Arc::new(ResourceRegistry::new());
    registry.add_singleton(Arc::new(FlakyResource)).unwrap();
    // explode() always raises, but we only care that a zero-arg call
    // encodes/dispatches without a parameter-count mismatch.
    let addr = spawn_server(registry, SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Flaky",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let err = proxy
        .invoke("Demo.Flaky", "explode", &[], &[], &WireType::Void, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Business { .. }));
}

#[tokio::test]
async fn v1_refuses_a_method_with_an_overload_present() {
    let mappers = MapperRegistry::new();
    let security = SecurityConfig::default();
    let err = linerpc::codec::v1::encode_request(
        "Demo.Calc",
        "add",
        true,
        &[Value::I32(1), Value::I32(2)],
        &mappers,
        &security,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RpcError::Protocol(linerpc::error::ProtocolError::AmbiguousOverload(_))
    ));
}

#[tokio::test]
async fn v1_dispatches_an_unambiguous_method_identically_to_v2() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Echo",
        ClientOptions::new(addr.ip().to_string(), addr.port()).with_version(ProtocolVersion::V1),
        MapperRegistry::new(),
    );
    let result = proxy
        .invoke(
            "Demo.Echo",
            "echo",
            &[WireType::Nominal("java.lang.String".into())],
            &[Value::Str("hi".into())],
            &WireType::Nominal("java.lang.String".into()),
            false,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, Value::Str("hi".to_string()));
}

#[tokio::test]
async fn a_ten_kibibyte_payload_is_reconstructed_byte_for_byte() {
    let addr = spawn_server(full_registry(), SecurityConfig::default()).await;
    let proxy = ClientProxy::new(
        "Demo.Echo",
        ClientOptions::new(addr.ip().to_string(), addr.port()),
        MapperRegistry::new(),
    );
    let payload = "x".repeat(10 * 1024);
    let result = proxy
        .invoke(
            "Demo.Echo",
            "echo",
            &[WireType::Nominal("java.lang.String".into())],
            &[Value::Str(payload.clone())],
            &WireType::Nominal("java.lang.String".into()),
            false,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, Value::Str(payload));
}

/// Sends a raw, already-framed line to `addr` and returns the response
/// line, bypassing `ClientProxy` for tests that need to corrupt a frame.
async fn send_raw_line(addr: SocketAddr, line: &str) -> String {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    response.trim_end_matches(['\n', '\r']).to_string()
}
