//! Registers a `Demo.Calc` resource, serves it over a real TCP loopback
//! socket, and drives it through a [`linerpc::client::ClientProxy`].

use linerpc::client::{ClientOptions, ClientProxy};
use linerpc::descriptor::WireType;
use linerpc::error::RpcError;
use linerpc::mapper::MapperRegistry;
use linerpc::registry::ResourceRegistry;
use linerpc::rpc_resource;
use linerpc::server::{Server, ServerConfig};
use linerpc::value::Value;
use std::net::SocketAddr;
use std::sync::Arc;

rpc_resource! {
    pub struct Calc;
    class_name: "Demo.Calc";
    methods: [
        {
            name: "add",
            params: [WireType::I32, WireType::I32],
            handler: |args: Vec<Value>| {
                let (Value::I32(a), Value::I32(b)) = (&args[0], &args[1]) else {
                    return Err(RpcError::Server {
                        class: "TypeError".to_string(),
                        message: "expected two ints".to_string(),
                    });
                };
                Ok(Value::I32(a + b))
            },
        },
    ]
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(ResourceRegistry::new());
    registry.add_singleton(Arc::new(Calc)).unwrap();

    let bind_addr: SocketAddr = "127.0.0.1:7878".parse().unwrap();
    let server = Server::new(ServerConfig::new(bind_addr), registry);
    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!(error = %e, "server stopped");
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let proxy = ClientProxy::new(
        "Demo.Calc",
        ClientOptions::new("127.0.0.1", bind_addr.port()),
        MapperRegistry::new(),
    );
    let sum = proxy
        .invoke(
            "Demo.Calc",
            "add",
            &[WireType::I32, WireType::I32],
            &[Value::I32(5), Value::I32(37)],
            &WireType::I32,
            false,
            None,
        )
        .await
        .expect("add call failed");

    println!("5 + 37 = {sum}");
}
