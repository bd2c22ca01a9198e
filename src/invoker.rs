//! Invoker (spec §4.6): runs an invocation context against the resolved
//! instance, mapping a handler failure onto the business/server distinction
//! the codec needs to pick a status code.

use crate::codec::ProtocolVersion;
use crate::error::RpcError;
use crate::registry::ResourceObject;
use crate::value::Value;
use std::sync::Arc;

/// Everything the invoker needs for one call, assembled by the
/// [`crate::parser::RequestParser`] (spec §3 "InvocationContext").
pub struct InvocationContext {
    pub target_instance: Arc<dyn ResourceObject>,
    pub target_method: String,
    pub descriptor: String,
    pub params: Vec<Value>,
    pub version: ProtocolVersion,
}

/// `invoke(context) → value | raise` (spec §4.6).
///
/// V2 callers get the raw [`RpcError`] back so the codec can pick status 1
/// (business) or 2 (server); V1 has no status channel, so a handler failure
/// is swallowed here and observed by the caller as `Ok(None)` — the codec's
/// `NullObj` sentinel (spec §4.4).
pub async fn invoke(context: InvocationContext) -> Result<Option<Value>, RpcError> {
    let result = context
        .target_instance
        .invoke(&context.target_method, &context.descriptor, context.params)
        .await;

    match context.version {
        ProtocolVersion::V2 => result.map(Some),
        ProtocolVersion::V1 => match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(
                    method = %context.target_method,
                    error = %err,
                    "V1 invocation failed; collapsing to the NullObj sentinel"
                );
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodSignature;
    use async_trait::async_trait;

    struct FailingResource;

    #[async_trait]
    impl ResourceObject for FailingResource {
        fn class_name(&self) -> &str {
            "demo.Failing"
        }
        fn signatures(&self) -> &[MethodSignature] {
            &[]
        }
        async fn invoke(&self, _method: &str, _descriptor: &str, _args: Vec<Value>) -> Result<Value, RpcError> {
            Err(RpcError::Business {
                class: "ValidationException".to_string(),
                message: "bad input".to_string(),
            })
        }
    }

    struct EchoResource;

    #[async_trait]
    impl ResourceObject for EchoResource {
        fn class_name(&self) -> &str {
            "demo.Echo"
        }
        fn signatures(&self) -> &[MethodSignature] {
            &[]
        }
        async fn invoke(&self, _method: &str, _descriptor: &str, mut args: Vec<Value>) -> Result<Value, RpcError> {
            Ok(args.pop().unwrap_or(Value::Void))
        }
    }

    fn context(instance: Arc<dyn ResourceObject>, version: ProtocolVersion) -> InvocationContext {
        InvocationContext {
            target_instance: instance,
            target_method: "m".to_string(),
            descriptor: "()V".to_string(),
            params: vec![],
            version,
        }
    }

    #[tokio::test]
    async fn v2_propagates_the_business_exception() {
        let ctx = context(Arc::new(FailingResource), ProtocolVersion::V2);
        let err = invoke(ctx).await.unwrap_err();
        assert!(matches!(err, RpcError::Business { .. }));
    }

    #[tokio::test]
    async fn v1_swallows_the_failure_as_none() {
        let ctx = context(Arc::new(FailingResource), ProtocolVersion::V1);
        let outcome = invoke(ctx).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn successful_invocation_returns_the_value_on_both_versions() {
        let ctx = context(Arc::new(EchoResource), ProtocolVersion::V2);
        let outcome = invoke(ctx).await.unwrap();
        assert_eq!(outcome, Some(Value::Void));
    }
}
