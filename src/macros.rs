//! `rpc_resource!`: generates the boilerplate [`crate::registry::ResourceObject`]
//! impl — class name, signature table, and a `(methodName, descriptor)`
//! dispatch table — from a declarative method list. This is the Rust
//! stand-in for the original system's reflective dispatch (SPEC_FULL.md
//! §3.1, §9.1): since there is no runtime method lookup, the match arms
//! generated here *are* the dispatch table.
//!
//! Callers must depend on `async_trait` directly, since the generated impl
//! is itself `#[async_trait]`.
//!
//! ```ignore
//! rpc_resource! {
//!     pub struct Calc;
//!     class_name: "Demo.Calc";
//!     methods: [
//!         {
//!             name: "add",
//!             params: [WireType::I32, WireType::I32],
//!             handler: |args: Vec<Value>| {
//!                 let (Value::I32(a), Value::I32(b)) = (&args[0], &args[1]) else {
//!                     return Err(RpcError::Server {
//!                         class: "TypeError".into(),
//!                         message: "expected two ints".into(),
//!                     });
//!                 };
//!                 Ok(Value::I32(a + b))
//!             },
//!         },
//!     ]
//! }
//! ```

#[macro_export]
macro_rules! rpc_resource {
    (
        $vis:vis struct $name:ident;
        class_name: $class:expr;
        methods: [
            $({
                name: $mname:expr,
                params: [$($ptype:expr),* $(,)?],
                handler: $handler:expr $(,)?
            }),* $(,)?
        ]
    ) => {
        $vis struct $name;

        #[async_trait::async_trait]
        impl $crate::registry::ResourceObject for $name {
            fn class_name(&self) -> &str {
                $class
            }

            fn signatures(&self) -> &[$crate::descriptor::MethodSignature] {
                static SIGS: ::std::sync::OnceLock<::std::vec::Vec<$crate::descriptor::MethodSignature>> =
                    ::std::sync::OnceLock::new();
                SIGS.get_or_init(|| {
                    ::std::vec![
                        $(
                            $crate::descriptor::MethodSignature::new($mname, ::std::vec![$($ptype),*])
                        ),*
                    ]
                })
            }

            async fn invoke(
                &self,
                method: &str,
                descriptor: &str,
                args: ::std::vec::Vec<$crate::value::Value>,
            ) -> ::std::result::Result<$crate::value::Value, $crate::error::RpcError> {
                $(
                    if method == $mname
                        && descriptor == $crate::descriptor::describe_params(&[$($ptype),*])
                    {
                        let handler: fn(::std::vec::Vec<$crate::value::Value>)
                            -> ::std::result::Result<$crate::value::Value, $crate::error::RpcError> = $handler;
                        return handler(args);
                    }
                )*
                ::std::result::Result::Err($crate::error::DescriptorError::NoSuchMethod {
                    class: $class.to_string(),
                    name: method.to_string(),
                    descriptor: descriptor.to_string(),
                }.into())
            }
        }
    };
}
