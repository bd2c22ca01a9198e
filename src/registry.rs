//! ResourceRegistry + ResourceResolver (spec §4.7): registers resource
//! classes/singletons/mappers and resolves a target class name to a live
//! instance.

use crate::descriptor::MethodSignature;
use crate::error::{ProtocolError, RpcError};
use crate::mapper::MapperRegistry;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A user resource: the Rust realization of "a class whose methods are
/// exposed" (spec Glossary). Since Rust has no runtime reflection, the
/// dispatch table this trait exposes stands in for `findMethod` +
/// reflective invocation (SPEC_FULL.md §3.1, §9.1). Implementations are
/// generated by [`crate::rpc_resource!`] for the common case, or written by
/// hand.
#[async_trait]
pub trait ResourceObject: Send + Sync {
    /// Fully-qualified class name under which this resource is registered.
    fn class_name(&self) -> &str;

    /// Fully-qualified names of interfaces this resource implements, used
    /// by [`ResourceResolver::find`] to resolve an interface reference.
    fn interfaces(&self) -> &[&str] {
        &[]
    }

    /// Declared method signatures, used for overload resolution
    /// (`findMethod`) and the V1 ambiguity check.
    fn signatures(&self) -> &[MethodSignature];

    /// Nominal type names this resource can serialize opaquely, consulted
    /// by `strict_type_check` registration (spec §4.7).
    fn self_describing_types(&self) -> &[&str] {
        &[]
    }

    fn has_overload(&self, name: &str) -> bool {
        self.signatures().iter().filter(|m| m.name == name).count() > 1
    }

    /// Invokes `method`/`descriptor` with positional `args`, the Rust
    /// counterpart of reflective invocation (spec §4.6).
    async fn invoke(&self, method: &str, descriptor: &str, args: Vec<Value>) -> Result<Value, RpcError>;
}

/// Produces fresh instances of a resource class for per-request
/// instantiation (spec §4.7 "construct a fresh instance via the
/// zero-argument constructor").
pub trait ResourceFactory: Send + Sync {
    fn class_name(&self) -> &str;
    fn create(&self) -> Arc<dyn ResourceObject>;
}

#[derive(Default)]
struct Maps {
    resource_classes: HashMap<String, Arc<dyn ResourceFactory>>,
    singletons: HashMap<String, Arc<dyn ResourceObject>>,
}

/// Process-wide (or, per SPEC_FULL.md §9.1, server/client-instance-scoped)
/// registry of resource classes, singleton instances, and mappers, guarded
/// by per-map locks so no lock is ever held across I/O (spec §5).
pub struct ResourceRegistry {
    maps: RwLock<Maps>,
    mappers: RwLock<MapperRegistry>,
    strict_type_check: std::sync::atomic::AtomicBool,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
            mappers: RwLock::new(MapperRegistry::new()),
            strict_type_check: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_strict_type_check(&self, enabled: bool) {
        self.strict_type_check
            .store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    fn strict_type_check(&self) -> bool {
        self.strict_type_check.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// `addResource(class)`. Rejects (when `strict_type_check` is enabled)
    /// a class whose public method signatures reference a nominal type with
    /// neither a registered mapper nor self-describing capability; a
    /// warning is logged instead when the flag is off (spec §4.7).
    pub fn add_resource(&self, factory: Arc<dyn ResourceFactory>) -> Result<(), RpcError> {
        self.check_strict_types(factory.class_name(), &factory.create())?;
        let mut maps = self.maps.write().expect("resource registry lock poisoned");
        if maps.resource_classes.contains_key(factory.class_name()) {
            tracing::warn!(class = factory.class_name(), "replacing registered resource class");
        }
        maps.resource_classes
            .insert(factory.class_name().to_string(), factory);
        Ok(())
    }

    pub fn delete_resource(&self, class_name: &str) {
        self.maps
            .write()
            .expect("resource registry lock poisoned")
            .resource_classes
            .remove(class_name);
    }

    /// `addSingleton(instance)`.
    pub fn add_singleton(&self, instance: Arc<dyn ResourceObject>) -> Result<(), RpcError> {
        self.check_strict_types(instance.class_name(), &instance)?;
        let mut maps = self.maps.write().expect("resource registry lock poisoned");
        let key = instance.class_name().to_string();
        if maps.singletons.contains_key(&key) {
            tracing::warn!(class = %key, "replacing registered singleton");
        }
        maps.singletons.insert(key, instance);
        Ok(())
    }

    pub fn delete_singleton(&self, class_name: &str) {
        self.maps
            .write()
            .expect("resource registry lock poisoned")
            .singletons
            .remove(class_name);
    }

    pub fn add_mapper(&self, type_name: impl Into<String>, mapper: impl crate::mapper::Mapper + 'static) {
        self.mappers
            .write()
            .expect("mapper registry lock poisoned")
            .add_mapper(type_name, mapper);
    }

    /// A cloned snapshot of the mapper table, safe to hold across an
    /// `.await` without keeping the registry lock held (spec §5 "snapshots
    /// returned by accessors are copies").
    pub fn mapper_snapshot(&self) -> MapperRegistry {
        self.mappers
            .read()
            .expect("mapper registry lock poisoned")
            .clone()
    }

    fn check_strict_types(
        &self,
        class_name: &str,
        instance: &Arc<dyn ResourceObject>,
    ) -> Result<(), RpcError> {
        let mappers = self.mappers.read().expect("mapper registry lock poisoned");
        for sig in instance.signatures() {
            for param in &sig.params {
                if let crate::descriptor::WireType::Nominal(name) = param {
                    let has_mapper = mappers.has_exact(name);
                    let self_describing = instance.self_describing_types().contains(&name.as_str());
                    if !has_mapper && !self_describing {
                        if self.strict_type_check() {
                            return Err(ProtocolError::ClassNotFound(format!(
                                "{class_name}: no mapper or self-describing capability for `{name}`"
                            ))
                            .into());
                        }
                        tracing::warn!(
                            class = class_name,
                            type_name = %name,
                            "registering method with no mapper or self-describing capability for parameter type"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolves a target class reference to a live resource instance (spec
/// §4.7 `find`).
pub struct ResourceResolver<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self { registry }
    }

    pub fn find(&self, target_class: &str) -> Result<Arc<dyn ResourceObject>, RpcError> {
        let maps = self.registry.maps.read().expect("resource registry lock poisoned");

        // 1. singleton by exact FQN.
        if let Some(instance) = maps.singletons.get(target_class) {
            return Ok(Arc::clone(instance));
        }

        // 2. target_class may name an interface: scan for an implementor.
        for instance in maps.singletons.values() {
            if instance.interfaces().contains(&target_class) {
                return Ok(Arc::clone(instance));
            }
        }
        for factory in maps.resource_classes.values() {
            let probe = factory.create();
            if probe.interfaces().contains(&target_class) {
                return Ok(probe);
            }
        }

        // 3. "canonical" variant (dots instead of `$`); Rust type names have
        // no nested-class separator, so this is the identity mapping here —
        // kept for wire-format parity with the spec's resolution order.
        let canonical = target_class.replace('$', ".");
        if canonical != target_class {
            if let Some(instance) = maps.singletons.get(&canonical) {
                return Ok(Arc::clone(instance));
            }
        }

        // 4. fresh instance via the registered factory.
        if let Some(factory) = maps.resource_classes.get(target_class) {
            return Ok(factory.create());
        }
        if let Some(factory) = maps.resource_classes.get(&canonical) {
            return Ok(factory.create());
        }

        Err(ProtocolError::ClassNotFound(target_class.to_string()).into())
    }
}
