//! Per-context bridge state

use std::rc::{Rc, Weak};

use tether_runtime::{Identifier, IdentifierTable, NativeObject, NativeValue, ObjectRef, ObjectRegistry, RootId};
use tether_script::{Isolate, ScriptObject, ScriptValue};

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::script_object::ScriptObjectMap;
use crate::stats::{BridgeStats, Counters};
use crate::thunk::{MethodThunk, ThunkCache};
use crate::wrapper_table::WrapperTable;

pub(crate) struct BridgeInner {
    this: Weak<BridgeInner>,
    pub(crate) isolate: Isolate,
    pub(crate) identifiers: Rc<IdentifierTable>,
    pub(crate) registry: Rc<ObjectRegistry>,
    /// Root for objects reached through an owner that has none
    pub(crate) detached_root: RootId,
    pub(crate) config: BridgeConfig,
    pub(crate) wrappers: WrapperTable,
    pub(crate) thunks: ThunkCache,
    pub(crate) script_objects: ScriptObjectMap,
    pub(crate) counters: Counters,
}

impl BridgeInner {
    /// Weak self link for hooks and finalizers
    pub(crate) fn weak(&self) -> Weak<BridgeInner> {
        self.this.clone()
    }
}

/// One scripting context's view of the native object world
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<BridgeInner>,
}

impl Bridge {
    pub fn new(isolate: Isolate, registry: Rc<ObjectRegistry>, config: BridgeConfig) -> Self {
        let detached_root = registry.create_root();
        let inner = Rc::new_cyclic(|this| BridgeInner {
            this: this.clone(),
            isolate,
            identifiers: Rc::new(IdentifierTable::new()),
            registry,
            detached_root,
            config,
            wrappers: WrapperTable::default(),
            thunks: ThunkCache::default(),
            script_objects: ScriptObjectMap::default(),
            counters: Counters::default(),
        });
        log::debug!("bridge created (detached {})", detached_root);
        Bridge { inner }
    }

    pub fn isolate(&self) -> &Isolate {
        &self.inner.isolate
    }

    pub fn identifiers(&self) -> &IdentifierTable {
        &self.inner.identifiers
    }

    pub fn registry(&self) -> &Rc<ObjectRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn detached_root(&self) -> RootId {
        self.inner.detached_root
    }

    /// The proxy for `object`, created on first use
    pub fn wrap(&self, object: &NativeObject, root: RootId) -> BridgeResult<ScriptObject> {
        self.inner.wrap(object, root)
    }

    /// The existing proxy for `object`, if one is reachable
    pub fn proxy_for(&self, object: &NativeObject) -> Option<ScriptObject> {
        self.inner.wrappers.lookup(object)
    }

    /// The native object behind a proxy, if it still has one
    pub fn native_for(&self, proxy: &ScriptObject) -> Option<NativeObject> {
        self.inner.proxied_object(proxy)
    }

    /// Detach `object` from its proxy and release the table's reference.
    /// The proxy stays reachable from script but reports the object deleted.
    pub fn forget(&self, object: &NativeObject) -> bool {
        self.inner.forget(object)
    }

    /// The native object for a script object: the proxied object for a
    /// proxy, otherwise the script object's bridging object
    pub fn script_object_to_native(&self, object: &ScriptObject, root: RootId) -> BridgeResult<ObjectRef> {
        self.inner.script_object_to_native(object, root)
    }

    pub fn to_native(&self, value: &ScriptValue, owner: Option<&NativeObject>) -> NativeValue {
        self.inner.to_native(value, owner)
    }

    pub fn to_script(&self, value: &NativeValue, owner: Option<&NativeObject>) -> BridgeResult<ScriptValue> {
        self.inner.to_script(value, owner)
    }

    /// The shared method thunk for `identifier` and its function object
    pub fn method_thunk(&self, identifier: &Identifier) -> BridgeResult<(Rc<MethodThunk>, ScriptObject)> {
        self.inner.method_thunk(identifier)
    }

    /// The cached thunk for `identifier`, without creating one
    pub fn cached_thunk(&self, identifier: &Identifier) -> Option<Rc<MethodThunk>> {
        self.inner.thunks.get(identifier)
    }

    /// Run the engine's pending weak finalizers
    pub fn collect_garbage(&self) -> usize {
        self.inner.isolate.collect_garbage()
    }

    /// Invalidate every native object registered against `root`
    pub fn teardown_root(&self, root: RootId) -> usize {
        self.inner.registry.unregister_root(root)
    }

    pub fn stats(&self) -> BridgeStats {
        let inner = &self.inner;
        let counters = &inner.counters;
        BridgeStats {
            proxies_created: counters.proxies_created.get(),
            proxies_live: inner.wrappers.len(),
            proxies_reclaimed: counters.proxies_reclaimed.get(),
            proxies_forgotten: counters.proxies_forgotten.get(),
            thunks_created: counters.thunks_created.get(),
            thunks_live: inner.thunks.len(),
            thunks_reclaimed: counters.thunks_reclaimed.get(),
            script_objects_created: counters.script_objects_created.get(),
            script_objects_live: inner.script_objects.len(),
            identifiers: inner.identifiers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::script_object::ScriptObjectClass;
    use crate::testing::TestPlugin;
    use tether_runtime::{Capability, CapabilitySet, PluginError};
    use tether_script::{ErrorKind, PropertyKey, ScriptError};

    fn setup() -> (Bridge, RootId) {
        setup_with(BridgeConfig::default())
    }

    fn setup_with(config: BridgeConfig) -> (Bridge, RootId) {
        let _ = env_logger::builder().is_test(true).try_init();
        let registry = Rc::new(ObjectRegistry::new());
        let root = registry.create_root();
        (Bridge::new(Isolate::new(), registry, config), root)
    }

    fn plugin(object: &NativeObject) -> Rc<TestPlugin> {
        object.downcast_class::<TestPlugin>().unwrap()
    }

    fn full() -> TestPlugin {
        TestPlugin::new(CapabilitySet::all())
    }

    #[test]
    fn test_wrap_returns_one_proxy_per_object() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let first = bridge.wrap(&object, root).unwrap();
        let second = bridge.wrap(&object, root).unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(object.refcount(), 2);
        assert_eq!(bridge.stats().proxies_created, 1);
        assert_eq!(bridge.registry().root_of(&object), Some(root));
        assert!(bridge.native_for(&first).unwrap().ptr_eq(&object));
    }

    #[test]
    fn test_round_trip_preserves_identity() {
        let (bridge, _root) = setup();
        let object = NativeObject::create(full());
        let value = NativeValue::from(object.clone());
        let script = bridge.to_script(&value, None).unwrap();
        drop(value);
        let back = bridge.to_native(&script, None);
        assert_eq!(back.as_object(), Some(&object));
        assert_eq!(object.refcount(), 3);
        drop(back);
        assert_eq!(object.refcount(), 2);

        let script_object = bridge.isolate().new_object().unwrap();
        let native = bridge.to_native(&ScriptValue::from(script_object.clone()), None);
        let again = bridge.to_script(&native, None).unwrap();
        assert!(again.as_object().unwrap().ptr_eq(&script_object));
        assert_eq!(bridge.to_native(&again, None), native);
        assert_eq!(bridge.stats().script_objects_created, 1);
    }

    #[test]
    fn test_objects_reached_through_owner_share_its_root() {
        let (bridge, root) = setup();
        let owner = NativeObject::create(full());
        let child = NativeObject::create(full());
        bridge.wrap(&owner, root).unwrap();
        bridge.to_script(&NativeValue::from(child.clone()), Some(&*owner)).unwrap();
        assert_eq!(bridge.registry().root_of(&child), Some(root));

        let orphan = NativeObject::create(full());
        bridge.to_script(&NativeValue::from(orphan.clone()), None).unwrap();
        assert_eq!(bridge.registry().root_of(&orphan), Some(bridge.detached_root()));
    }

    #[test]
    fn test_reclaimed_proxy_releases_once() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        drop(proxy);
        assert_eq!(object.refcount(), 2);

        assert_eq!(bridge.collect_garbage(), 1);
        assert_eq!(object.refcount(), 1);
        let stats = bridge.stats();
        assert_eq!(stats.proxies_live, 0);
        assert_eq!(stats.proxies_reclaimed, 1);

        assert_eq!(bridge.collect_garbage(), 0);
        assert_eq!(object.refcount(), 1);
    }

    #[test]
    fn test_finalizer_after_invalidation_does_not_release() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        object.invalidate();
        drop(proxy);
        bridge.collect_garbage();
        assert_eq!(object.refcount(), 2);
        assert_eq!(plugin(&object).deallocated.get(), 0);
    }

    #[test]
    fn test_stale_entry_is_purged_before_rewrap() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let first = bridge.wrap(&object, root).unwrap();
        let first_id = first.id();
        drop(first);

        let second = bridge.wrap(&object, root).unwrap();
        assert_ne!(second.id(), first_id);
        assert_eq!(object.refcount(), 2);

        // The first proxy's finalizer must leave the new entry alone.
        bridge.collect_garbage();
        assert!(bridge.proxy_for(&object).unwrap().ptr_eq(&second));
        assert_eq!(object.refcount(), 2);
    }

    #[test]
    fn test_wrap_failure_retains_nothing() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        bridge.isolate().terminate_execution();
        let error = bridge.wrap(&object, root).unwrap_err();
        assert!(matches!(error, BridgeError::Script(_)));
        assert_eq!(object.refcount(), 1);
        assert_eq!(bridge.stats().proxies_live, 0);
        assert!(!bridge.registry().is_registered(&object));
    }

    #[test]
    fn test_dead_object_short_circuits_every_hook() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 3).with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        object.invalidate();

        assert_eq!(proxy.get("volume").unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(proxy.set("volume", 4).unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(proxy.own_keys().unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(
            proxy.call(&ScriptValue::Undefined, &[]).unwrap_err().kind,
            ErrorKind::ReferenceError
        );
        assert_eq!(proxy.construct(&[]).unwrap_err().message, "native object deleted");
        assert!(plugin(&object).calls().is_empty());
    }

    #[test]
    fn test_object_destroyed_during_call() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("play"));
        let argument = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        let argument_proxy = bridge.wrap(&argument, root).unwrap();
        *plugin(&object).during_call.borrow_mut() = Some(Box::new(|this: &NativeObject| this.invalidate()));

        let error = proxy
            .call_method("play", &[ScriptValue::from(argument_proxy.clone())])
            .unwrap_err();
        assert_eq!(error, ScriptError::reference_error("native object deleted"));
        assert_eq!(argument.refcount(), 2);
        assert_eq!(
            plugin(&object).calls(),
            vec!["has_property play", "has_method play", "invoke play"]
        );
        assert_eq!(plugin(&object).invalidated.get(), 1);
    }

    #[test]
    fn test_object_destroyed_during_getter() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 3));
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_call.borrow_mut() = Some(Box::new(|this: &NativeObject| this.invalidate()));
        assert_eq!(proxy.get("volume").unwrap_err().kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn test_object_destroyed_during_lookup_before_set() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 3));
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_lookup.borrow_mut() = Some(Box::new(|this: &NativeObject, _: &str| this.invalidate()));

        assert_eq!(proxy.set("volume", 4).unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(plugin(&object).calls(), vec!["has_property volume"]);
        assert_eq!(
            plugin(&object).properties.borrow().get("volume"),
            Some(&NativeValue::Int32(3))
        );
        assert!(proxy.get_own(&PropertyKey::from("volume")).is_none());
    }

    #[test]
    fn test_object_destroyed_during_query() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 3));
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_lookup.borrow_mut() = Some(Box::new(|this: &NativeObject, _: &str| this.invalidate()));
        assert_eq!(proxy.has("volume").unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(plugin(&object).calls(), vec!["has_property volume"]);

        let object = NativeObject::create(full().with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_lookup.borrow_mut() = Some(Box::new(|this: &NativeObject, slot: &str| {
            if slot == "has_method" {
                this.invalidate();
            }
        }));
        assert_eq!(proxy.has("play").unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(plugin(&object).calls(), vec!["has_property play", "has_method play"]);
    }

    #[test]
    fn test_object_destroyed_during_method_lookup() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_lookup.borrow_mut() = Some(Box::new(|this: &NativeObject, slot: &str| {
            if slot == "has_method" {
                this.invalidate();
            }
        }));

        assert_eq!(proxy.get("play").unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(plugin(&object).calls(), vec!["has_property play", "has_method play"]);
        assert_eq!(bridge.stats().thunks_created, 0);
    }

    #[test]
    fn test_object_destroyed_during_enumeration() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        *plugin(&object).enumeration.borrow_mut() = vec![bridge.identifiers().intern_name("a")];
        let proxy = bridge.wrap(&object, root).unwrap();
        *plugin(&object).during_call.borrow_mut() = Some(Box::new(|this: &NativeObject| this.invalidate()));

        assert_eq!(proxy.own_keys().unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(plugin(&object).calls(), vec!["enumerate"]);
    }

    #[test]
    fn test_failing_getter_ignores_own_value() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("locked", true).with_read_only("locked"));
        let proxy = bridge.wrap(&object, root).unwrap();

        // The rejected store lands on the proxy itself.
        proxy.set("locked", false).unwrap();
        assert_eq!(proxy.get_own(&PropertyKey::from("locked")), Some(ScriptValue::from(false)));
        assert_eq!(proxy.get("locked").unwrap(), ScriptValue::from(true));

        plugin(&object).fail_calls.set(true);
        assert!(proxy.get("locked").unwrap().is_undefined());
    }

    #[test]
    fn test_proxy_converts_to_its_native_object() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();

        let native = bridge.script_object_to_native(&proxy, root).unwrap();
        assert_eq!(native, object);
        assert_eq!(object.refcount(), 3);
        assert_eq!(bridge.stats().script_objects_created, 0);
        drop(native);

        bridge.forget(&object);
        assert_eq!(
            bridge.script_object_to_native(&proxy, root).unwrap_err(),
            BridgeError::DeletedObject
        );
        assert_eq!(object.refcount(), 1);
    }

    #[test]
    fn test_foreign_script_object_is_rejected() {
        let (bridge, root) = setup();
        let own = bridge.isolate().new_object().unwrap();
        let native = bridge.script_object_to_native(&own, root).unwrap();

        let other = Isolate::new();
        let foreign = other.new_object().unwrap();
        assert_eq!(
            bridge.script_object_to_native(&foreign, root).unwrap_err(),
            BridgeError::ForeignObject(foreign.id())
        );
        assert!(bridge.to_native(&ScriptValue::from(foreign), None).is_null());
        assert_eq!(bridge.stats().script_objects_created, 1);

        let again = bridge.script_object_to_native(&own, root).unwrap();
        assert_eq!(again, native);
    }

    #[test]
    fn test_missing_call_slots_yield_undefined() {
        let (bridge, root) = setup();
        let capabilities = CapabilitySet::empty().with(Capability::HasMethod);
        let object = NativeObject::create(TestPlugin::new(capabilities).with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();

        assert!(proxy.call_method("play", &[]).unwrap().is_undefined());
        assert!(proxy.call(&ScriptValue::Undefined, &[]).unwrap().is_undefined());
        assert!(proxy.construct(&[]).unwrap().is_undefined());
        assert!(proxy.own_keys().unwrap().is_empty());
        assert_eq!(plugin(&object).calls(), vec!["has_method play"]);
    }

    #[test]
    fn test_method_thunk_shared_across_objects() {
        let (bridge, root) = setup();
        let a = NativeObject::create(full().with_method("play"));
        let b = NativeObject::create(full().with_method("play"));
        let proxy_a = bridge.wrap(&a, root).unwrap();
        let proxy_b = bridge.wrap(&b, root).unwrap();

        let play_a = proxy_a.get("play").unwrap();
        let play_b = proxy_b.get("play").unwrap();
        assert_eq!(play_a, play_b);

        let identifier = bridge.identifiers().intern_name("play");
        let thunk = bridge.cached_thunk(&identifier).unwrap();
        let function = play_a.as_object().unwrap();
        assert!(thunk.function().unwrap().ptr_eq(function));
        assert_eq!(thunk.identifier(), &identifier);
        assert_eq!(function.name(), "play");
        assert_eq!(bridge.stats().thunks_created, 1);

        let result = function
            .call(&ScriptValue::from(proxy_b.clone()), &[ScriptValue::from(1)])
            .unwrap();
        assert_eq!(result, ScriptValue::from("play:i1"));
        assert_eq!(plugin(&b).calls().last().map(String::as_str), Some("invoke play"));
        assert!(!plugin(&a).calls().iter().any(|call| call == "invoke play"));
    }

    #[test]
    fn test_thunk_requires_proxy_receiver() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        let play = proxy.get("play").unwrap();
        let play = play.as_object().unwrap();

        let plain = bridge.isolate().new_object().unwrap();
        let error = play.call(&ScriptValue::from(plain), &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ReferenceError);
        let error = play.call(&ScriptValue::Undefined, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ReferenceError);
        let error = play.construct(&[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn test_thunk_entry_dropped_with_its_function() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        let play = proxy.get("play").unwrap();
        drop(play);

        assert_eq!(bridge.collect_garbage(), 1);
        let stats = bridge.stats();
        assert_eq!(stats.thunks_live, 0);
        assert_eq!(stats.thunks_reclaimed, 1);

        proxy.get("play").unwrap();
        assert_eq!(bridge.stats().thunks_created, 2);
    }

    #[test]
    fn test_purged_thunk_counts_as_reclaimed() {
        let (bridge, _root) = setup();
        let play = bridge.identifiers().intern_name("play");
        let (first, function) = bridge.method_thunk(&play).unwrap();
        drop(first);
        drop(function);

        // Reclaimed but not yet finalized: the next lookup purges it.
        let (_, function) = bridge.method_thunk(&play).unwrap();
        let stats = bridge.stats();
        assert_eq!(stats.thunks_created, 2);
        assert_eq!(stats.thunks_reclaimed, 1);

        // The old function's finalizer finds a newer entry and leaves it alone.
        bridge.collect_garbage();
        assert_eq!(bridge.stats().thunks_reclaimed, 1);
        assert!(bridge.cached_thunk(&play).is_some());
        drop(function);
    }

    #[test]
    fn test_unnamed_method_functions() {
        let config = BridgeConfig {
            name_method_functions: false,
            ..BridgeConfig::default()
        };
        let (bridge, root) = setup_with(config);
        let object = NativeObject::create(full().with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        let play = proxy.get("play").unwrap();
        assert_eq!(play.as_object().unwrap().name(), "");
    }

    #[test]
    fn test_failing_getter_reads_undefined() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 3));
        let proxy = bridge.wrap(&object, root).unwrap();
        assert_eq!(proxy.get("volume").unwrap(), ScriptValue::from(3));

        plugin(&object).fail_calls.set(true);
        assert!(proxy.get("volume").unwrap().is_undefined());
    }

    #[test]
    fn test_set_property() {
        let (bridge, root) = setup();
        let object = NativeObject::create(
            full()
                .with_property("volume", 1)
                .with_property("locked", true)
                .with_read_only("locked"),
        );
        let proxy = bridge.wrap(&object, root).unwrap();

        proxy.set("volume", 2.5).unwrap();
        assert_eq!(
            plugin(&object).properties.borrow().get("volume"),
            Some(&NativeValue::Double(2.5))
        );

        // Rejected and unknown stores land on the proxy itself.
        proxy.set("locked", false).unwrap();
        assert_eq!(
            plugin(&object).properties.borrow().get("locked"),
            Some(&NativeValue::Bool(true))
        );
        assert_eq!(proxy.get_own(&PropertyKey::from("locked")), Some(ScriptValue::from(false)));
        proxy.set("other", 1).unwrap();
        assert!(!plugin(&object).properties.borrow().contains_key("other"));
        assert_eq!(proxy.get("other").unwrap(), ScriptValue::from(1));
    }

    #[test]
    fn test_query() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 1).with_method("play"));
        let proxy = bridge.wrap(&object, root).unwrap();
        assert!(proxy.has("volume").unwrap());
        assert!(proxy.has("play").unwrap());
        assert!(!proxy.has("missing").unwrap());
    }

    #[test]
    fn test_enumeration_kinds_preserve_native_order() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let table = bridge.identifiers();
        *plugin(&object).enumeration.borrow_mut() = vec![
            table.intern_name("b"),
            table.intern_index(2),
            table.intern_name("a"),
            table.intern_index(-1),
            table.intern_index(0),
        ];
        let proxy = bridge.wrap(&object, root).unwrap();
        assert_eq!(
            proxy.own_keys().unwrap(),
            vec![
                PropertyKey::Index(2),
                PropertyKey::Index(0),
                PropertyKey::from("b"),
                PropertyKey::from("a"),
                PropertyKey::from("-1"),
            ]
        );
    }

    #[test]
    fn test_enumeration_kind_can_be_disabled() {
        let config = BridgeConfig {
            enumerate_indexed: false,
            ..BridgeConfig::default()
        };
        let (bridge, root) = setup_with(config);
        let object = NativeObject::create(full());
        let table = bridge.identifiers();
        *plugin(&object).enumeration.borrow_mut() = vec![table.intern_name("b"), table.intern_index(2)];
        let proxy = bridge.wrap(&object, root).unwrap();
        assert_eq!(
            proxy.own_keys().unwrap(),
            vec![PropertyKey::from("b"), PropertyKey::Index(2)]
        );
    }

    #[test]
    fn test_failed_enumeration_is_empty() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        *plugin(&object).enumeration.borrow_mut() = vec![bridge.identifiers().intern_name("a")];
        plugin(&object).fail_calls.set(true);
        let proxy = bridge.wrap(&object, root).unwrap();
        assert!(proxy.own_keys().unwrap().is_empty());
    }

    #[test]
    fn test_invocation_failure_releases_arguments() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("play"));
        let argument = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        let argument_proxy = bridge.wrap(&argument, root).unwrap();
        plugin(&object).fail_calls.set(true);

        let error = proxy
            .call_method("play", &[ScriptValue::from(argument_proxy.clone()), ScriptValue::from(2)])
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Error);
        assert_eq!(error.message, "error calling method on native object");
        assert_eq!(argument.refcount(), 2);
    }

    #[test]
    fn test_arguments_marshalled_in_order() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();

        let result = proxy
            .call(&ScriptValue::Undefined, &[ScriptValue::from(2.5), ScriptValue::from("x"), ScriptValue::from(3)])
            .unwrap();
        assert_eq!(result, ScriptValue::from("default:d2.5,sx,i3"));

        let result = proxy
            .construct(&[ScriptValue::from(true), ScriptValue::Null, ScriptValue::Undefined])
            .unwrap();
        assert_eq!(result, ScriptValue::from("construct:btrue,null,void"));
    }

    #[test]
    fn test_returned_object_maps_to_existing_proxy() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_method("echo"));
        let other = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        let other_proxy = bridge.wrap(&other, root).unwrap();

        let result = proxy
            .call_method("echo", &[ScriptValue::from(other_proxy.clone())])
            .unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&other_proxy));
        assert_eq!(other.refcount(), 2);
    }

    #[test]
    fn test_forget_detaches_proxy() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 1));
        let proxy = bridge.wrap(&object, root).unwrap();

        assert!(bridge.forget(&object));
        assert!(!bridge.forget(&object));
        assert_eq!(object.refcount(), 1);
        assert_eq!(proxy.get("volume").unwrap_err().kind, ErrorKind::ReferenceError);
        assert_eq!(bridge.to_native(&ScriptValue::from(proxy.clone()), None), NativeValue::Null);
        assert!(bridge.native_for(&proxy).is_none());

        let fresh = bridge.wrap(&object, root).unwrap();
        assert!(!fresh.ptr_eq(&proxy));
        drop(proxy);
        bridge.collect_garbage();
        assert_eq!(object.refcount(), 2);
        assert_eq!(bridge.stats().proxies_forgotten, 1);
    }

    #[test]
    fn test_dead_proxy_marshals_to_null() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let proxy = bridge.wrap(&object, root).unwrap();
        object.invalidate();
        assert_eq!(bridge.to_native(&ScriptValue::from(proxy), None), NativeValue::Null);
    }

    #[test]
    fn test_root_teardown_invalidates_proxied_objects() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 1));
        let proxy = bridge.wrap(&object, root).unwrap();

        assert_eq!(bridge.teardown_root(root), 1);
        assert!(!object.is_alive());
        assert_eq!(plugin(&object).invalidated.get(), 1);
        assert_eq!(proxy.get("volume").unwrap_err().kind, ErrorKind::ReferenceError);

        drop(proxy);
        bridge.collect_garbage();
        assert_eq!(object.refcount(), 2);
    }

    #[test]
    fn test_proxy_outliving_bridge_reports_deleted() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full().with_property("volume", 1));
        let proxy = bridge.wrap(&object, root).unwrap();
        drop(bridge);
        assert_eq!(object.refcount(), 1);
        assert_eq!(proxy.get("volume").unwrap_err().kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn test_script_object_seen_from_native() {
        let (bridge, root) = setup();
        let isolate = bridge.isolate().clone();
        let script = isolate.new_object().unwrap();
        script.set("title", "song").unwrap();
        let greet = isolate
            .new_function("greet", ScriptValue::Undefined, |info| {
                let title = match info.this.as_object() {
                    Some(this) => this.get("title")?,
                    None => ScriptValue::Undefined,
                };
                Ok(ScriptValue::from(format!("{}:{}", title.as_str().unwrap_or(""), info.args.len())))
            })
            .unwrap();
        script.set("greet", greet).unwrap();

        let native = bridge.script_object_to_native(&script, root).unwrap();
        let class = native.class();
        let title = bridge.identifiers().intern_name("title");
        let greet_id = bridge.identifiers().intern_name("greet");

        assert!(class.has_property(&native, &title));
        assert!(!class.has_method(&native, &title));
        assert!(class.has_method(&native, &greet_id));
        assert_eq!(class.get_property(&native, &title).unwrap(), NativeValue::from("song"));
        assert_eq!(
            class.invoke(&native, &greet_id, &[NativeValue::from(1), NativeValue::Null]).unwrap(),
            NativeValue::from("song:2")
        );

        class.set_property(&native, &title, &NativeValue::from(7)).unwrap();
        assert_eq!(script.get("title").unwrap(), ScriptValue::from(7));
        class.remove_property(&native, &title).unwrap();
        assert!(!script.has("title").unwrap());
        assert_eq!(class.enumerate(&native).unwrap(), vec![greet_id.clone()]);
    }

    #[test]
    fn test_script_exception_becomes_plugin_failure() {
        let (bridge, root) = setup();
        let isolate = bridge.isolate().clone();
        let script = isolate.new_object().unwrap();
        let thrower = isolate
            .new_function("fail", ScriptValue::Undefined, |_| Err(ScriptError::type_error("nope")))
            .unwrap();
        script.set("fail", thrower).unwrap();

        let native = bridge.script_object_to_native(&script, root).unwrap();
        let fail = bridge.identifiers().intern_name("fail");
        let error = native.class().invoke(&native, &fail, &[]).unwrap_err();
        assert_eq!(error, PluginError::failed("TypeError: nope"));
    }

    #[test]
    fn test_callable_script_object_invoke_default_and_construct() {
        let (bridge, root) = setup();
        let function = bridge
            .isolate()
            .new_function("count", ScriptValue::Undefined, |info| {
                if info.is_construct {
                    Ok(ScriptValue::Undefined)
                } else {
                    Ok(ScriptValue::from(info.args.len() as f64))
                }
            })
            .unwrap();
        let native = bridge.script_object_to_native(&function, root).unwrap();
        let class = native.class();
        assert_eq!(
            class.invoke_default(&native, &[NativeValue::Null, NativeValue::Null]).unwrap(),
            NativeValue::Int32(2)
        );
        // Construction yields the new receiver, bridged back as a native object.
        let constructed = class.construct(&native, &[]).unwrap();
        assert_eq!(constructed.as_object().unwrap().class_name(), "ScriptObject");
    }

    #[test]
    fn test_one_bridging_object_per_script_object() {
        let (bridge, root) = setup();
        let script = bridge.isolate().new_object().unwrap();
        let native = bridge.script_object_to_native(&script, root).unwrap();
        let again = bridge.script_object_to_native(&script, root).unwrap();
        assert_eq!(again, native);
        assert_eq!(native.refcount(), 2);

        // Wrapping a bridging object hands back the script object.
        assert!(bridge.wrap(&native, root).unwrap().ptr_eq(&script));
        assert_eq!(bridge.stats().proxies_created, 0);

        drop(again);
        assert_eq!(bridge.stats().script_objects_live, 1);
        let handle = native.object().clone();
        drop(native);
        assert!(!handle.is_alive());
        assert_eq!(bridge.stats().script_objects_live, 0);
        assert!(handle.downcast_class::<ScriptObjectClass>().unwrap().script_object().is_none());
    }

    #[test]
    fn test_invalidated_bridging_object_lets_go_of_script_object() {
        let (bridge, root) = setup();
        let script = bridge.isolate().new_object().unwrap();
        let native = bridge.script_object_to_native(&script, root).unwrap();
        let weak = script.downgrade();
        drop(script);
        assert!(weak.upgrade().is_some());

        bridge.teardown_root(root);
        assert!(weak.is_reclaimed());
        let title = bridge.identifiers().intern_name("title");
        assert_eq!(
            native.class().get_property(&native, &title).unwrap_err(),
            PluginError::Invalidated
        );
    }

    #[test]
    fn test_stats_render_as_json() {
        let (bridge, root) = setup();
        let object = NativeObject::create(full());
        let _proxy = bridge.wrap(&object, root).unwrap();
        let json = bridge.stats().to_json().unwrap();
        assert!(json.contains("\"proxies_created\":1"));
        assert!(json.contains("\"proxies_live\":1"));
    }
}
