//! Configurable plugin class for bridge tests

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tether_runtime::{CapabilitySet, Identifier, NativeClass, NativeObject, NativeValue, PluginError, PluginResult};

pub(crate) type Hook = Box<dyn Fn(&NativeObject)>;
/// Receives the object and the name of the lookup slot being run
pub(crate) type LookupHook = Box<dyn Fn(&NativeObject, &str)>;

/// Property bag with named methods
///
/// Methods answer `"<name>:<args>"`, except `echo` which returns its first
/// argument. Every vtable call is appended to `calls`.
pub(crate) struct TestPlugin {
    capabilities: CapabilitySet,
    pub(crate) properties: RefCell<HashMap<String, NativeValue>>,
    pub(crate) read_only: Vec<String>,
    methods: Vec<String>,
    pub(crate) enumeration: RefCell<Vec<Identifier>>,
    pub(crate) calls: RefCell<Vec<String>>,
    pub(crate) fail_calls: Cell<bool>,
    /// Runs inside invoke, get_property and enumerate before they return
    pub(crate) during_call: RefCell<Option<Hook>>,
    /// Runs inside has_property and has_method
    pub(crate) during_lookup: RefCell<Option<LookupHook>>,
    pub(crate) invalidated: Cell<u32>,
    pub(crate) deallocated: Cell<u32>,
}

impl TestPlugin {
    pub(crate) fn new(capabilities: CapabilitySet) -> Self {
        TestPlugin {
            capabilities,
            properties: RefCell::new(HashMap::new()),
            read_only: Vec::new(),
            methods: Vec::new(),
            enumeration: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            fail_calls: Cell::new(false),
            during_call: RefCell::new(None),
            during_lookup: RefCell::new(None),
            invalidated: Cell::new(0),
            deallocated: Cell::new(0),
        }
    }

    pub(crate) fn with_property(self, name: &str, value: impl Into<NativeValue>) -> Self {
        self.properties.borrow_mut().insert(name.to_string(), value.into());
        self
    }

    pub(crate) fn with_read_only(mut self, name: &str) -> Self {
        self.read_only.push(name.to_string());
        self
    }

    pub(crate) fn with_method(mut self, name: &str) -> Self {
        self.methods.push(name.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn run_hook(&self, this: &NativeObject) {
        if let Some(hook) = self.during_call.borrow().as_ref() {
            hook(this);
        }
    }

    fn run_lookup_hook(&self, this: &NativeObject, slot: &str) {
        if let Some(hook) = self.during_lookup.borrow().as_ref() {
            hook(this, slot);
        }
    }

    fn fail_if_asked(&self) -> PluginResult<()> {
        if self.fail_calls.get() {
            Err(PluginError::failed("asked to fail"))
        } else {
            Ok(())
        }
    }
}

/// Compact rendering of an argument list
pub(crate) fn describe(args: &[NativeValue]) -> String {
    args.iter()
        .map(|arg| match arg {
            NativeValue::Void => "void".to_string(),
            NativeValue::Null => "null".to_string(),
            NativeValue::Bool(b) => format!("b{}", b),
            NativeValue::Int32(i) => format!("i{}", i),
            NativeValue::Double(d) => format!("d{}", d),
            NativeValue::String(s) => format!("s{}", s),
            NativeValue::Object(o) => format!("o{}", o.class_name()),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl NativeClass for TestPlugin {
    fn class_name(&self) -> &str {
        "TestPlugin"
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn has_method(&self, this: &NativeObject, name: &Identifier) -> bool {
        self.record(format!("has_method {}", name));
        self.run_lookup_hook(this, "has_method");
        self.methods.iter().any(|method| *method == name.to_name())
    }

    fn invoke(&self, this: &NativeObject, name: &Identifier, args: &[NativeValue]) -> PluginResult<NativeValue> {
        self.record(format!("invoke {}", name));
        self.run_hook(this);
        self.fail_if_asked()?;
        if name.name() == Some("echo") {
            return Ok(args.first().cloned().unwrap_or_default());
        }
        Ok(NativeValue::from(format!("{}:{}", name, describe(args))))
    }

    fn invoke_default(&self, this: &NativeObject, args: &[NativeValue]) -> PluginResult<NativeValue> {
        self.record("invoke_default".to_string());
        self.run_hook(this);
        self.fail_if_asked()?;
        Ok(NativeValue::from(format!("default:{}", describe(args))))
    }

    fn has_property(&self, this: &NativeObject, name: &Identifier) -> bool {
        self.record(format!("has_property {}", name));
        self.run_lookup_hook(this, "has_property");
        self.properties.borrow().contains_key(&name.to_name())
    }

    fn get_property(&self, this: &NativeObject, name: &Identifier) -> PluginResult<NativeValue> {
        self.record(format!("get_property {}", name));
        self.run_hook(this);
        self.fail_if_asked()?;
        self.properties
            .borrow()
            .get(&name.to_name())
            .cloned()
            .ok_or(PluginError::Unsupported)
    }

    fn set_property(&self, _this: &NativeObject, name: &Identifier, value: &NativeValue) -> PluginResult<()> {
        self.record(format!("set_property {}", name));
        let key = name.to_name();
        if self.read_only.contains(&key) {
            return Err(PluginError::failed(format!("{} is read-only", key)));
        }
        let previous = self.properties.borrow_mut().insert(key, value.clone());
        drop(previous);
        Ok(())
    }

    fn remove_property(&self, _this: &NativeObject, name: &Identifier) -> PluginResult<()> {
        self.record(format!("remove_property {}", name));
        let previous = self.properties.borrow_mut().remove(&name.to_name());
        drop(previous);
        Ok(())
    }

    fn enumerate(&self, this: &NativeObject) -> PluginResult<Vec<Identifier>> {
        self.record("enumerate".to_string());
        self.run_hook(this);
        self.fail_if_asked()?;
        Ok(self.enumeration.borrow().clone())
    }

    fn construct(&self, this: &NativeObject, args: &[NativeValue]) -> PluginResult<NativeValue> {
        self.record("construct".to_string());
        self.run_hook(this);
        self.fail_if_asked()?;
        Ok(NativeValue::from(format!("construct:{}", describe(args))))
    }

    fn invalidate(&self, _this: &NativeObject) {
        self.invalidated.set(self.invalidated.get() + 1);
    }

    fn deallocate(&self, _this: &NativeObject) {
        self.deallocated.set(self.deallocated.get() + 1);
        // Deallocation drops whatever the object still holds.
        let properties = std::mem::take(&mut *self.properties.borrow_mut());
        drop(properties);
    }
}
