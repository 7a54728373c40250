//! Hooks an embedder installs on script objects

use std::rc::Rc;

use crate::error::{ScriptError, ScriptResult};
use crate::key::PropertyKey;
use crate::object::ScriptObject;
use crate::value::ScriptValue;

/// Which half of the key space an enumeration asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationKind {
    /// String-named properties
    Named,
    /// Array-index properties
    Indexed,
}

/// Arguments of a call into a native function callback
pub struct CallInfo<'a> {
    /// The receiver (`undefined` for a plain call)
    pub this: &'a ScriptValue,
    /// The function object being called
    pub callee: &'a ScriptObject,
    pub args: &'a [ScriptValue],
    /// Data bound when the function was created
    pub data: &'a ScriptValue,
    pub is_construct: bool,
}

impl CallInfo<'_> {
    /// Argument `index`, or `undefined` past the end
    pub fn arg(&self, index: usize) -> ScriptValue {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

/// Native body of a function object
pub type FunctionCallback = Rc<dyn Fn(&CallInfo<'_>) -> ScriptResult<ScriptValue>>;

/// Named/indexed property and call interception
///
/// Every hook defaults to "not intercepted", in which case the engine falls
/// back to the object's own properties.
pub trait Interceptor {
    /// `Ok(None)` means not intercepted
    fn get(&self, _holder: &ScriptObject, _key: &PropertyKey) -> ScriptResult<Option<ScriptValue>> {
        Ok(None)
    }

    /// `Ok(true)` means the store was handled
    fn set(&self, _holder: &ScriptObject, _key: &PropertyKey, _value: &ScriptValue) -> ScriptResult<bool> {
        Ok(false)
    }

    /// Presence query; `Ok(None)` defers to own properties
    fn query(&self, _holder: &ScriptObject, _key: &PropertyKey) -> ScriptResult<Option<bool>> {
        Ok(None)
    }

    fn enumerate(
        &self,
        _holder: &ScriptObject,
        _kind: EnumerationKind,
    ) -> ScriptResult<Option<Vec<PropertyKey>>> {
        Ok(None)
    }

    /// Whether the holder can be called as a function
    fn is_callable(&self) -> bool {
        false
    }

    fn call(&self, _holder: &ScriptObject, _args: &[ScriptValue], _is_construct: bool) -> ScriptResult<ScriptValue> {
        Err(ScriptError::type_error("object is not a function"))
    }
}
