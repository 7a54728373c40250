//! Value conversion between the script and native models
//!
//! Conversions make no vtable calls. Objects crossing the boundary go
//! through the wrapper table (native to script) or the script object map
//! (script to native), so identity is preserved in both directions.

use tether_runtime::{NativeObject, NativeValue, RootId};
use tether_script::ScriptValue;

use crate::bridge::BridgeInner;
use crate::error::BridgeResult;

/// Exact `i32` values (other than `-0`) become `Int32`
pub(crate) fn number_to_native(number: f64) -> NativeValue {
    let integral = number.fract() == 0.0
        && number >= f64::from(i32::MIN)
        && number <= f64::from(i32::MAX);
    if integral && !(number == 0.0 && number.is_sign_negative()) {
        NativeValue::Int32(number as i32)
    } else {
        NativeValue::Double(number)
    }
}

impl BridgeInner {
    /// Root that objects reached through `owner` are registered against
    pub(crate) fn root_for(&self, owner: Option<&NativeObject>) -> RootId {
        owner
            .and_then(|owner| self.registry.root_of(owner))
            .unwrap_or(self.detached_root)
    }

    pub(crate) fn to_native(&self, value: &ScriptValue, owner: Option<&NativeObject>) -> NativeValue {
        match value {
            ScriptValue::Undefined => NativeValue::Void,
            ScriptValue::Null => NativeValue::Null,
            ScriptValue::Boolean(b) => NativeValue::Bool(*b),
            ScriptValue::Number(n) => number_to_native(*n),
            ScriptValue::String(s) => NativeValue::String(s.clone()),
            ScriptValue::Object(object) => match self.script_object_to_native(object, self.root_for(owner)) {
                Ok(native) => NativeValue::Object(native),
                Err(error) => {
                    log::trace!("script object #{} marshalled as null: {}", object.id(), error);
                    NativeValue::Null
                }
            },
        }
    }

    pub(crate) fn to_script(&self, value: &NativeValue, owner: Option<&NativeObject>) -> BridgeResult<ScriptValue> {
        Ok(match value {
            NativeValue::Void => ScriptValue::Undefined,
            NativeValue::Null => ScriptValue::Null,
            NativeValue::Bool(b) => ScriptValue::Boolean(*b),
            NativeValue::Int32(i) => ScriptValue::Number(f64::from(*i)),
            NativeValue::Double(d) => ScriptValue::Number(*d),
            NativeValue::String(s) => ScriptValue::String(s.clone()),
            NativeValue::Object(object) => ScriptValue::Object(self.wrap(object, self.root_for(owner))?),
        })
    }
}
