//! Variant values passed through the capability vtable

use crate::object::ObjectRef;

/// A value on the native side of the bridge
///
/// `Object` owns a plugin reference; dropping the value releases it.
#[derive(Debug, Clone, Default)]
pub enum NativeValue {
    #[default]
    Void,
    Null,
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(String),
    Object(ObjectRef),
}

impl NativeValue {
    pub fn is_void(&self) -> bool {
        matches!(self, NativeValue::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of an `Int32` or `Double`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Int32(i) => Some(f64::from(*i)),
            NativeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            NativeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int32(_) => "int32",
            NativeValue::Double(_) => "double",
            NativeValue::String(_) => "string",
            NativeValue::Object(_) => "object",
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NativeValue::Void, NativeValue::Void) => true,
            (NativeValue::Null, NativeValue::Null) => true,
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::Int32(a), NativeValue::Int32(b)) => a == b,
            (NativeValue::Double(a), NativeValue::Double(b)) => a == b,
            (NativeValue::String(a), NativeValue::String(b)) => a == b,
            (NativeValue::Object(a), NativeValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int32(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Double(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<ObjectRef> for NativeValue {
    fn from(value: ObjectRef) -> Self {
        NativeValue::Object(value)
    }
}
