//! Property keys

use std::fmt;

/// A property key as the engine sees it
///
/// Names that are canonical array indices ("0", "17", but not "01" or "-1")
/// are always represented as `Index`, so `"3"` and `3` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(String),
    Index(u32),
}

/// Largest valid array index (2^32 - 2)
const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

fn parse_array_index(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    match name.parse::<u32>() {
        Ok(index) if index <= MAX_ARRAY_INDEX => Some(index),
        _ => None,
    }
}

impl PropertyKey {
    /// Build a key from a property name, canonicalizing array indices
    pub fn name(name: impl Into<String>) -> Self {
        let name = name.into();
        match parse_array_index(&name) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::Name(name),
        }
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(index) => Some(*index),
            PropertyKey::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PropertyKey::Name(name) => Some(name),
            PropertyKey::Index(_) => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PropertyKey::Index(_))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::name(name)
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::name(name)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        if index <= MAX_ARRAY_INDEX {
            PropertyKey::Index(index)
        } else {
            PropertyKey::Name(index.to_string())
        }
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}
