//! Interned property and method identifiers
//!
//! An `Identifier` names either a string property or an integer index. Two
//! identifiers are the same slot iff they were interned from equal source
//! values in the same table, so equality and hashing use the interned
//! allocation rather than the contents.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug)]
enum IdentifierRep {
    Name(Box<str>),
    Index(i32),
}

/// Interned name or index token
#[derive(Clone)]
pub struct Identifier(Rc<IdentifierRep>);

impl Identifier {
    /// Returns true for identifiers interned from a string
    pub fn is_name(&self) -> bool {
        matches!(*self.0, IdentifierRep::Name(_))
    }

    /// The string this identifier was interned from, if any
    pub fn name(&self) -> Option<&str> {
        match &*self.0 {
            IdentifierRep::Name(name) => Some(name),
            IdentifierRep::Index(_) => None,
        }
    }

    /// The integer this identifier was interned from, if any
    pub fn index(&self) -> Option<i32> {
        match *self.0 {
            IdentifierRep::Index(index) => Some(index),
            IdentifierRep::Name(_) => None,
        }
    }

    /// Render as a property name (indices in decimal)
    pub fn to_name(&self) -> String {
        match &*self.0 {
            IdentifierRep::Name(name) => name.to_string(),
            IdentifierRep::Index(index) => index.to_string(),
        }
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            IdentifierRep::Name(name) => write!(f, "Identifier({:?})", name),
            IdentifierRep::Index(index) => write!(f, "Identifier(#{})", index),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            IdentifierRep::Name(name) => f.write_str(name),
            IdentifierRep::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Per-context identifier interner
///
/// Identifiers are never freed once interned; the table owns one strong
/// reference to each.
#[derive(Default)]
pub struct IdentifierTable {
    names: RefCell<HashMap<Box<str>, Identifier>>,
    indices: RefCell<HashMap<i32, Identifier>>,
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string name
    pub fn intern_name(&self, name: &str) -> Identifier {
        if let Some(existing) = self.names.borrow().get(name) {
            return existing.clone();
        }
        let identifier = Identifier(Rc::new(IdentifierRep::Name(name.into())));
        self.names
            .borrow_mut()
            .insert(name.into(), identifier.clone());
        identifier
    }

    /// Intern an integer index
    pub fn intern_index(&self, index: i32) -> Identifier {
        self.indices
            .borrow_mut()
            .entry(index)
            .or_insert_with(|| Identifier(Rc::new(IdentifierRep::Index(index))))
            .clone()
    }

    /// Intern a script array index. Indices that do not fit an `i32` are
    /// interned by their decimal name.
    pub fn intern_array_index(&self, index: u32) -> Identifier {
        match i32::try_from(index) {
            Ok(index) => self.intern_index(index),
            Err(_) => self.intern_name(&index.to_string()),
        }
    }

    /// Number of distinct identifiers interned so far
    pub fn len(&self) -> usize {
        self.names.borrow().len() + self.indices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for IdentifierTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierTable")
            .field("names", &self.names.borrow().len())
            .field("indices", &self.indices.borrow().len())
            .finish()
    }
}
