//! Root-scoped object registry
//!
//! Native objects exposed to script are registered against the root that
//! owns them (a document or frame). Tearing a root down invalidates every
//! object still registered to it, which is how page navigation and plugin
//! shutdown reach objects that script may still hold proxies for.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use crate::object::{NativeObject, ObjectId, WeakNativeObject};

/// Identity of an owning root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(u64);

impl RootId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Registry of live objects grouped by root
#[derive(Default)]
pub struct ObjectRegistry {
    next_root: Cell<u64>,
    roots: RefCell<HashMap<RootId, Vec<WeakNativeObject>>>,
    owners: RefCell<HashMap<ObjectId, RootId>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new root
    pub fn create_root(&self) -> RootId {
        let id = self.next_root.get() + 1;
        self.next_root.set(id);
        let root = RootId(id);
        self.roots.borrow_mut().insert(root, Vec::new());
        log::debug!("created {}", root);
        root
    }

    pub fn has_root(&self, root: RootId) -> bool {
        self.roots.borrow().contains_key(&root)
    }

    /// Register `object` against `root`. The first registration wins; dead
    /// objects are not registered.
    pub fn register_object(&self, object: &NativeObject, root: RootId) {
        if !object.is_alive() {
            return;
        }
        {
            let mut owners = self.owners.borrow_mut();
            if owners.contains_key(&object.id()) {
                return;
            }
            owners.insert(object.id(), root);
        }
        self.roots
            .borrow_mut()
            .entry(root)
            .or_default()
            .push(object.downgrade());
    }

    /// Remove `object` from its root without invalidating it
    pub fn unregister_object(&self, object: &NativeObject) -> bool {
        let root = self.owners.borrow_mut().remove(&object.id());
        match root {
            Some(root) => {
                if let Some(members) = self.roots.borrow_mut().get_mut(&root) {
                    members.retain(|member| member.id() != object.id());
                }
                true
            }
            None => false,
        }
    }

    pub fn root_of(&self, object: &NativeObject) -> Option<RootId> {
        self.owners.borrow().get(&object.id()).copied()
    }

    pub fn is_registered(&self, object: &NativeObject) -> bool {
        self.owners.borrow().contains_key(&object.id())
    }

    /// Number of objects registered against `root` that are still alive
    pub fn live_count(&self, root: RootId) -> usize {
        self.roots
            .borrow()
            .get(&root)
            .map(|members| {
                members
                    .iter()
                    .filter_map(WeakNativeObject::upgrade)
                    .filter(NativeObject::is_alive)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Close `root`, invalidating every live object registered against it.
    /// Returns the number of objects invalidated.
    pub fn unregister_root(&self, root: RootId) -> usize {
        let members = self.roots.borrow_mut().remove(&root).unwrap_or_default();
        let mut invalidated = 0;
        for member in members {
            self.owners.borrow_mut().remove(&member.id());
            // Invalidation hooks may call back into the registry, so no
            // borrow is held here.
            if let Some(object) = member.upgrade() {
                if object.is_alive() {
                    object.invalidate();
                    invalidated += 1;
                }
            }
        }
        log::debug!("tore down {}: {} objects invalidated", root, invalidated);
        invalidated
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("roots", &self.roots.borrow().len())
            .field("objects", &self.owners.borrow().len())
            .finish()
    }
}
