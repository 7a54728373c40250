//! Reference counted native objects
//!
//! A `NativeObject` is a handle to an object whose behaviour is a
//! `NativeClass`. Handles are cheap to clone and do not change the plugin
//! refcount; an `ObjectRef` owns one plugin reference and releases it when
//! dropped.
//!
//! ## Liveness
//!
//! An object is alive from creation until either its refcount reaches zero or
//! it is invalidated. The flag can flip while a call on the object is in
//! progress, so callers re-check it after every vtable call. Retain and
//! release are no-ops on a dead object: a dead object is never released
//! twice and its memory stays valid for as long as handles exist.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capability::{Capability, CapabilitySet, NativeClass};

/// Next object id (0 is never handed out)
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a native object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ObjectInner {
    id: ObjectId,
    class: Rc<dyn NativeClass>,
    class_any: Rc<dyn Any>,
    refcount: Cell<u32>,
    alive: Cell<bool>,
}

/// Handle to a native plugin object
#[derive(Clone)]
pub struct NativeObject(Rc<ObjectInner>);

impl NativeObject {
    /// Allocate an object with a refcount of one, owned by the returned reference
    pub fn create<C: NativeClass + 'static>(class: C) -> ObjectRef {
        let class = Rc::new(class);
        let as_class: Rc<dyn NativeClass> = class.clone();
        let as_any: Rc<dyn Any> = class;
        let inner = ObjectInner {
            id: ObjectId::next(),
            class: as_class,
            class_any: as_any,
            refcount: Cell::new(1),
            alive: Cell::new(true),
        };
        log::trace!("created native object {} ({})", inner.id, inner.class.class_name());
        ObjectRef {
            object: NativeObject(Rc::new(inner)),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn is_alive(&self) -> bool {
        self.0.alive.get()
    }

    /// Current plugin refcount (zero once dead by release)
    pub fn refcount(&self) -> u32 {
        self.0.refcount.get()
    }

    pub fn class(&self) -> &dyn NativeClass {
        &*self.0.class
    }

    pub fn class_name(&self) -> &str {
        self.0.class.class_name()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.0.class.capabilities()
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Access the concrete class, if it is a `T`
    pub fn downcast_class<T: Any>(&self) -> Option<Rc<T>> {
        self.0.class_any.clone().downcast::<T>().ok()
    }

    /// Add one plugin reference
    pub fn retain(&self) {
        if !self.is_alive() {
            log::trace!("retain of dead native object {} ignored", self.id());
            return;
        }
        self.0.refcount.set(self.0.refcount.get().saturating_add(1));
    }

    /// Drop one plugin reference, deallocating at zero
    pub fn release(&self) {
        if !self.is_alive() {
            log::trace!("release of dead native object {} ignored", self.id());
            return;
        }
        let count = self.0.refcount.get();
        debug_assert!(count > 0, "release of native object {} with zero refcount", self.id());
        let count = count.saturating_sub(1);
        self.0.refcount.set(count);
        if count == 0 {
            log::trace!("deallocating native object {} ({})", self.id(), self.class_name());
            self.0.alive.set(false);
            self.0.class.deallocate(self);
        }
    }

    /// Mark the object dead without waiting for its refcount
    pub fn invalidate(&self) {
        if !self.is_alive() {
            return;
        }
        log::debug!("invalidating native object {} ({})", self.id(), self.class_name());
        self.0.alive.set(false);
        self.0.class.invalidate(self);
    }

    pub fn ptr_eq(&self, other: &NativeObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakNativeObject {
        WeakNativeObject {
            id: self.id(),
            inner: Rc::downgrade(&self.0),
        }
    }
}

impl PartialEq for NativeObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NativeObject {}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("id", &self.id())
            .field("class", &self.class_name())
            .field("alive", &self.is_alive())
            .field("refcount", &self.refcount())
            .finish()
    }
}

/// Non-owning, non-retaining link to a native object
#[derive(Clone)]
pub struct WeakNativeObject {
    id: ObjectId,
    inner: Weak<ObjectInner>,
}

impl WeakNativeObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn upgrade(&self) -> Option<NativeObject> {
        self.inner.upgrade().map(NativeObject)
    }
}

impl fmt::Debug for WeakNativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakNativeObject({})", self.id)
    }
}

/// One owned plugin reference to a native object
///
/// Cloning retains and dropping releases, so a marshalled value is released
/// on every path out of the scope that holds it.
pub struct ObjectRef {
    object: NativeObject,
}

impl ObjectRef {
    /// Take a new reference to `object`
    pub fn retain(object: &NativeObject) -> ObjectRef {
        object.retain();
        ObjectRef {
            object: object.clone(),
        }
    }

    pub fn object(&self) -> &NativeObject {
        &self.object
    }
}

impl Deref for ObjectRef {
    type Target = NativeObject;

    fn deref(&self) -> &NativeObject {
        &self.object
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        ObjectRef::retain(&self.object)
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.object.release();
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.object.ptr_eq(&other.object)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} {})", self.object.id(), self.object.class_name())
    }
}
