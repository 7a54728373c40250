//! Object allocation and weak finalization

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::{ScriptError, ScriptResult};
use crate::interceptor::{CallInfo, FunctionCallback, Interceptor};
use crate::object::{ObjectKind, ScriptObject};
use crate::value::ScriptValue;

pub(crate) type Finalizer = Box<dyn FnOnce()>;

/// Shared allocator state; objects keep a weak link back to it
#[derive(Default)]
pub(crate) struct Heap {
    next_id: Cell<u64>,
    live: Cell<usize>,
    pending: RefCell<VecDeque<Finalizer>>,
    terminating: Cell<bool>,
}

impl Heap {
    pub(crate) fn reclaimed(&self, finalizers: Vec<Finalizer>) {
        self.live.set(self.live.get().saturating_sub(1));
        if !finalizers.is_empty() {
            self.pending.borrow_mut().extend(finalizers);
        }
    }
}

/// An isolated script heap
#[derive(Clone, Default)]
pub struct Isolate {
    heap: Rc<Heap>,
}

impl Isolate {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_heap(heap: Rc<Heap>) -> Self {
        Isolate { heap }
    }

    fn allocate(
        &self,
        kind: ObjectKind,
        interceptor: Option<Rc<dyn Interceptor>>,
    ) -> ScriptResult<ScriptObject> {
        if self.heap.terminating.get() {
            return Err(ScriptError::internal("cannot allocate while execution is terminating"));
        }
        let id = self.heap.next_id.get() + 1;
        self.heap.next_id.set(id);
        self.heap.live.set(self.heap.live.get() + 1);
        Ok(ScriptObject::new(id, kind, interceptor, Rc::downgrade(&self.heap)))
    }

    /// Allocate a plain object
    pub fn new_object(&self) -> ScriptResult<ScriptObject> {
        self.allocate(ObjectKind::Ordinary, None)
    }

    /// Allocate an object whose property access and calls go through
    /// `interceptor`
    pub fn new_object_with_interceptor(
        &self,
        interceptor: Rc<dyn Interceptor>,
    ) -> ScriptResult<ScriptObject> {
        self.allocate(ObjectKind::Ordinary, Some(interceptor))
    }

    /// Allocate a function object backed by a native callback
    pub fn new_function<F>(&self, name: &str, data: ScriptValue, callback: F) -> ScriptResult<ScriptObject>
    where
        F: Fn(&CallInfo<'_>) -> ScriptResult<ScriptValue> + 'static,
    {
        let callback: FunctionCallback = Rc::new(callback);
        let function = self.allocate(ObjectKind::Function { callback, data }, None)?;
        function.set_name(name);
        Ok(function)
    }

    /// Run `finalizer` at the first collection after `object` is reclaimed
    pub fn make_weak(&self, object: &ScriptObject, finalizer: impl FnOnce() + 'static) {
        object.add_finalizer(Box::new(finalizer));
    }

    /// Run pending weak finalizers, including any queued by finalizers that
    /// ran during this collection. Returns how many ran.
    pub fn collect_garbage(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.heap.pending.borrow_mut().pop_front();
            match next {
                Some(finalizer) => {
                    finalizer();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            log::debug!("collect_garbage: ran {} weak finalizers", ran);
        }
        ran
    }

    /// Finalizers queued for the next collection
    pub fn pending_finalizers(&self) -> usize {
        self.heap.pending.borrow().len()
    }

    /// Objects allocated and not yet reclaimed
    pub fn live_objects(&self) -> usize {
        self.heap.live.get()
    }

    /// Refuse further allocation until `resume_execution`
    pub fn terminate_execution(&self) {
        log::debug!("isolate terminating execution");
        self.heap.terminating.set(true);
    }

    pub fn resume_execution(&self) {
        self.heap.terminating.set(false);
    }

    pub fn is_execution_terminating(&self) -> bool {
        self.heap.terminating.get()
    }

    pub fn ptr_eq(&self, other: &Isolate) -> bool {
        Rc::ptr_eq(&self.heap, &other.heap)
    }
}

impl fmt::Debug for Isolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolate")
            .field("live", &self.heap.live.get())
            .field("pending_finalizers", &self.heap.pending.borrow().len())
            .field("terminating", &self.heap.terminating.get())
            .finish()
    }
}
