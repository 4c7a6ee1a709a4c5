//! Document-parsed gate with prioritized startup callbacks.
//!
//! Callbacks registered before the document finishes parsing are queued and
//! run in ascending priority order once [`StartupGate::mark_parsed`] is
//! called. Registration after that point runs the callback immediately.

use core::cell::{Cell, RefCell};
use core::mem;
use log::{debug, trace};

/// A deferred startup task.
pub type StartupCallback = Box<dyn FnOnce()>;

/// Min-priority queue; entries with equal priority keep insertion order.
#[derive(Default)]
pub struct PriorityQueue {
    entries: Vec<(i32, u64, StartupCallback)>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn enqueue(&mut self, priority: i32, callback: StartupCallback) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push((priority, seq, callback));
    }

    /// Take every queued callback, lowest priority first.
    pub fn drain(&mut self) -> Vec<StartupCallback> {
        let mut entries = mem::take(&mut self.entries);
        entries.sort_by_key(|(priority, seq, _)| (*priority, *seq));
        entries.into_iter().map(|(_, _, callback)| callback).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct StartupGate {
    parsed: Cell<bool>,
    queue: RefCell<PriorityQueue>,
}

impl StartupGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.parsed.get()
    }

    /// Number of callbacks still waiting for the document to be parsed.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run `callback` once the document is parsed; immediately if it already is.
    pub fn register(&self, priority: i32, callback: impl FnOnce() + 'static) {
        if self.parsed.get() {
            trace!("startup callback (priority {priority}) runs immediately");
            callback();
            return;
        }
        self.queue.borrow_mut().enqueue(priority, Box::new(callback));
    }

    /// Flip the gate and run the queued callbacks. Returns how many ran.
    ///
    /// Calling this again is a no-op.
    pub fn mark_parsed(&self) -> usize {
        if self.parsed.replace(true) {
            return 0;
        }
        // Drain before running so callbacks may register more work.
        let callbacks = self.queue.borrow_mut().drain();
        let count = callbacks.len();
        debug!("document parsed, running {count} startup callbacks");
        for callback in callbacks {
            callback();
        }
        count
    }
}
