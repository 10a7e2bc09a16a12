//! Latest-value frame broadcast
//!
//! [`FrameSubject`] is the single-slot channel the renderer session publishes
//! through: every subscriber holds its own one-value slot, a newly published
//! frame overwrites an unconsumed one, and only the most recent value is ever
//! observable. Consecutive empty frames are coalesced at the publisher; a
//! real image is always delivered, even when identical to the previous one,
//! because its placement rect may have changed.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use crate::layer::ProcessedImage;

/// Current frame value: `Some` while a subtitle is visible, `None` otherwise.
pub type FrameValue = Option<ProcessedImage>;

struct SlotState {
    pending: Option<FrameValue>,
    closed: bool,
}

struct Slot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl Slot {
    fn push(&self, value: FrameValue) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // Single slot: overwrite an unconsumed value, no queueing.
        state.pending = Some(value);
        self.cond.notify_all();
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        self.cond.notify_all();
    }
}

struct SubjectInner {
    latest: FrameValue,
    closed: bool,
    slots: Vec<Weak<Slot>>,
}

/// Multicast latest-value publisher for processed frames.
pub struct FrameSubject {
    inner: Mutex<SubjectInner>,
}

impl FrameSubject {
    /// Create a subject with no current frame.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SubjectInner {
                latest: None,
                closed: false,
                slots: Vec::new(),
            }),
        }
    }

    /// Publish a frame to every live subscriber.
    ///
    /// An empty frame following an empty frame is coalesced into nothing.
    pub fn publish(&self, value: FrameValue) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return;
        }
        if value.is_none() && inner.latest.is_none() {
            return;
        }
        inner.latest = value.clone();
        inner.slots.retain(|weak| match weak.upgrade() {
            Some(slot) => {
                slot.push(value.clone());
                true
            }
            None => false,
        });
    }

    /// The most recently published frame.
    pub fn latest(&self) -> FrameValue {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .latest
            .clone()
    }

    /// Subscribe to frame changes. The current value is delivered first.
    pub fn subscribe(&self) -> FrameSubscription {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                pending: Some(inner.latest.clone()),
                closed: inner.closed,
            }),
            cond: Condvar::new(),
        });
        inner.slots.push(Arc::downgrade(&slot));
        FrameSubscription { slot }
    }

    /// Close the subject; subscribers drain their last value and then
    /// observe the end of the stream.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.closed = true;
        for weak in inner.slots.drain(..) {
            if let Some(slot) = weak.upgrade() {
                slot.close();
            }
        }
    }
}

impl Default for FrameSubject {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of the frame stream.
///
/// Delivery happens on whatever thread calls [`FrameSubscription::recv`];
/// subscribers pick their own execution context.
pub struct FrameSubscription {
    slot: Arc<Slot>,
}

impl FrameSubscription {
    /// Block until the next frame value, or `None` once the stream closed.
    pub fn recv(&self) -> Option<FrameValue> {
        let mut state = self.slot.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self
                .slot
                .cond
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`FrameSubscription::recv`] with an upper bound on the wait.
    /// `None` on timeout or once the stream closed.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FrameValue> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.slot.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .slot
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Take the pending value without blocking.
    pub fn try_recv(&self) -> Option<FrameValue> {
        self.slot
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .take()
    }
}
