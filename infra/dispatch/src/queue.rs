use crate::channel::Undelivered;
use crate::config::{QueueBuilder, QueueConfig};
use crate::error::Result;
use crate::handler::{Delivery, Handler};
use crate::identity::{Identify, Probe, probes_of};
use crate::matcher::TypeKey;
use crate::normalize::{IntoHandlers, normalize};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Queues currently dispatching on this thread, innermost last.
    static DISPATCHING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntryId(u64);

#[derive(Debug)]
struct Entry {
    id: EntryId,
    handler: Handler,
}

/// Mutations issued by handlers of this queue while it was dispatching.
#[derive(Debug, Default)]
struct Pending {
    appended: Vec<Entry>,
    removed: Vec<EntryId>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.appended.is_empty() && self.removed.is_empty()
    }
}

/// Outcome of a single [`EventQueue::event`] call.
///
/// Every registered handler is counted exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked, or channels that accepted the value.
    pub delivered: usize,
    /// Handlers whose interest did not match the event type.
    pub skipped: usize,
    /// Matching channels that were full or closed.
    pub dropped: usize,
}

impl DispatchReport {
    /// Number of handlers the event was compared against.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.skipped + self.dropped
    }
}

/// Token naming the entries appended by one [`EventQueue::subscribe`] call.
///
/// Dropping it does not unregister anything; pass it to [`EventQueue::cancel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    queue: u64,
    entries: Vec<EntryId>,
}

impl Subscription {
    /// Number of handlers the subscription registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A thread-safe, ordered registry of event handlers.
///
/// Events are delivered synchronously, on the caller's thread, to every
/// matching handler in registration order. Any number of threads may emit
/// concurrently; registration and removal wait for in-flight dispatches to
/// finish.
///
/// A handler that mutates the queue it is being dispatched from does not
/// block: the change is recorded and applied once the outermost dispatch of
/// that queue on the current thread returns. The running dispatch keeps
/// seeing the handler list it started with.
pub struct EventQueue {
    id: u64,
    config: QueueConfig,
    entries: RwLock<Vec<Entry>>,
    pending: Mutex<Pending>,
    next_entry: AtomicU64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("name", &self.config.name())
            .field("handlers", &self.len())
            .finish_non_exhaustive()
    }
}

impl EventQueue {
    /// Creates an empty queue with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Starts configuring a queue.
    #[must_use]
    pub fn builder() -> QueueBuilder {
        QueueBuilder::default()
    }

    pub(crate) fn with_config(config: QueueConfig) -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            entries: RwLock::new(Vec::with_capacity(config.capacity())),
            config,
            pending: Mutex::new(Pending::default()),
            next_entry: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of registered handlers, sequences counted per element.
    ///
    /// Changes deferred by a running dispatch are not counted until applied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read_recursive().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a handler, a channel, a callable, or a sequence of them.
    ///
    /// # Errors
    /// Returns [`DispatchError`](crate::DispatchError) if any part of
    /// `handler` cannot be normalized; nothing is registered in that case.
    pub fn register<M, H: IntoHandlers<M>>(&self, handler: H) -> Result<()> {
        self.subscribe(handler).map(drop)
    }

    /// Registers like [`register`](Self::register) and returns a token for
    /// removing exactly what was added.
    ///
    /// # Errors
    /// Returns [`DispatchError`](crate::DispatchError) if any part of
    /// `handler` cannot be normalized; nothing is registered in that case.
    pub fn subscribe<M, H: IntoHandlers<M>>(&self, handler: H) -> Result<Subscription> {
        let entries: Vec<Entry> = normalize(handler)?
            .into_iter()
            .map(|handler| Entry { id: self.next_entry_id(), handler })
            .collect();
        let ids = entries.iter().map(|entry| entry.id).collect();

        if self.is_dispatching() {
            for entry in &entries {
                debug!(
                    queue = self.config.name(),
                    kind = entry.handler.kind(),
                    "Registration deferred"
                );
            }
            self.pending.lock().appended.extend(entries);
        } else {
            for entry in &entries {
                debug!(queue = self.config.name(), kind = entry.handler.kind(), "Handler registered");
            }
            let mut live = self.entries.write();
            self.flush_pending(&mut live);
            live.extend(entries);
        }

        Ok(Subscription { queue: self.id, entries: ids })
    }

    /// Removes the first registered handler identical to `target`.
    ///
    /// Sequences remove one entry per element. Targets that match nothing,
    /// including `None`, are ignored.
    pub fn unregister<H: Identify + ?Sized>(&self, target: &H) {
        let probes = probes_of(target);
        if probes.is_empty() {
            return;
        }

        if self.is_dispatching() {
            self.defer_unregister(&probes);
            return;
        }

        let mut entries = self.entries.write();
        self.flush_pending(&mut entries);
        for probe in &probes {
            if let Some(index) = entries.iter().position(|entry| entry.handler.is(probe)) {
                let entry = entries.remove(index);
                debug!(queue = self.config.name(), kind = entry.handler.kind(), "Handler removed");
            }
        }
    }

    /// Removes the entries added by `subscription`, wherever they are now.
    ///
    /// Tokens from another queue, or whose entries are already gone, are ignored.
    pub fn cancel(&self, subscription: Subscription) {
        if subscription.queue != self.id || subscription.entries.is_empty() {
            return;
        }
        let ids = subscription.entries;

        if self.is_dispatching() {
            let entries = self.entries.read_recursive();
            let mut pending = self.pending.lock();
            for id in ids {
                if entries.iter().any(|entry| entry.id == id) {
                    if !pending.removed.contains(&id) {
                        pending.removed.push(id);
                    }
                } else {
                    pending.appended.retain(|entry| entry.id != id);
                }
            }
            debug!(queue = self.config.name(), "Cancellation deferred");
            return;
        }

        let mut entries = self.entries.write();
        self.flush_pending(&mut entries);
        let before = entries.len();
        entries.retain(|entry| !ids.contains(&entry.id));
        debug!(queue = self.config.name(), entries = before - entries.len(), "Subscription cancelled");
    }

    /// Delivers `event` to every matching handler, in registration order.
    ///
    /// Never fails: handlers that do not accept the type are skipped, full or
    /// closed channels drop the value.
    pub fn event<E: Any>(&self, event: E) -> DispatchReport {
        self.dispatch(&event, TypeKey::of::<E>())
    }

    /// Like [`event`](Self::event) for a value that is already type-erased.
    ///
    /// The concrete type behind `event` is matched, so pass `&*boxed` rather
    /// than `&boxed` for a `Box<dyn Any>`.
    pub fn event_dyn(&self, event: &dyn Any) -> DispatchReport {
        self.dispatch(event, TypeKey::of_erased(event))
    }

    fn dispatch(&self, event: &dyn Any, key: TypeKey) -> DispatchReport {
        let scope = DispatchScope::enter(self);
        let mut report = DispatchReport::default();
        {
            let entries =
                if scope.nested { self.entries.read_recursive() } else { self.entries.read() };
            for entry in entries.iter() {
                match entry.handler.deliver(event, key.id()) {
                    Delivery::Delivered => report.delivered += 1,
                    Delivery::Skipped => report.skipped += 1,
                    Delivery::Dropped(reason) => {
                        report.dropped += 1;
                        self.log_drop(key, entry.handler.kind(), reason);
                    },
                }
            }
        }
        drop(scope);

        trace!(
            queue = self.config.name(),
            event = key.name(),
            delivered = report.delivered,
            skipped = report.skipped,
            dropped = report.dropped,
            "Event dispatched"
        );
        report
    }

    fn log_drop(&self, key: TypeKey, kind: &'static str, reason: Undelivered) {
        if self.config.warn_on_drop() {
            warn!(queue = self.config.name(), event = key.name(), kind, %reason, "Event dropped");
        } else {
            trace!(queue = self.config.name(), event = key.name(), kind, %reason, "Event dropped");
        }
    }

    fn defer_unregister(&self, probes: &[Probe<'_>]) {
        let entries = self.entries.read_recursive();
        let mut pending = self.pending.lock();
        for probe in probes {
            let live = entries
                .iter()
                .find(|entry| !pending.removed.contains(&entry.id) && entry.handler.is(probe))
                .map(|entry| entry.id);
            if let Some(id) = live {
                pending.removed.push(id);
                continue;
            }
            let queued = pending.appended.iter().position(|entry| entry.handler.is(probe));
            if let Some(index) = queued {
                pending.appended.remove(index);
            }
        }
        debug!(queue = self.config.name(), "Removal deferred");
    }

    fn apply_pending(&self) {
        if self.pending.lock().is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        self.flush_pending(&mut entries);
    }

    /// Applies recorded changes to the write-locked entries.
    ///
    /// Writers call this before mutating; changes deferred by an earlier
    /// dispatch must land before theirs.
    fn flush_pending(&self, entries: &mut Vec<Entry>) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return;
        }
        if !pending.removed.is_empty() {
            entries.retain(|entry| !pending.removed.contains(&entry.id));
        }
        debug!(
            queue = self.config.name(),
            removed = pending.removed.len(),
            appended = pending.appended.len(),
            "Deferred changes applied"
        );
        entries.extend(pending.appended);
    }

    fn is_dispatching(&self) -> bool {
        DISPATCHING.with(|stack| stack.borrow().contains(&self.id))
    }

    fn next_entry_id(&self) -> EntryId {
        EntryId(self.next_entry.fetch_add(1, Ordering::Relaxed))
    }
}

/// Marks `queue` as dispatching on this thread for the guard's lifetime.
///
/// The outermost guard of a queue applies its deferred changes on drop.
struct DispatchScope<'q> {
    queue: &'q EventQueue,
    nested: bool,
}

impl<'q> DispatchScope<'q> {
    fn enter(queue: &'q EventQueue) -> Self {
        let nested = DISPATCHING.with(|stack| {
            let mut stack = stack.borrow_mut();
            let nested = stack.contains(&queue.id);
            stack.push(queue.id);
            nested
        });
        Self { queue, nested }
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        DISPATCHING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|id| *id == self.queue.id) {
                stack.remove(index);
            }
        });
        if !self.nested {
            self.queue.apply_pending();
        }
    }
}
