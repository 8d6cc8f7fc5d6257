//! Facade crate for the `courier` event dispatcher.
//! Re-exports the dispatch API and owns the process-wide default queue.
//! Keep this crate thin: it forwards to [`EventQueue`], it does not dispatch.
//!
//! ## Usage
//! - Build an explicit [`EventQueue`] where ownership is clear.
//! - Use the free functions when a single process-wide queue is enough; the
//!   first call creates it.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! let subscription = courier::subscribe(move |n: &u16| {
//!     counter.fetch_add(usize::from(*n), Ordering::SeqCst);
//! })
//! .unwrap();
//!
//! courier::event(3u16);
//! courier::cancel(subscription);
//! courier::event(3u16);
//! assert_eq!(seen.load(Ordering::SeqCst), 3);
//! ```

pub use courier_dispatch as dispatch;
pub use courier_dispatch::{
    DispatchError, DispatchErrorExt, DispatchReport, EventHandler, EventQueue, Identify,
    IntoHandlers, Subscription, TypedChannel, TypedFn,
};

use courier_dispatch::Result;
use std::any::Any;
use std::sync::OnceLock;
use tracing::debug;

static DEFAULT_QUEUE: OnceLock<EventQueue> = OnceLock::new();

/// The lazily created process-wide queue behind the free functions.
#[must_use]
pub fn default_queue() -> &'static EventQueue {
    DEFAULT_QUEUE.get_or_init(|| {
        debug!("Initializing default event queue");
        EventQueue::new()
    })
}

/// Registers `handler` on the default queue.
///
/// # Errors
/// Returns [`DispatchError`] if `handler` cannot be normalized.
pub fn register<M, H: IntoHandlers<M>>(handler: H) -> Result<()> {
    default_queue().register(handler)
}

/// Registers `handler` on the default queue and returns its token.
///
/// # Errors
/// Returns [`DispatchError`] if `handler` cannot be normalized.
pub fn subscribe<M, H: IntoHandlers<M>>(handler: H) -> Result<Subscription> {
    default_queue().subscribe(handler)
}

/// Removes the first handler identical to `target` from the default queue.
pub fn unregister<H: Identify + ?Sized>(target: &H) {
    default_queue().unregister(target);
}

/// Removes the entries added by `subscription` from the default queue.
pub fn cancel(subscription: Subscription) {
    default_queue().cancel(subscription);
}

/// Emits `event` on the default queue.
pub fn event<E: Any>(event: E) -> DispatchReport {
    default_queue().event(event)
}
