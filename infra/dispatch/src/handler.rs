//! Normalized handler representations.
//!
//! Whatever shape a caller registers, the queue only ever stores one of the
//! three [`Handler`] variants. A variant is immutable after construction.

use crate::channel::ErasedSink;
use crate::identity::{Probe, address_of};
use crate::matcher::{Extractor, Interest};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// An object that wants to see every event emitted on a queue.
///
/// Implementors receive the payload type-erased and do their own filtering;
/// the queue never skips a direct handler.
///
/// # Example
///
/// ```rust
/// use courier_dispatch::{EventHandler, EventQueue};
/// use std::any::Any;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl EventHandler for Counter {
///     fn handle_event(&self, _event: &dyn Any) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let queue = EventQueue::new();
/// let counter = Arc::new(Counter::default());
/// queue.register(counter.clone()).unwrap();
/// queue.event(1u8);
/// queue.event("two");
/// assert_eq!(counter.0.load(Ordering::Relaxed), 2);
/// ```
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &dyn Any);
}

/// What happened to one event at one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The handler was invoked or the value was enqueued.
    Delivered,
    /// The event's type did not match the handler's interest.
    Skipped,
    /// The channel matched but could not take the value right now.
    Dropped(crate::channel::Undelivered),
}

/// A handler after normalization.
pub enum Handler {
    Direct(DirectHandler),
    Func(FuncHandler),
    Channel(ChannelHandler),
}

impl Handler {
    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Func(_) => "func",
            Self::Channel(_) => "channel",
        }
    }

    /// The declared interest, or `None` for handlers that accept everything.
    #[must_use]
    pub const fn interest(&self) -> Option<&Interest> {
        match self {
            Self::Direct(_) => None,
            Self::Func(h) => h.interest.as_ref(),
            Self::Channel(h) => Some(&h.interest),
        }
    }

    pub(crate) fn deliver(&self, event: &dyn Any, candidate: TypeId) -> Delivery {
        match self {
            Self::Direct(h) => {
                h.target.handle_event(event);
                Delivery::Delivered
            },
            Self::Func(h) => match &h.interest {
                None => {
                    (h.call)(event);
                    Delivery::Delivered
                },
                Some(interest) if !interest.accepts(candidate) => Delivery::Skipped,
                Some(_) => {
                    if (h.call)(event) {
                        Delivery::Delivered
                    } else {
                        Delivery::Skipped
                    }
                },
            },
            Self::Channel(h) => {
                if h.interest.accepts(candidate) {
                    h.sink.deliver(event)
                } else {
                    Delivery::Skipped
                }
            },
        }
    }

    pub(crate) fn is(&self, probe: &Probe<'_>) -> bool {
        match (self, probe) {
            (Self::Direct(h), Probe::Address(addr)) => address_of(&h.target) == *addr,
            (Self::Func(h), Probe::Address(addr)) => h.identity == Some(*addr),
            (Self::Channel(h), Probe::Channel(channel)) => h.sink.is_same(*channel),
            _ => false,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(h) => h.fmt(f),
            Self::Func(h) => h.fmt(f),
            Self::Channel(h) => h.fmt(f),
        }
    }
}

/// Wraps an [`EventHandler`]; matches every event.
pub struct DirectHandler {
    target: Arc<dyn EventHandler>,
}

impl DirectHandler {
    pub(crate) fn new(target: Arc<dyn EventHandler>) -> Self {
        Self { target }
    }
}

impl fmt::Debug for DirectHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectHandler").field("target", &address_of(&self.target)).finish()
    }
}

type ErasedCall = Box<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// Wraps a callable, optionally filtered by an interest type.
///
/// Without an interest the callable takes no argument and runs for every
/// event. With one it runs only for convertible events and receives the
/// (possibly converted) value.
pub struct FuncHandler {
    interest: Option<Interest>,
    call: ErasedCall,
    identity: Option<usize>,
}

impl FuncHandler {
    pub(crate) fn untyped<F>(f: F, identity: Option<usize>) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            interest: None,
            call: Box::new(move |_: &dyn Any| {
                f();
                true
            }),
            identity,
        }
    }

    pub(crate) fn typed<T, F>(f: F, extractor: Extractor<T>, identity: Option<usize>) -> Self
    where
        T: Any,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let interest = extractor.interest();
        let call = move |event: &dyn Any| match extractor.extract(event) {
            Some(value) => {
                f(&*value);
                true
            },
            None => false,
        };
        Self { interest: Some(interest), call: Box::new(call), identity }
    }
}

impl fmt::Debug for FuncHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncHandler")
            .field("interest", &self.interest)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Wraps the sending half of a channel; filtered by the element type.
pub struct ChannelHandler {
    interest: Interest,
    sink: Box<dyn ErasedSink>,
}

impl ChannelHandler {
    pub(crate) fn new(interest: Interest, sink: Box<dyn ErasedSink>) -> Self {
        Self { interest, sink }
    }
}

impl fmt::Debug for ChannelHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandler").field("interest", &self.interest).finish_non_exhaustive()
    }
}
