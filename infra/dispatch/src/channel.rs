//! Channel handlers: deliver matching events into the sending half of a
//! channel without ever blocking the dispatching thread.

use crate::handler::{ChannelHandler, Delivery};
use crate::matcher::Extractor;
use std::any::Any;
use std::fmt;
use tokio::sync::mpsc;

/// Why a matching value could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undelivered {
    /// The channel buffer has no free slot.
    Full,
    /// Every receiver has been dropped.
    Closed,
}

impl fmt::Display for Undelivered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("channel full"),
            Self::Closed => f.write_str("channel closed"),
        }
    }
}

/// The sending half of a channel whose element type is `T`.
///
/// Delivery must never wait: a send either succeeds immediately or reports
/// why it did not.
pub trait ChannelSink<T>: Send + Sync + 'static {
    /// Attempts to enqueue `value` without waiting.
    ///
    /// # Errors
    /// Returns [`Undelivered`] when the value was not enqueued.
    fn try_deliver(&self, value: T) -> Result<(), Undelivered>;

    /// Whether both senders feed the same channel.
    fn same_channel(&self, other: &Self) -> bool;
}

impl<T: Send + 'static> ChannelSink<T> for mpsc::Sender<T> {
    fn try_deliver(&self, value: T) -> Result<(), Undelivered> {
        self.try_send(value).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Undelivered::Full,
            mpsc::error::TrySendError::Closed(_) => Undelivered::Closed,
        })
    }

    fn same_channel(&self, other: &Self) -> bool {
        Self::same_channel(self, other)
    }
}

impl<T: Send + 'static> ChannelSink<T> for mpsc::UnboundedSender<T> {
    fn try_deliver(&self, value: T) -> Result<(), Undelivered> {
        self.send(value).map_err(|_| Undelivered::Closed)
    }

    fn same_channel(&self, other: &Self) -> bool {
        Self::same_channel(self, other)
    }
}

/// A channel handler under construction.
///
/// Registering a bare sender is equivalent to registering
/// `TypedChannel::new(sender)`; use this type to additionally accept event
/// types that convert into the element type.
///
/// # Example
///
/// ```rust
/// use courier_dispatch::{EventQueue, TypedChannel};
/// use tokio::sync::mpsc;
///
/// let queue = EventQueue::new();
/// let (tx, mut rx) = mpsc::channel::<i64>(4);
/// queue.register(TypedChannel::new(tx).convert_from::<i32>()).unwrap();
///
/// queue.event(5i32);
/// assert_eq!(rx.try_recv().unwrap(), 5i64);
/// ```
pub struct TypedChannel<T, S> {
    sink: S,
    extractor: Extractor<T>,
}

impl<T, S> TypedChannel<T, S>
where
    T: Any + Clone + Send,
    S: ChannelSink<T>,
{
    #[must_use]
    pub const fn new(sink: S) -> Self {
        Self { sink, extractor: Extractor::new() }
    }

    /// Also accept events of type `U`, converted with `T::from` before sending.
    #[must_use = "The channel must be registered to receive events."]
    pub fn convert_from<U>(mut self) -> Self
    where
        U: Any + Clone,
        T: From<U>,
    {
        self.extractor.push::<U>();
        self
    }

    pub(crate) fn into_handler(self) -> ChannelHandler {
        let interest = self.extractor.interest();
        let sink = TypedSink { sink: self.sink, extractor: self.extractor };
        ChannelHandler::new(interest, Box::new(sink))
    }
}

impl<T, S> fmt::Debug for TypedChannel<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedChannel")
            .field("element", &std::any::type_name::<T>())
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a [`TypedChannel`] held by a [`ChannelHandler`].
pub(crate) trait ErasedSink: Send + Sync {
    fn deliver(&self, event: &dyn Any) -> Delivery;

    fn is_same(&self, probe: &dyn Any) -> bool;
}

struct TypedSink<T, S> {
    sink: S,
    extractor: Extractor<T>,
}

impl<T, S> ErasedSink for TypedSink<T, S>
where
    T: Any + Clone + Send,
    S: ChannelSink<T>,
{
    fn deliver(&self, event: &dyn Any) -> Delivery {
        let Some(value) = self.extractor.extract(event) else {
            return Delivery::Skipped;
        };
        match self.sink.try_deliver(value.into_owned()) {
            Ok(()) => Delivery::Delivered,
            Err(reason) => Delivery::Dropped(reason),
        }
    }

    fn is_same(&self, probe: &dyn Any) -> bool {
        probe.downcast_ref::<S>().is_some_and(|other| self.sink.same_channel(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::identity::Probe;
    use std::any::TypeId;

    #[test]
    fn test_bounded_sink_reports_full() {
        let (tx, _rx) = mpsc::channel::<u8>(1);
        assert_eq!(ChannelSink::try_deliver(&tx, 1), Ok(()));
        assert_eq!(ChannelSink::try_deliver(&tx, 2), Err(Undelivered::Full));
    }

    #[test]
    fn test_sinks_report_closed() {
        let (tx, rx) = mpsc::channel::<u8>(1);
        drop(rx);
        assert_eq!(ChannelSink::try_deliver(&tx, 1), Err(Undelivered::Closed));

        let (tx, rx) = mpsc::unbounded_channel::<u8>();
        drop(rx);
        assert_eq!(ChannelSink::try_deliver(&tx, 1), Err(Undelivered::Closed));
    }

    #[test]
    fn test_element_type_is_checked_before_sending() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let handler = Handler::Channel(TypedChannel::new(tx).into_handler());

        assert_eq!(handler.deliver(&"text", TypeId::of::<&str>()), Delivery::Skipped);
        assert_eq!(handler.deliver(&9u32, TypeId::of::<u32>()), Delivery::Delivered);
        assert_eq!(rx.try_recv().ok(), Some(9));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_converted_values_are_sent() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handler =
            Handler::Channel(TypedChannel::new(tx).convert_from::<&'static str>().into_handler());

        assert_eq!(handler.deliver(&"hi", TypeId::of::<&str>()), Delivery::Delivered);
        assert_eq!(rx.try_recv().ok().as_deref(), Some("hi"));
    }

    #[test]
    fn test_channel_identity_uses_same_channel() {
        let (tx, _rx) = mpsc::channel::<u8>(1);
        let (other, _other_rx) = mpsc::channel::<u8>(1);
        let handler = Handler::Channel(TypedChannel::new(tx.clone()).into_handler());

        assert!(handler.is(&Probe::Channel(&tx)));
        assert!(!handler.is(&Probe::Channel(&other)));
        assert!(!handler.is(&Probe::Channel(&7u8)));
    }
}
