//! # Dispatch
//!
//! A synchronous, in-process event dispatcher. Producers emit values of any
//! type; consumers register handlers that receive every value, only values
//! of a given type, or have matching values pushed into a channel.
//!
//! ## Overview
//!
//! An [`EventQueue`] keeps an ordered list of normalized [`Handler`]s.
//! [`EventQueue::event`] walks that list on the caller's thread and delivers
//! the value to each handler whose interest accepts its runtime type.
//!
//! ## Features
//!
//! * **Three handler shapes**: [`EventHandler`] objects, closures (`Fn()` or
//!   `Fn(&T)`), and `tokio` mpsc senders.
//! * **Explicit conversions**: [`TypedFn::convert_from`] and
//!   [`TypedChannel::convert_from`] accept extra event types through `From`.
//! * **Never blocks on channels**: full or closed channels drop the value.
//! * **Reentrant**: handlers may register, unregister, or emit on the queue
//!   that is dispatching to them.
//! * **Concurrent**: `parking_lot::RwLock` lets many threads dispatch at once.
//!
//! # Example
//!
//! ```rust
//! use courier_dispatch::{DispatchError, EventQueue};
//! use std::sync::{Arc, Mutex};
//! use tokio::sync::mpsc;
//!
//! fn main() -> Result<(), DispatchError> {
//!     let queue = EventQueue::builder().name("orders").build()?;
//!
//!     let totals = Arc::new(Mutex::new(Vec::new()));
//!     let sink = totals.clone();
//!     queue.register(move |amount: &u64| sink.lock().unwrap().push(*amount))?;
//!
//!     let (tx, mut rx) = mpsc::channel::<String>(8);
//!     queue.register(tx)?;
//!
//!     let report = queue.event(250u64);
//!     assert_eq!((report.delivered, report.skipped), (1, 1));
//!
//!     queue.event("shipped".to_owned());
//!     assert_eq!(rx.try_recv().unwrap(), "shipped");
//!     assert_eq!(*totals.lock().unwrap(), vec![250]);
//!     Ok(())
//! }
//! ```

mod channel;
mod config;
mod error;
mod func;
mod handler;
mod identity;
mod matcher;
mod normalize;
mod queue;

pub use channel::{ChannelSink, TypedChannel, Undelivered};
pub use config::{QueueBuilder, QueueConfig};
pub use error::{DispatchError, DispatchErrorExt, Result};
pub use func::TypedFn;
pub use handler::{ChannelHandler, Delivery, DirectHandler, EventHandler, FuncHandler, Handler};
pub use identity::{Identify, Probe};
pub use matcher::{Interest, TypeKey, is_convertible};
pub use normalize::{IntoHandlers, marker, normalize};
pub use queue::{DispatchReport, EventQueue, Subscription};
