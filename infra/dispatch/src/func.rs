use crate::handler::FuncHandler;
use crate::matcher::Extractor;
use std::any::Any;
use std::fmt;

/// A one-argument functional handler under construction.
///
/// Registering a bare `Fn(&T)` closure is equivalent to registering
/// `TypedFn::new(closure)`. Build one explicitly to declare extra event types
/// that convert into `T`.
///
/// # Example
///
/// ```rust
/// use courier_dispatch::{EventQueue, TypedFn};
/// use std::sync::{Arc, Mutex};
///
/// let queue = EventQueue::new();
/// let captured = Arc::new(Mutex::new(String::new()));
/// let sink = captured.clone();
///
/// queue
///     .register(
///         TypedFn::new(move |s: &String| sink.lock().unwrap().push_str(s))
///             .convert_from::<&'static str>(),
///     )
///     .unwrap();
///
/// queue.event("hello");
/// assert_eq!(*captured.lock().unwrap(), "hello");
/// ```
pub struct TypedFn<T, F> {
    f: F,
    extractor: Extractor<T>,
}

impl<T, F> TypedFn<T, F>
where
    T: Any,
    F: Fn(&T) + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(f: F) -> Self {
        Self { f, extractor: Extractor::new() }
    }

    /// Also accept events of type `U`, converted with `T::from` before the call.
    #[must_use = "The handler must be registered to receive events."]
    pub fn convert_from<U>(mut self) -> Self
    where
        U: Any + Clone,
        T: From<U>,
    {
        self.extractor.push::<U>();
        self
    }

    pub(crate) fn into_handler(self, identity: Option<usize>) -> FuncHandler {
        FuncHandler::typed(self.f, self.extractor, identity)
    }
}

impl<T, F> fmt::Debug for TypedFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFn")
            .field("target", &std::any::type_name::<T>())
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
