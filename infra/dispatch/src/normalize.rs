//! Registration normalization.
//!
//! Every value accepted by [`EventQueue::register`](crate::EventQueue::register)
//! implements [`IntoHandlers`] for some marker type. The marker only exists to
//! keep the closure impls apart (`Fn()`, `Fn(&T)`, ...) and is always inferred.

use crate::channel::{ChannelSink, TypedChannel};
use crate::error::{DispatchError, Result};
use crate::func::TypedFn;
use crate::handler::{DirectHandler, EventHandler, FuncHandler, Handler};
use crate::identity::address_of;
use crate::matcher::Extractor;
use std::any::Any;
use std::sync::Arc;

/// Converts a registrable value into normalized handlers, appended in order.
pub trait IntoHandlers<Marker>: Sized {
    /// # Errors
    /// Returns [`DispatchError::UnsupportedHandlerType`] or
    /// [`DispatchError::UnsupportedHandlerShape`] when some part of the value
    /// cannot become a handler.
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()>;
}

/// Marker types selecting an [`IntoHandlers`] impl.
pub mod marker {
    use std::marker::PhantomData;

    #[derive(Debug)]
    pub struct Direct;

    #[derive(Debug)]
    pub struct DirectDyn;

    #[derive(Debug)]
    pub struct Nullary;

    #[derive(Debug)]
    pub struct Unary<T>(PhantomData<fn(&T)>);

    #[derive(Debug)]
    pub struct SharedNullary;

    #[derive(Debug)]
    pub struct SharedUnary<T>(PhantomData<fn(&T)>);

    #[derive(Debug)]
    pub struct Binary<A, B>(PhantomData<fn(&A, &B)>);

    #[derive(Debug)]
    pub struct Ternary<A, B, C>(PhantomData<fn(&A, &B, &C)>);

    #[derive(Debug)]
    pub struct Typed;

    #[derive(Debug)]
    pub struct Channel<T>(PhantomData<fn(T)>);

    #[derive(Debug)]
    pub struct TypedChannel;

    #[derive(Debug)]
    pub struct Sequence<M>(PhantomData<fn() -> M>);

    #[derive(Debug)]
    pub struct Prebuilt;

    #[derive(Debug)]
    pub struct Dynamic;

    #[derive(Debug)]
    pub struct Optional<M>(PhantomData<fn() -> M>);
}

/// Normalizes a single registrable value.
///
/// # Errors
/// See [`IntoHandlers::into_handlers`]. On error nothing is returned, even if
/// earlier elements of a sequence were valid.
pub fn normalize<M, H: IntoHandlers<M>>(handler: H) -> Result<Vec<Handler>> {
    let mut out = Vec::new();
    handler.into_handlers(&mut out)?;
    Ok(out)
}

impl<H: EventHandler + 'static> IntoHandlers<marker::Direct> for Arc<H> {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Direct(DirectHandler::new(self)));
        Ok(())
    }
}

impl IntoHandlers<marker::DirectDyn> for Arc<dyn EventHandler> {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Direct(DirectHandler::new(self)));
        Ok(())
    }
}

impl<F> IntoHandlers<marker::Nullary> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Func(FuncHandler::untyped(self, None)));
        Ok(())
    }
}

impl<T, F> IntoHandlers<marker::Unary<T>> for F
where
    T: Any,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Func(FuncHandler::typed(self, Extractor::new(), None)));
        Ok(())
    }
}

impl<F> IntoHandlers<marker::SharedNullary> for Arc<F>
where
    F: Fn() + Send + Sync + ?Sized + 'static,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        let identity = Some(address_of(&self));
        let callable = self;
        out.push(Handler::Func(FuncHandler::untyped(move || (*callable)(), identity)));
        Ok(())
    }
}

impl<T, F> IntoHandlers<marker::SharedUnary<T>> for Arc<F>
where
    T: Any,
    F: Fn(&T) + Send + Sync + ?Sized + 'static,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        let identity = Some(address_of(&self));
        let callable = self;
        let call = move |value: &T| (*callable)(value);
        out.push(Handler::Func(FuncHandler::typed(call, Extractor::new(), identity)));
        Ok(())
    }
}

impl<A, B, F> IntoHandlers<marker::Binary<A, B>> for F
where
    F: Fn(&A, &B) + Send + Sync + 'static,
{
    fn into_handlers(self, _out: &mut Vec<Handler>) -> Result<()> {
        Err(DispatchError::unsupported_shape(2, std::any::type_name::<F>()))
    }
}

impl<A, B, C, F> IntoHandlers<marker::Ternary<A, B, C>> for F
where
    F: Fn(&A, &B, &C) + Send + Sync + 'static,
{
    fn into_handlers(self, _out: &mut Vec<Handler>) -> Result<()> {
        Err(DispatchError::unsupported_shape(3, std::any::type_name::<F>()))
    }
}

impl<T, F> IntoHandlers<marker::Typed> for TypedFn<T, F>
where
    T: Any,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Func(self.into_handler(None)));
        Ok(())
    }
}

impl<T, S> IntoHandlers<marker::Channel<T>> for S
where
    T: Any + Clone + Send,
    S: ChannelSink<T>,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Channel(TypedChannel::new(self).into_handler()));
        Ok(())
    }
}

impl<T, S> IntoHandlers<marker::TypedChannel> for TypedChannel<T, S>
where
    T: Any + Clone + Send,
    S: ChannelSink<T>,
{
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(Handler::Channel(self.into_handler()));
        Ok(())
    }
}

impl<M, H: IntoHandlers<M>> IntoHandlers<marker::Sequence<M>> for Vec<H> {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        self.into_iter().try_for_each(|item| item.into_handlers(out))
    }
}

impl<M, H: IntoHandlers<M>, const N: usize> IntoHandlers<marker::Sequence<M>> for [H; N] {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        self.into_iter().try_for_each(|item| item.into_handlers(out))
    }
}

impl IntoHandlers<marker::Prebuilt> for Handler {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        out.push(self);
        Ok(())
    }
}

impl<M, H: IntoHandlers<M>> IntoHandlers<marker::Optional<M>> for Option<H> {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        match self {
            Some(handler) => handler.into_handlers(out),
            None => Err(DispatchError::unsupported_type("None")),
        }
    }
}

impl IntoHandlers<marker::Dynamic> for Box<dyn Any + Send + Sync> {
    fn into_handlers(self, out: &mut Vec<Handler>) -> Result<()> {
        let value = match self.downcast::<Handler>() {
            Ok(handler) => return (*handler).into_handlers(out),
            Err(value) => value,
        };
        let value = match value.downcast::<Arc<dyn EventHandler>>() {
            Ok(handler) => return (*handler).into_handlers(out),
            Err(value) => value,
        };
        let value = match value.downcast::<Arc<dyn Fn() + Send + Sync>>() {
            Ok(callable) => return (*callable).into_handlers(out),
            Err(value) => value,
        };
        match value.downcast::<Vec<Box<dyn Any + Send + Sync>>>() {
            Ok(items) => (*items).into_handlers(out),
            Err(_) => Err(DispatchError::unsupported_type("Box<dyn Any + Send + Sync>")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TypeKey;
    use tokio::sync::mpsc;

    struct Silent;

    impl EventHandler for Silent {
        fn handle_event(&self, _event: &dyn Any) {}
    }

    fn kinds(handlers: &[Handler]) -> Vec<&'static str> {
        handlers.iter().map(Handler::kind).collect()
    }

    #[test]
    fn test_each_shape_maps_to_its_variant() {
        let (tx, _rx) = mpsc::channel::<u32>(1);

        assert_eq!(kinds(&normalize(Arc::new(Silent)).unwrap()), ["direct"]);
        assert_eq!(kinds(&normalize(|| {}).unwrap()), ["func"]);
        assert_eq!(kinds(&normalize(|_: &u8| {}).unwrap()), ["func"]);
        assert_eq!(kinds(&normalize(tx).unwrap()), ["channel"]);
    }

    #[test]
    fn test_sequences_are_flattened_in_order() {
        let handlers =
            normalize([vec![Arc::new(Silent)], vec![Arc::new(Silent), Arc::new(Silent)]]).unwrap();
        assert_eq!(kinds(&handlers), ["direct", "direct", "direct"]);
    }

    #[test]
    fn test_dynamic_sequences_are_recognised() {
        let inner: Vec<Box<dyn Any + Send + Sync>> = vec![
            Box::new(Arc::new(Silent) as Arc<dyn EventHandler>),
            Box::new(Arc::new(|| {}) as Arc<dyn Fn() + Send + Sync>),
        ];
        let outer: Vec<Box<dyn Any + Send + Sync>> = vec![
            Box::new(Handler::Func(FuncHandler::untyped(|| {}, None))),
            Box::new(inner),
        ];

        let handlers = normalize(outer).unwrap();
        assert_eq!(kinds(&handlers), ["func", "direct", "func"]);
    }

    #[test]
    fn test_boxed_sender_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let boxed: Box<dyn Any + Send + Sync> = Box::new(tx);
        assert!(matches!(normalize(boxed), Err(DispatchError::UnsupportedHandlerType { .. })));
    }

    #[test]
    fn test_typed_func_records_interest() {
        let handlers = normalize(|_: &String| {}).unwrap();
        let interest = handlers[0].interest().unwrap();
        assert_eq!(interest.target(), TypeKey::of::<String>());
        assert!(interest.sources().is_empty());

        let handlers =
            normalize(TypedFn::new(|_: &String| {}).convert_from::<&'static str>()).unwrap();
        assert_eq!(handlers[0].interest().unwrap().sources(), &[TypeKey::of::<&str>()]);
    }

    #[test]
    fn test_multi_parameter_callables_are_rejected() {
        let err = normalize(|_: &u8, _: &u8| {}).unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedHandlerShape { arity: 2, .. }));

        let err = normalize(|_: &u8, _: &u8, _: &u8| {}).unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedHandlerShape { arity: 3, .. }));
    }

    #[test]
    fn test_unknown_dynamic_values_are_rejected() {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(17u64);
        let err = normalize(boxed).unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedHandlerType { .. }));

        let absent: Option<Arc<Silent>> = None;
        assert!(matches!(normalize(absent), Err(DispatchError::UnsupportedHandlerType { .. })));
    }

    #[test]
    fn test_one_bad_element_rejects_the_whole_sequence() {
        let items: Vec<Box<dyn Any + Send + Sync>> = vec![
            Box::new(Arc::new(Silent) as Arc<dyn EventHandler>),
            Box::new("not a handler"),
        ];
        assert!(normalize(items).is_err());
    }

    #[test]
    fn test_shared_closures_carry_identity() {
        let shared: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        let handlers = normalize(shared.clone()).unwrap();
        let probe = crate::identity::Probe::Address(address_of(&shared));
        assert!(handlers[0].is(&probe));

        let handlers = normalize(|| {}).unwrap();
        assert!(!handlers[0].is(&probe));
    }
}
