//! Type matching between emitted events and handler interests.
//!
//! An [`Interest`] is captured once, at registration, from the handler's
//! declared parameter or element type. At dispatch time only the emitted
//! value's [`TypeId`] is compared against it; nothing is re-derived.

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;

/// A runtime type descriptor: the [`TypeId`] plus a name for diagnostics.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Descriptor for the static type `T`.
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    /// Descriptor for a value only known as `dyn Any`; its name is not recoverable.
    #[must_use]
    pub fn of_erased(value: &dyn Any) -> Self {
        Self { id: value.type_id(), name: "dyn Any" }
    }

    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The event types a typed handler wants to receive.
///
/// Always contains the target type itself; may additionally list source
/// types that were explicitly declared convertible into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    target: TypeKey,
    sources: Vec<TypeKey>,
}

impl Interest {
    /// Interest in exactly `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self { target: TypeKey::of::<T>(), sources: Vec::new() }
    }

    #[must_use]
    pub(crate) fn with_source(mut self, source: TypeKey) -> Self {
        if !self.accepts(source.id()) {
            self.sources.push(source);
        }
        self
    }

    /// The type handed to the handler.
    #[must_use]
    pub const fn target(&self) -> TypeKey {
        self.target
    }

    /// Additional event types converted into the target before delivery.
    #[must_use]
    pub fn sources(&self) -> &[TypeKey] {
        &self.sources
    }

    /// Whether an event of type `candidate` satisfies this interest.
    #[must_use]
    pub fn accepts(&self, candidate: TypeId) -> bool {
        candidate == self.target.id || self.sources.iter().any(|s| s.id == candidate)
    }
}

/// Decides whether an event of runtime type `candidate` may be delivered to a
/// handler that declared `interest`.
///
/// Convertible means the exact target type or one of the explicitly declared
/// source types. Sharing a trait with the target is not enough.
#[must_use]
pub fn is_convertible(candidate: TypeId, interest: &Interest) -> bool {
    interest.accepts(candidate)
}

/// A declared `S -> T` conversion, applied to a type-erased event.
pub(crate) struct Conversion<T> {
    source: TypeKey,
    convert: fn(&dyn Any) -> Option<T>,
}

impl<T> Clone for Conversion<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Conversion<T> {}

impl<T> fmt::Debug for Conversion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion").field("source", &self.source).finish()
    }
}

impl<T: Any> Conversion<T> {
    pub(crate) fn from_source<S>() -> Self
    where
        S: Any + Clone,
        T: From<S>,
    {
        Self { source: TypeKey::of::<S>(), convert: convert_from::<S, T> }
    }
}

fn convert_from<S, T>(value: &dyn Any) -> Option<T>
where
    S: Any + Clone,
    T: From<S>,
{
    value.downcast_ref::<S>().cloned().map(T::from)
}

/// A value pulled out of a type-erased event, either borrowed as-is or
/// produced by a declared conversion.
#[derive(Debug)]
pub(crate) enum Extracted<'a, T> {
    Borrowed(&'a T),
    Owned(T),
}

impl<T: Clone> Extracted<'_, T> {
    pub(crate) fn into_owned(self) -> T {
        match self {
            Self::Borrowed(value) => value.clone(),
            Self::Owned(value) => value,
        }
    }
}

impl<T> Deref for Extracted<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Borrowed(value) => value,
            Self::Owned(value) => value,
        }
    }
}

/// Recovers a `T` from a type-erased event: exact downcast first, then the
/// declared conversions in declaration order.
pub(crate) struct Extractor<T> {
    conversions: Vec<Conversion<T>>,
}

impl<T> fmt::Debug for Extractor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.conversions.iter().map(|c| c.source)).finish()
    }
}

impl<T: Any> Extractor<T> {
    pub(crate) const fn new() -> Self {
        Self { conversions: Vec::new() }
    }

    pub(crate) fn push<S>(&mut self)
    where
        S: Any + Clone,
        T: From<S>,
    {
        let source = TypeKey::of::<S>();
        if source.id() == TypeId::of::<T>() || self.conversions.iter().any(|c| c.source == source)
        {
            return;
        }
        self.conversions.push(Conversion::from_source::<S>());
    }

    pub(crate) fn interest(&self) -> Interest {
        self.conversions
            .iter()
            .fold(Interest::of::<T>(), |interest, c| interest.with_source(c.source))
    }

    pub(crate) fn extract<'a>(&self, event: &'a dyn Any) -> Option<Extracted<'a, T>> {
        if let Some(value) = event.downcast_ref::<T>() {
            return Some(Extracted::Borrowed(value));
        }
        let candidate = event.type_id();
        self.conversions
            .iter()
            .find(|c| c.source.id() == candidate)
            .and_then(|c| (c.convert)(event))
            .map(Extracted::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    impl From<i32> for Celsius {
        fn from(value: i32) -> Self {
            Self(f64::from(value))
        }
    }

    #[test]
    fn test_exact_type_is_convertible() {
        let interest = Interest::of::<String>();
        assert!(is_convertible(TypeId::of::<String>(), &interest));
        assert!(!is_convertible(TypeId::of::<&'static str>(), &interest));
    }

    #[test]
    fn test_declared_source_is_convertible() {
        let interest = Interest::of::<Celsius>().with_source(TypeKey::of::<i32>());
        assert!(is_convertible(TypeId::of::<i32>(), &interest));
        assert!(!is_convertible(TypeId::of::<i64>(), &interest));
        assert_eq!(interest.sources(), &[TypeKey::of::<i32>()]);
    }

    #[test]
    fn test_duplicate_sources_are_collapsed() {
        let interest = Interest::of::<Celsius>()
            .with_source(TypeKey::of::<i32>())
            .with_source(TypeKey::of::<i32>())
            .with_source(TypeKey::of::<Celsius>());
        assert_eq!(interest.sources().len(), 1);
    }

    #[test]
    fn test_type_key_equality_ignores_name() {
        let named = TypeKey::of::<u64>();
        let erased = TypeKey::of_erased(&5u64);
        assert_eq!(named, erased);
        assert_eq!(erased.name(), "dyn Any");
        assert_eq!(named.name(), "u64");
    }

    #[test]
    fn test_extractor_borrows_exact_type() {
        let extractor = Extractor::<String>::new();
        let event = "exact".to_owned();
        let extracted = extractor.extract(&event).expect("exact type should extract");
        assert!(matches!(extracted, Extracted::Borrowed(_)));
        assert_eq!(&*extracted, "exact");
    }

    #[test]
    fn test_extractor_converts_declared_source() {
        let mut extractor = Extractor::<Celsius>::new();
        extractor.push::<i32>();

        let extracted = extractor.extract(&21i32).expect("declared source should convert");
        assert_eq!(extracted.into_owned(), Celsius(21.0));
        assert!(extractor.extract(&21u8).is_none());
        assert_eq!(extractor.interest().sources(), &[TypeKey::of::<i32>()]);
    }
}
