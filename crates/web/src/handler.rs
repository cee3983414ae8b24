//! Handlers and handler chains.
//!
//! A handler is anything that can act on a [`Context`]; middleware and
//! endpoints share the same shape. Routes own an immutable [`HandlersChain`]
//! which contexts borrow by reference count while serving a request.

use crate::context::Context;
use crate::error::RouteError;
use std::fmt;
use std::sync::Arc;

/// Index value marking an aborted chain, also the upper bound on chain length.
pub(crate) const ABORT_INDEX: i8 = i8::MAX / 2;

/// A unit of request processing.
///
/// Any `Fn(&mut Context)` that is `Send + Sync + 'static` is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut Context);

    /// Name reported by route listings and the logger.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, ctx: &mut Context) {
        (self)(ctx)
    }
}

/// A shared, type-erased handler.
pub type HandlerFunc = Arc<dyn Handler>;

/// The immutable chain of handlers attached to a route.
#[derive(Clone)]
pub struct HandlersChain {
    inner: Arc<[HandlerFunc]>,
}

impl HandlersChain {
    pub fn empty() -> Self {
        Self { inner: Arc::from(Vec::new()) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&HandlerFunc> {
        self.inner.get(index)
    }

    /// The last handler of the chain, the endpoint.
    pub fn last(&self) -> Option<&HandlerFunc> {
        self.inner.last()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.inner.iter().map(|handler| handler.name()).collect()
    }

    pub(crate) fn as_slice(&self) -> &[HandlerFunc] {
        &self.inner
    }

    /// Concatenates `head` and `tail`, rejecting chains that would collide
    /// with the abort sentinel.
    pub(crate) fn combine(head: &[HandlerFunc], tail: Vec<HandlerFunc>) -> Result<Self, RouteError> {
        let count = head.len() + tail.len();
        let max = usize::try_from(ABORT_INDEX).unwrap_or_default();
        if count >= max {
            return Err(RouteError::TooManyHandlers { count, max });
        }
        let mut merged = Vec::with_capacity(count);
        merged.extend(head.iter().cloned());
        merged.extend(tail);
        Ok(Self { inner: Arc::from(merged) })
    }
}

impl Default for HandlersChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HandlersChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl From<Vec<HandlerFunc>> for HandlersChain {
    fn from(handlers: Vec<HandlerFunc>) -> Self {
        Self { inner: Arc::from(handlers) }
    }
}

/// Conversion into an ordered list of handlers, so registration accepts a
/// single handler, a tuple of handlers, or a prepared `Vec<HandlerFunc>`.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<HandlerFunc>;
}

impl<H: Handler> IntoHandlers for H {
    fn into_handlers(self) -> Vec<HandlerFunc> {
        vec![Arc::new(self)]
    }
}

impl IntoHandlers for Vec<HandlerFunc> {
    fn into_handlers(self) -> Vec<HandlerFunc> {
        self
    }
}

impl IntoHandlers for () {
    fn into_handlers(self) -> Vec<HandlerFunc> {
        Vec::new()
    }
}

/// impl `IntoHandlers` for tuples of handlers, from 1 to 8 elements
///
/// for example, it will impl (A, B) like this:
///```ignore
/// impl<A: Handler, B: Handler> IntoHandlers for (A, B) {
///     #[allow(non_snake_case)]
///     fn into_handlers(self) -> Vec<HandlerFunc> {
///         let (A, B) = self;
///         vec![Arc::new(A), Arc::new(B)]
///     }
/// }
///```
macro_rules! impl_into_handlers_for_tuple ({ $($param:ident)* } => {
    impl<$($param: Handler,)*> IntoHandlers for ($($param,)*) {
        #[inline]
        #[allow(non_snake_case)]
        fn into_handlers(self) -> Vec<HandlerFunc> {
            let ($($param,)*) = self;
            vec![$(Arc::new($param) as HandlerFunc,)*]
        }
    }
});

impl_into_handlers_for_tuple! { A }
impl_into_handlers_for_tuple! { A B }
impl_into_handlers_for_tuple! { A B C }
impl_into_handlers_for_tuple! { A B C D }
impl_into_handlers_for_tuple! { A B C D E }
impl_into_handlers_for_tuple! { A B C D E F }
impl_into_handlers_for_tuple! { A B C D E F G }
impl_into_handlers_for_tuple! { A B C D E F G H }
