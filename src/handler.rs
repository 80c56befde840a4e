//! Handler contract
//!
//! A handler executes one task. It must not keep the request after returning
//! and must return promptly once the context is cancelled.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::request::Request;
use crate::response::Response;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context, req: &mut Request) -> Response;
}

/// Wraps a handler in another handler. The first middleware registered on a
/// router is the outermost.
pub type Middleware = Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;

/// Adapter allowing ordinary synchronous functions to be used as handlers
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Context, &mut Request) -> Response + Send + Sync,
{
    async fn handle(&self, ctx: &Context, req: &mut Request) -> Response {
        (self.0)(ctx, req)
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, ctx: &Context, req: &mut Request) -> Response {
        (**self).handle(ctx, req).await
    }
}

/// Build a handler composed of the middleware stack around `handler`
pub(crate) fn chain(middleware: &[Middleware], handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, wrap| wrap(next))
}
