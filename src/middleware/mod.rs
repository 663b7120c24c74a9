// import mod
mod access_log;
mod request_id;

pub use access_log::AccessLog;
pub use request_id::RequestId;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::endpoint::DynEndpoint;
use crate::{Request, Response};

/// Middleware that wraps around remaining middleware chain.
#[crate::async_trait]
pub trait Middleware: 'static + Send + Sync {
    /// Asynchronously handle the request, and return a response.
    async fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> Response;

    /// Set the middleware's name. By default it uses the type signature.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[crate::async_trait]
impl<F> Middleware for F
where
    F: Send + Sync + 'static + for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Response>,
{
    async fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> Response {
        (self)(req, next).await
    }
}

/// The remainder of a middleware chain, including the endpoint.
#[allow(missing_debug_implementations)]
pub struct Next<'a> {
    pub(crate) endpoint: &'a DynEndpoint,
    pub(crate) next_middleware: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Asynchronously execute the remaining middleware chain.
    pub fn run(mut self, req: Request) -> BoxFuture<'a, Response> {
        if let Some((current, next)) = self.next_middleware.split_first() {
            self.next_middleware = next;
            current.handle(req, self)
        } else {
            (self.endpoint)(req)
        }
    }
}
