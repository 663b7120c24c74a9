use std::future::Future;

use futures::future::BoxFuture;

use crate::response::IntoResponse;
use crate::{Request, Response};

pub(crate) type DynEndpoint = dyn (Fn(Request) -> BoxFuture<'static, Response>) + 'static + Send + Sync;

pub trait Endpoint: Send + Sync + 'static {
    /// The async result of `call`.
    type Fut: Future<Output = Response> + 'static + Send;

    /// Invoke the endpoint within the given context
    fn call(&self, req: Request) -> Self::Fut;
}

impl<F: Send + Sync + 'static, Fut> Endpoint for F
where
    F: Fn(Request) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    type Fut = BoxFuture<'static, Response>;

    fn call(&self, req: Request) -> Self::Fut {
        let fut = (self)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

pub(crate) fn boxed(ep: impl Endpoint) -> Box<DynEndpoint> {
    Box::new(move |req: Request| -> BoxFuture<'static, Response> { Box::pin(ep.call(req)) })
}
