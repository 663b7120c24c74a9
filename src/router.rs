use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use hyper::http;

use crate::endpoint::{self, DynEndpoint, Endpoint};
use crate::middleware::{Middleware, Next};
use crate::response::IntoResponse;
use crate::{Request, Response};

#[macro_export]
macro_rules! register_method {
    ($func_name: ident, $method: expr) => {
        pub fn $func_name(&mut self, path: impl AsRef<str>, ep: impl $crate::Endpoint) {
            self.register($method, path, ep)
        }
    };
}

/// Exact-path router, one table per method.
pub struct Router {
    middlewares: Vec<Arc<dyn Middleware>>,
    method_map: HashMap<http::Method, HashMap<String, Box<DynEndpoint>>>,
    handle_not_found: Box<DynEndpoint>,
}

impl Router {
    pub fn new() -> Self {
        Router {
            middlewares: Vec::new(),
            method_map: HashMap::new(),
            handle_not_found: Box::new(not_found_endpoint),
        }
    }

    pub fn middleware(&mut self, m: impl Middleware) -> &mut Self {
        self.middlewares.push(Arc::new(m));
        self
    }

    pub fn register(&mut self, method: http::Method, path: impl AsRef<str>, ep: impl Endpoint) {
        self.method_map
            .entry(method)
            .or_default()
            .insert(path.as_ref().to_string(), endpoint::boxed(ep));
    }

    pub fn set_not_found_handler(&mut self, ep: impl Endpoint) {
        self.handle_not_found = endpoint::boxed(ep);
    }

    pub(crate) fn find(&self, method: &http::Method, path: &str) -> &DynEndpoint {
        if let Some(ep) = self.method_map.get(method).and_then(|r| r.get(path)) {
            &**ep
        } else if method == http::Method::HEAD {
            // HEAD falls back to the GET handler when none is registered
            self.find(&http::Method::GET, path)
        } else if self
            .method_map
            .iter()
            .any(|(k, r)| k != method && r.contains_key(path))
        {
            &method_not_allowed
        } else {
            &*self.handle_not_found
        }
    }

    pub(crate) async fn route(&self, req: Request) -> Response {
        let endpoint = self.find(req.method(), req.uri().path());

        let next = Next {
            endpoint,
            next_middleware: &self.middlewares,
        };

        next.run(req).await
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.middlewares.iter().map(|m| m.name()).collect();
        write!(f, "Router{{ middlewares: {:?} }}", names)
    }
}

fn not_found_endpoint(_req: Request) -> BoxFuture<'static, Response> {
    Box::pin(async move { http::StatusCode::NOT_FOUND.into_response() })
}

fn method_not_allowed(_req: Request) -> BoxFuture<'static, Response> {
    Box::pin(async move { http::StatusCode::METHOD_NOT_ALLOWED.into_response() })
}
