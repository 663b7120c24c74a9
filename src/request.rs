use std::net::SocketAddr;

use hyper::http;

use crate::response::Body;

pub type Request = http::Request<Body>;

/// Per-request facts known by the server before routing.
#[derive(Debug, Clone, Default)]
pub struct RequestCtx {
    remote_addr: Option<SocketAddr>,
}

impl RequestCtx {
    pub(crate) fn init(req: &mut Request, remote_addr: Option<SocketAddr>) {
        req.extensions_mut().insert(RequestCtx { remote_addr });
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Caller identity, filled in by an upstream authentication layer.
///
/// Both fields stay `None` when no such layer runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user: Option<String>,
    pub status: Option<String>,
}

impl Identity {
    pub fn new(user: impl Into<String>, status: impl Into<String>) -> Self {
        Identity {
            user: Some(user.into()),
            status: Some(status.into()),
        }
    }
}

pub trait LieRequest {
    fn remote_addr(&self) -> Option<SocketAddr>;

    fn identity(&self) -> Option<&Identity>;

    fn path_and_query(&self) -> &str;

    fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T>;

    fn insert_extension<T: Send + Sync + Clone + 'static>(&mut self, val: T);
}

impl LieRequest for Request {
    fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions()
            .get::<RequestCtx>()
            .and_then(RequestCtx::remote_addr)
    }

    fn identity(&self) -> Option<&Identity> {
        self.extensions().get::<Identity>()
    }

    fn path_and_query(&self) -> &str {
        self.uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri().path())
    }

    fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions().get::<T>()
    }

    fn insert_extension<T: Send + Sync + Clone + 'static>(&mut self, val: T) {
        self.extensions_mut().insert(val);
    }
}
