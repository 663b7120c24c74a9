use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::http;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::logging::LogContext;
use crate::middleware::Middleware;
use crate::register_method;
use crate::request::{Request, RequestCtx};
use crate::response::Response;
use crate::router::Router;

/// The host application: a name, routes and an ordered middleware chain.
///
/// Middleware registered first runs outermost. Once a [`LogContext`] is
/// attached, framework events while serving go to its sink.
#[derive(Debug)]
pub struct App {
    name: String,
    router: Router,
    log: Option<LogContext>,
}

impl App {
    pub fn new(name: impl Into<String>) -> App {
        App {
            name: name.into(),
            router: Router::new(),
            log: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register(&mut self, method: http::Method, path: impl AsRef<str>, ep: impl Endpoint) {
        self.router.register(method, path, ep)
    }

    register_method!(get, http::Method::GET);
    register_method!(head, http::Method::HEAD);
    register_method!(post, http::Method::POST);
    register_method!(put, http::Method::PUT);
    register_method!(delete, http::Method::DELETE);
    register_method!(options, http::Method::OPTIONS);
    register_method!(patch, http::Method::PATCH);

    pub fn middleware(&mut self, m: impl Middleware) -> &mut Self {
        self.router.middleware(m);
        self
    }

    pub fn handle_not_found(&mut self, ep: impl Endpoint) -> &mut Self {
        self.router.set_not_found_handler(ep);
        self
    }

    pub(crate) fn set_log_context(&mut self, context: LogContext) {
        self.log = Some(context);
    }

    fn dispatch(&self) -> Dispatch {
        match &self.log {
            Some(context) => context.dispatch().clone(),
            None => tracing::dispatcher::get_default(|current| current.clone()),
        }
    }

    /// Dispatch a request in-process, without a socket.
    pub async fn respond(&self, req: Request) -> Response {
        let mut req = req;
        if req.extensions().get::<RequestCtx>().is_none() {
            RequestCtx::init(&mut req, None);
        }

        self.router.route(req).with_subscriber(self.dispatch()).await
    }

    /// Like [`App::respond`], as if the request came from `remote_addr`.
    pub async fn respond_from(&self, req: Request, remote_addr: SocketAddr) -> Response {
        let mut req = req;
        RequestCtx::init(&mut req, Some(remote_addr));

        self.router.route(req).with_subscriber(self.dispatch()).await
    }

    pub async fn run(self, addr: impl ToSocketAddrs) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        let dispatch = self.dispatch();
        let App { name, router, .. } = self;

        accept_loop(name, Arc::new(router), listener)
            .with_subscriber(dispatch)
            .await
    }
}

async fn accept_loop(
    name: String,
    router: Arc<Router>,
    listener: TcpListener,
) -> Result<(), Error> {
    tracing::info!("{} listening on {:?}", name, listener.local_addr()?);

    loop {
        let (socket, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("accept error: {:?}", e);
                return Err(e.into());
            }
        };
        let router = router.clone();

        let conn = async move {
            let service = service_fn(move |req: http::Request<Incoming>| {
                let router = router.clone();

                async move {
                    let mut req = req.map(|body| body.map_err(Error::from).boxed_unsync());
                    RequestCtx::init(&mut req, Some(remote_addr));

                    let resp = router.route(req).await;
                    Ok::<_, Infallible>(resp)
                }
            });

            let server = Builder::new(TokioExecutor::new());
            if let Err(e) = server
                .serve_connection(TokioIo::new(socket), service)
                .await
            {
                tracing::error!("serve_connection error: {:?}", e);
            }
        };

        // connection tasks log to the same sink as the accept loop
        tokio::task::spawn(conn.with_current_subscriber());
    }
}
