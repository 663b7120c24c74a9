use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper::http;

use crate::logging::Logger;
use crate::{
    middleware::{Middleware, Next, RequestId},
    response::Body,
    Error, LieRequest, Request, Response,
};

const PLACEHOLDER: &str = "-";

/// Emits one INFO line per completed request:
///
/// ```text
/// <remote_addr> <remote_user> <remote_status> "<METHOD> <URI>" status: <CODE> len: <BYTES>
/// ```
///
/// The response body is read to the end before the line is written, so the
/// length is exact. The frames are handed back untouched and in order, with
/// the original body's exact size kept. `HEAD` responses log `len: 0` since no
/// body goes on the wire. Nothing is logged when the handler panics or the
/// body fails midway.
#[derive(Debug, Clone)]
pub struct AccessLog {
    logger: Logger,
}

impl AccessLog {
    pub fn new(logger: Logger) -> Self {
        AccessLog { logger }
    }

    async fn log_access<'a>(&'a self, ctx: Request, next: Next<'a>) -> Response {
        let fields = AccessFields::extract(&ctx);
        let request_id = RequestId::get(&ctx).map(ToOwned::to_owned);

        let start = std::time::Instant::now();
        let res = next.run(ctx).await;
        let (parts, body) = res.into_parts();
        let exact = body.size_hint().exact().is_some();

        let frames = match read_frames(body).await {
            Ok(frames) => frames,
            Err((frames, err)) => {
                let body = Replay::new(frames, Some(err), false).into_body();
                return Response::from_parts(parts, body);
            }
        };

        let len = if fields.method == http::Method::HEAD.as_str() {
            0
        } else {
            data_len(&frames)
        };

        let line = fields.format(parts.status.as_u16(), len);
        self.logger.info_ctx(request_id.as_deref(), &line);
        self.logger.debug_ctx(
            request_id.as_deref(),
            &format!(
                "\"{} {}\" cost: {:.3}s",
                fields.method,
                fields.uri,
                start.elapsed().as_secs_f32()
            ),
        );

        Response::from_parts(parts, Replay::new(frames, None, exact).into_body())
    }
}

#[crate::async_trait]
impl Middleware for AccessLog {
    async fn handle<'a>(&'a self, ctx: Request, next: Next<'a>) -> Response {
        self.log_access(ctx, next).await
    }
}

#[derive(Debug, PartialEq, Eq)]
struct AccessFields {
    remote_addr: String,
    remote_user: String,
    remote_status: String,
    method: String,
    uri: String,
}

impl AccessFields {
    fn extract(req: &Request) -> Self {
        let identity = req.identity();
        let or_placeholder = |val: Option<&String>| {
            val.map(String::as_str)
                .filter(|v| !v.is_empty())
                .unwrap_or(PLACEHOLDER)
                .to_owned()
        };

        AccessFields {
            remote_addr: req
                .remote_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_owned()),
            remote_user: or_placeholder(identity.and_then(|i| i.user.as_ref())),
            remote_status: or_placeholder(identity.and_then(|i| i.status.as_ref())),
            method: req.method().as_str().to_owned(),
            uri: req.path_and_query().to_owned(),
        }
    }

    fn format(&self, status: u16, len: usize) -> String {
        format!(
            "{} {} {} \"{} {}\" status: {} len: {}",
            self.remote_addr,
            self.remote_user,
            self.remote_status,
            self.method,
            self.uri,
            status,
            len
        )
    }
}

type Frames = Vec<Frame<Bytes>>;

async fn read_frames(mut body: Body) -> Result<Frames, (Frames, Error)> {
    let mut frames = Vec::new();

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => frames.push(frame),
            Err(err) => return Err((frames, err)),
        }
    }

    Ok(frames)
}

fn data_len<'a>(frames: impl IntoIterator<Item = &'a Frame<Bytes>>) -> usize {
    frames
        .into_iter()
        .filter_map(Frame::data_ref)
        .map(Bytes::len)
        .sum()
}

/// Body handing back frames already read, then the error they ended with.
struct Replay {
    frames: VecDeque<Frame<Bytes>>,
    err: Option<Error>,
    /// Report the remaining length as exact, as the original body did.
    exact: bool,
}

impl Replay {
    fn new(frames: Frames, err: Option<Error>, exact: bool) -> Self {
        Replay {
            frames: frames.into(),
            err,
            exact,
        }
    }

    fn into_body(self) -> Body {
        BodyExt::boxed_unsync(self)
    }
}

impl HttpBody for Replay {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        let this = self.get_mut();

        match this.frames.pop_front() {
            Some(frame) => Poll::Ready(Some(Ok(frame))),
            None => Poll::Ready(this.err.take().map(Err)),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.frames.is_empty() && self.err.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        let remaining = data_len(&self.frames) as u64;

        if self.exact {
            SizeHint::with_exact(remaining)
        } else {
            let mut hint = SizeHint::new();
            hint.set_lower(remaining);
            hint
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use super::*;
    use crate::request::{Identity, RequestCtx};
    use crate::response::empty_body;
    use crate::http;

    fn request(uri: &str, addr: Option<SocketAddr>) -> Request {
        let mut req = http::Request::builder()
            .method("POST")
            .uri(uri)
            .body(empty_body())
            .unwrap();
        RequestCtx::init(&mut req, addr);
        req
    }

    #[test]
    fn fields_with_identity() {
        let mut req = request("/v1/prefab/1", Some("10.19.26.194:50000".parse().unwrap()));
        req.insert_extension(Identity::new("russ7612", "Confirmed"));

        let fields = AccessFields::extract(&req);
        assert_eq!(
            fields.format(200, 8317),
            "10.19.26.194 russ7612 Confirmed \"POST /v1/prefab/1\" status: 200 len: 8317"
        );
    }

    #[test]
    fn fields_default_to_placeholder() {
        let mut req = request("/a?b=c", None);
        req.insert_extension(Identity {
            user: Some(String::new()),
            status: None,
        });

        let fields = AccessFields::extract(&req);
        assert_eq!(fields.format(404, 0), "- - - \"POST /a?b=c\" status: 404 len: 0");
    }

    #[tokio::test]
    async fn replay_keeps_frames_and_error() {
        let frames = vec![
            Frame::data(Bytes::from_static(b"ab")),
            Frame::data(Bytes::from_static(b"c")),
        ];
        let mut body = Replay::new(frames, Some(crate::error_msg!("boom")), false);
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().lower(), 3);

        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"ab"));
        let second = body.frame().await.unwrap().unwrap();
        assert_eq!(second.into_data().unwrap(), Bytes::from_static(b"c"));
        assert!(matches!(body.frame().await, Some(Err(Error::Message(_)))));
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[test]
    fn replay_counts_down_exact_size() {
        let frames = vec![
            Frame::data(Bytes::from_static(b"succ")),
            Frame::data(Bytes::from_static(b"ess")),
        ];
        let mut body = Replay::new(frames, None, true);
        assert_eq!(body.size_hint().exact(), Some(7));

        body.frames.pop_front();
        assert_eq!(body.size_hint().exact(), Some(3));
    }

    struct Harness {
        app: crate::App,
        path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn harness(name: &str) -> Harness {
        let (_dir, path) = crate::test::temp_log_file(name);
        let mut config = crate::Config::new();
        config.register_log_options().log_file = Some(path.clone());
        let ctx = crate::logging::setup(&config, name).unwrap();

        let mut app = crate::App::new(name);
        app.middleware(AccessLog::new(ctx.logger("access")));
        Harness { app, path, _dir }
    }

    fn localhost() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn access_lines(path: &std::path::Path) -> Vec<String> {
        crate::test::read_log(path)
            .lines()
            .filter(|l| l.contains(" INFO access "))
            .map(ToOwned::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn empty_body_logs_zero_len() {
        let mut h = harness("empty_body");
        h.app.get("/nothing", |_req: Request| async move {
            http::StatusCode::NO_CONTENT
        });

        let resp = h
            .app
            .respond_from(crate::test::request("GET", "/nothing"), localhost())
            .await;
        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);

        let lines = access_lines(&h.path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("\"GET /nothing\" status: 204 len: 0"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn size_hint_is_kept() {
        let route = |app: &mut crate::App| {
            app.get("/test", |_req: Request| async move { "success" });
            app.get("/stream", |_req: Request| async move {
                let chunks = vec!["a", "b"];
                crate::LieResponse::with_stream(
                    futures::stream::iter(chunks.into_iter().map(Ok::<_, Error>)),
                    mime::TEXT_PLAIN,
                )
            });
        };

        let mut plain = crate::App::new("plain");
        route(&mut plain);
        let mut h = harness("size_hint");
        route(&mut h.app);

        for uri in ["/test", "/stream"] {
            let without = plain.respond(crate::test::request("GET", uri)).await;
            let with = h.app.respond(crate::test::request("GET", uri)).await;
            assert_eq!(
                without.body().size_hint().exact(),
                with.body().size_hint().exact(),
                "{}",
                uri
            );
            assert_eq!(
                without.body().is_end_stream(),
                with.body().is_end_stream(),
                "{}",
                uri
            );
        }

        let with = h.app.respond(crate::test::request("GET", "/test")).await;
        assert_eq!(with.body().size_hint().exact(), Some(7));
        assert_eq!(access_lines(&h.path).len(), 3);
    }

    #[tokio::test]
    async fn head_logs_zero_len() {
        let mut h = harness("head");
        h.app.get("/test", |_req: Request| async move { "success" });

        let resp = h
            .app
            .respond_from(crate::test::request("HEAD", "/test"), localhost())
            .await;
        assert_eq!(resp.body().size_hint().exact(), Some(7));

        let lines = access_lines(&h.path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("\"HEAD /test\" status: 200 len: 0"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn chunks_pass_through_in_order() {
        let mut h = harness("chunks");
        h.app.get("/stream", |_req: Request| async move {
            let chunks = vec!["first,", "second,", "", "third"];
            crate::LieResponse::with_stream(
                futures::stream::iter(chunks.into_iter().map(Ok::<_, Error>)),
                mime::TEXT_PLAIN,
            )
        });

        let resp = h
            .app
            .respond_from(crate::test::request("GET", "/stream"), localhost())
            .await;
        let mut body = resp.into_body();
        let mut seen = Vec::new();
        while let Some(frame) = body.frame().await {
            seen.push(frame.unwrap().into_data().unwrap());
        }
        assert_eq!(seen, vec!["first,", "second,", "", "third"]);

        let lines = access_lines(&h.path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("status: 200 len: 18"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn identity_from_upstream_layer() {
        use futures::future::BoxFuture;

        fn keystone<'a>(mut req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            req.insert_extension(Identity::new("russ7612", "Confirmed"));
            next.run(req)
        }

        let (_dir, path) = crate::test::temp_log_file("identity");
        let mut config = crate::Config::new();
        config.register_log_options().log_file = Some(path.clone());
        let ctx = crate::logging::setup(&config, "identity").unwrap();

        let mut app = crate::App::new("identity");
        app.middleware(keystone);
        app.middleware(AccessLog::new(ctx.logger("access")));
        app.get("/v1/prefab/1", |_req: Request| async move { "prefab" });

        app.respond_from(
            crate::test::request("GET", "/v1/prefab/1"),
            "10.19.26.194:40000".parse().unwrap(),
        )
        .await;

        let lines = access_lines(&path);
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].ends_with(
                "[-] 10.19.26.194 russ7612 Confirmed \"GET /v1/prefab/1\" status: 200 len: 6"
            ),
            "{}",
            lines[0]
        );
    }

    #[tokio::test]
    async fn request_id_in_context() {
        let (_dir, path) = crate::test::temp_log_file("access_request_id");
        let mut config = crate::Config::new();
        config.register_log_options().log_file = Some(path.clone());
        let ctx = crate::logging::setup(&config, "rid").unwrap();

        let mut app = crate::App::new("rid");
        app.middleware(RequestId::new());
        app.middleware(AccessLog::new(ctx.logger("access")));
        app.get("/", |_req: Request| async move { "" });

        app.respond_from(crate::test::request("GET", "/"), localhost())
            .await;

        let lines = access_lines(&path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" INFO access [req-"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn panicking_handler_logs_nothing() {
        use futures::FutureExt;

        let mut h = harness("panic");
        h.app.get("/boom", |_req: Request| async move {
            if true {
                panic!("handler failed");
            }
            "unreachable"
        });

        let fut = h
            .app
            .respond_from(crate::test::request("GET", "/boom"), localhost());
        let res = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
        assert!(res.is_err());

        assert!(access_lines(&h.path).is_empty());
    }

    #[tokio::test]
    async fn failing_body_logs_nothing() {
        let mut h = harness("failing_body");
        h.app.get("/broken", |_req: Request| async move {
            let items = vec![Ok("partial"), Err(crate::error_msg!("stream broke"))];
            crate::LieResponse::with_stream(futures::stream::iter(items), mime::TEXT_PLAIN)
        });

        let resp = h
            .app
            .respond_from(crate::test::request("GET", "/broken"), localhost())
            .await;
        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), "partial");
        assert!(body.frame().await.unwrap().is_err());

        assert!(access_lines(&h.path).is_empty());
    }
}
