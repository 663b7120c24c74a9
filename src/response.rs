use std::convert::Infallible;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Frame;
use hyper::http::{
    self,
    header::{HeaderValue, CONTENT_TYPE},
    StatusCode,
};

use crate::Error;

pub type Body = UnsyncBoxBody<Bytes, Error>;

pub type Response = http::Response<Body>;

pub fn empty_body() -> Body {
    Empty::new().map_err(Into::into).boxed_unsync()
}

pub fn full_body(body: impl Into<Bytes>) -> Body {
    Full::new(body.into()).map_err(Into::into).boxed_unsync()
}

fn with_content_type(body: Body, content_type: &mime::Mime) -> Response {
    let mut resp = http::Response::new(body);
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        resp.headers_mut().insert(CONTENT_TYPE, value);
    }
    resp
}

pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Infallible {
    fn into_response(self) -> Response {
        match self {}
    }
}

pub struct LieResponse {
    pub(crate) inner: Response,
}

impl LieResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut inner = http::Response::new(full_body(body));
        *inner.status_mut() = status;
        LieResponse { inner }
    }

    /// Respond with a body made of every item of `s`, one data frame per item.
    pub fn with_stream<S, B, E>(s: S, content_type: mime::Mime) -> Self
    where
        S: futures::Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: Into<Error> + Send + Sync + 'static,
    {
        let body = s.map(|b| b.map(|b| Frame::data(b.into())).map_err(Into::into));
        let body = BodyExt::boxed_unsync(http_body_util::StreamBody::new(body));

        with_content_type(body, &content_type).into()
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }
}

impl From<Response> for LieResponse {
    fn from(response: Response) -> Self {
        LieResponse { inner: response }
    }
}

impl From<LieResponse> for Response {
    fn from(resp: LieResponse) -> Self {
        resp.inner
    }
}

impl IntoResponse for LieResponse {
    fn into_response(self) -> Response {
        self.inner
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut resp = with_content_type(empty_body(), &mime::TEXT_PLAIN_UTF_8);
        *resp.status_mut() = self;
        resp
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        with_content_type(
            full_body(Bytes::from_static(self.as_bytes())),
            &mime::TEXT_PLAIN_UTF_8,
        )
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        with_content_type(full_body(self), &mime::TEXT_PLAIN_UTF_8)
    }
}

impl IntoResponse for (StatusCode, &'static str) {
    fn into_response(self) -> Response {
        let mut resp = self.1.into_response();
        *resp.status_mut() = self.0;
        resp
    }
}

impl IntoResponse for crate::Error {
    fn into_response(self) -> Response {
        tracing::error!("on IntoResponse for lielog::Error, error: {:?}", self);

        LieResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into()
    }
}

impl<E, R> IntoResponse for Result<R, E>
where
    R: IntoResponse,
    E: IntoResponse,
{
    fn into_response(self) -> Response {
        match self {
            Ok(r) => r.into_response(),
            Err(e) => e.into_response(),
        }
    }
}
