//! Access logging for lieweb style async web apps.
//!
//! A [`LogExtension`] sets up the logging backend for an [`App`] and installs
//! the [`AccessLog`](middleware::AccessLog) middleware, which writes one line
//! per request:
//!
//! ```text
//! 2017-01-19 18:30:26.654 2082 INFO lielog::middleware [-] 10.19.26.194 russ7612 Confirmed "GET /v1/prefab/1" status: 200 len: 8317
//! ```

pub mod config;
mod endpoint;
mod error;
mod extension;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod response;
mod router;
mod server;
mod utils;

pub use config::{Config, LogOptions};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use extension::{LogExtension, ACCESS_LOGGER_NAME, FRAMEWORK_LOG_LEVELS, LOGGER_NAME};
pub use logging::{LogContext, Logger};
pub use request::{Identity, LieRequest, Request, RequestCtx};
pub use response::{IntoResponse, LieResponse, Response};
pub use server::App;

// reexport
pub use async_trait::async_trait;
pub use hyper;
pub use hyper::http;
pub use mime;
