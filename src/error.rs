use std::convert::Infallible;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("hyper error")]
    Hyper(#[from] hyper::Error),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
    #[error("open log file {path:?} failed")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid log level filter: {0}")]
    Filter(String),
    #[error("{0}")]
    Message(String),
}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

#[macro_export]
macro_rules! error_msg {
    ($($arg:tt)*) => {
        $crate::Error::Message(format!($($arg)*))
    };
}
