//! Logging backend for the access log and application code.
//!
//! [`setup`] builds a `tracing` dispatcher from the log options of a
//! [`Config`]: a per-target level filter and a fmt layer writing one line per
//! event in the layout
//!
//! ```text
//! 2017-01-19 18:30:26.654 2082 INFO lielog::middleware [-] <message>
//! ```
//!
//! The dispatcher lives in the returned [`LogContext`] and is not installed
//! globally, so several apps in one process can each have their own.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::{Config, LogOptions};
use crate::error::{Error, Result};

/// Target of every event emitted through a [`Logger`]. Those events are
/// filtered by logger name before they reach the dispatcher.
const LOGGER_TARGET: &str = "lielog";

/// Level overrides applied to chatty dependencies unless configured otherwise.
pub const DEFAULT_LOG_LEVELS: &[&str] = &[
    "h2=WARN",
    "mio=WARN",
    "rustls=WARN",
    "tokio_util=WARN",
    "want=WARN",
];

pub fn get_default_log_levels() -> Vec<String> {
    DEFAULT_LOG_LEVELS.iter().map(|s| s.to_string()).collect()
}

/// Build the logging context for `app_name` from the registered log options.
///
/// Fails when the log file cannot be opened for appending, or when a level
/// override or the date format does not parse.
pub fn setup(config: &Config, app_name: &str) -> Result<LogContext> {
    let options = config.log_options().cloned().unwrap_or_default();

    let targets = build_filter(&options)?;
    let format = LineFormat::new(&options.log_date_format)?;
    let writer = make_writer(&options)?;

    let event_targets = targets.clone();
    let filter = filter_fn(move |meta| {
        meta.target() == LOGGER_TARGET || event_targets.would_enable(meta.target(), meta.level())
    });

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .event_format(format)
        .with_filter(filter);

    let subscriber = tracing_subscriber::registry().with(layer);

    let context = LogContext {
        app_name: app_name.to_string(),
        dispatch: Dispatch::new(subscriber),
        targets,
    };

    context.logger(LOGGER_TARGET).debug(&format!(
        "logging set up for {}, level overrides: {:?}",
        app_name, options.default_log_levels
    ));

    Ok(context)
}

fn build_filter(options: &LogOptions) -> Result<Targets> {
    let default = if options.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let directives = options.default_log_levels.join(",");
    let targets = directives
        .parse::<Targets>()
        .map_err(|e| Error::Filter(format!("{:?}: {}", directives, e)))?;

    Ok(targets.with_default(default))
}

fn make_writer(options: &LogOptions) -> Result<BoxMakeWriter> {
    let path = match options.log_path() {
        Some(path) => path,
        None => return Ok(BoxMakeWriter::new(std::io::stderr)),
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| Error::LogFile {
            path: path.clone(),
            source,
        })?;
    let file = Arc::new(file);

    if options.use_stderr {
        Ok(BoxMakeWriter::new(file.and(std::io::stderr)))
    } else {
        Ok(BoxMakeWriter::new(file))
    }
}

/// Process-lifetime logging state for one application.
#[derive(Debug, Clone)]
pub struct LogContext {
    app_name: String,
    dispatch: Dispatch,
    targets: Targets,
}

impl LogContext {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// A handle printing `name` as the logger column.
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        Logger {
            name: Arc::from(name.into()),
            dispatch: self.dispatch.clone(),
            targets: self.targets.clone(),
        }
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this context the process-wide default, so plain `tracing` macros
    /// land in the same sink. Returns `false` if a default was already set.
    pub fn install_global(&self) -> bool {
        tracing::dispatcher::set_global_default(self.dispatch.clone()).is_ok()
    }
}

/// Named handle for leveled log emission.
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
    dispatch: Dispatch,
    targets: Targets,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, None, message)
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::INFO, None, message)
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::WARN, None, message)
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::ERROR, None, message)
    }

    pub(crate) fn debug_ctx(&self, request_id: Option<&str>, message: &str) {
        self.emit(Level::DEBUG, request_id, message)
    }

    pub(crate) fn info_ctx(&self, request_id: Option<&str>, message: &str) {
        self.emit(Level::INFO, request_id, message)
    }

    /// Level overrides match the logger name, like targets do for plain
    /// `tracing` events.
    pub fn enabled(&self, level: Level) -> bool {
        self.targets.would_enable(&self.name, &level)
    }

    fn emit(&self, level: Level, request_id: Option<&str>, message: &str) {
        if !self.enabled(level) {
            return;
        }

        let logger: &str = &self.name;

        tracing::dispatcher::with_default(&self.dispatch, || {
            if level == Level::ERROR {
                tracing::error!(target: LOGGER_TARGET, logger, request_id, "{}", message);
            } else if level == Level::WARN {
                tracing::warn!(target: LOGGER_TARGET, logger, request_id, "{}", message);
            } else if level == Level::INFO {
                tracing::info!(target: LOGGER_TARGET, logger, request_id, "{}", message);
            } else if level == Level::DEBUG {
                tracing::debug!(target: LOGGER_TARGET, logger, request_id, "{}", message);
            } else {
                tracing::trace!(target: LOGGER_TARGET, logger, request_id, "{}", message);
            }
        });
    }
}

/// `<date> <pid> <LEVEL> <logger> [<request id>|-] <message>`
struct LineFormat {
    date_format: String,
    pid: u32,
}

impl LineFormat {
    fn new(date_format: &str) -> Result<Self> {
        if StrftimeItems::new(date_format).any(|item| item == Item::Error) {
            return Err(crate::error_msg!("invalid log_date_format: {}", date_format));
        }

        Ok(LineFormat {
            date_format: date_format.to_string(),
            pid: std::process::id(),
        })
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let now = chrono::Local::now();

        write!(
            writer,
            "{}.{:03} {} {} {} [{}] {}",
            now.format(&self.date_format),
            now.timestamp_subsec_millis() % 1000,
            self.pid,
            meta.level(),
            visitor.logger.as_deref().unwrap_or_else(|| meta.target()),
            visitor.request_id.as_deref().unwrap_or("-"),
            visitor.message,
        )?;
        for (name, value) in &visitor.fields {
            write!(writer, " {}={}", name, value)?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    logger: Option<String>,
    request_id: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "logger" => self.logger = Some(value.to_string()),
            "request_id" => self.request_id = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.fields.push((name, value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            name => self.fields.push((name, format!("{:?}", value))),
        }
    }
}
