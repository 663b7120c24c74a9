use crate::config::Config;
use crate::error::Result;
use crate::logging::{self, LogContext, Logger};
use crate::middleware::AccessLog;
use crate::App;

/// Name of the logger handed out by [`LogExtension::logger`].
pub const LOGGER_NAME: &str = "lielog";

/// Name printed on access log lines.
pub const ACCESS_LOGGER_NAME: &str = "lielog::middleware";

/// Level overrides for the web stack's own targets.
pub const FRAMEWORK_LOG_LEVELS: &[&str] = &["hyper=INFO", "hyper_util=INFO", "lielog::server=INFO"];

/// Binds access logging to an [`App`].
///
/// Either hand the app over right away:
///
/// ```no_run
/// # fn main() -> lielog::Result<()> {
/// use lielog::{App, Config, LogExtension};
///
/// let mut app = App::new("prefab");
/// let log = LogExtension::with_app(Config::from_env()?, &mut app)?;
/// # Ok(())
/// # }
/// ```
///
/// or create the extension first and attach it once the app exists:
///
/// ```no_run
/// # fn main() -> lielog::Result<()> {
/// use lielog::{App, Config, LogExtension};
///
/// let mut log = LogExtension::new(Config::new());
///
/// let mut app = App::new("prefab");
/// log.init_app(&mut app)?;
/// log.logger().unwrap().info("ready");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LogExtension {
    config: Config,
    context: Option<LogContext>,
    logger: Option<Logger>,
}

impl LogExtension {
    pub fn new(mut config: Config) -> Self {
        config.register_log_options();

        LogExtension {
            config,
            context: None,
            logger: None,
        }
    }

    pub fn with_app(config: Config, app: &mut App) -> Result<Self> {
        let mut ext = LogExtension::new(config);
        ext.init_app(app)?;
        Ok(ext)
    }

    /// Set up logging named after `app`, route the app's own events to it and
    /// install the access log as the next middleware of its chain.
    ///
    /// May be called once per app; each call replaces the logger.
    pub fn init_app(&mut self, app: &mut App) -> Result<()> {
        self.config
            .register_log_options()
            .extend_default_log_levels(FRAMEWORK_LOG_LEVELS.iter().copied());

        let context = logging::setup(&self.config, app.name())?;

        self.logger = Some(context.logger(LOGGER_NAME));
        app.set_log_context(context.clone());
        app.middleware(AccessLog::new(context.logger(ACCESS_LOGGER_NAME)));
        self.context = Some(context);

        Ok(())
    }

    /// `None` until [`LogExtension::init_app`] succeeded.
    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    pub fn context(&self) -> Option<&LogContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}
