pub mod config;
pub mod logging;
pub mod paths;

pub use config::{Config, ConfigError, ConnectionConfig, LogLevel, LoggingConfig, ValidationError};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "mpdlink";
pub const APP_AUTHOR: &str = "Mpdlink";
pub const APP_QUALIFIER: &str = "io";

/// Port the daemon listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 6600;
