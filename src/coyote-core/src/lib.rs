pub mod config;
pub mod host;
pub mod logging;
pub mod paths;

pub use config::{
    Config, ConfigError, ConnectionConfig, LogLevel, LoggingConfig, Protocol, ValidationError,
    DEFAULT_PORT,
};
pub use host::{ConnectionStatus, HostContext};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "coyote";
pub const APP_AUTHOR: &str = "Coyote";
pub const APP_QUALIFIER: &str = "io";
