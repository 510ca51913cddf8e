pub mod config;
pub mod error;
pub mod logging;

pub use config::{LogConfig, LogFormat, SealdropConfig, StreamConfig};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
