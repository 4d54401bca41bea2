pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{AppConfig, DispatcherConfig, GroupConfig, ObservabilityConfig};
pub use errors::*;
pub use logging::{init_logging, DispatchLogger, LogFormat};
pub use models::*;
pub use traits::{CustomRouting, Invoker, MemberFactory};
