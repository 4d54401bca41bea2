pub mod app_config;
pub mod group_dispatcher;
pub mod observability;

pub use app_config::AppConfig;
pub use group_dispatcher::{DispatcherConfig, GroupConfig};
pub use observability::ObservabilityConfig;
