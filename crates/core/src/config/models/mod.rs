pub mod app_config;
pub mod heartbeat;
pub mod master;
pub mod observability;

pub use app_config::AppConfig;
pub use heartbeat::HeartbeatConfig;
pub use master::MasterConfig;
pub use observability::ObservabilityConfig;
