pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AppConfig, HeartbeatConfig, MasterConfig, ObservabilityConfig};
pub use errors::*;
pub use logging::{LogConfig, LogLevel, OutputFormat};
pub use models::*;
pub use traits::*;
