//! # Configuration
//!
//! Service settings: roster source, device gateway and targets, schedule,
//! HTTP server, report webhook and logging.

mod sync;

pub use sync::{
    DeviceConfig, EnrollmentDefaults, LoggingConfig, ReportConfig, RosterConfig, ScheduleConfig,
    Secret, ServerConfig, SyncConfig, TargetConfig,
};
