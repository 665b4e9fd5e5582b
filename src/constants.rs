//! # Constants
//!
//! Shared constants used throughout the sync service.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics, health probes and the sync trigger
pub const DEFAULT_METRICS_PORT: u16 = 4000;

/// Default interval between scheduled reconciliation passes (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 14;

/// Default per-call timeout for roster and device requests (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of per-item operations allowed in flight within one phase.
/// 1 keeps every phase strictly sequential.
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 1;

/// Default page size for device user searches
pub const DEFAULT_DEVICE_PAGE_SIZE: u32 = 30;

/// Upper bound on search pages fetched from one device in a single pass.
/// Reaching it fails the fetch rather than truncating the snapshot.
pub const MAX_DEVICE_SEARCH_PAGES: u32 = 1000;

/// Default filter directive when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "roster_sync=info";

/// ISAPI endpoint paths
pub const ISAPI_USER_SEARCH_PATH: &str = "/ISAPI/AccessControl/UserInfo/Search";
pub const ISAPI_USER_RECORD_PATH: &str = "/ISAPI/AccessControl/UserInfo/Record";
pub const ISAPI_USER_MODIFY_PATH: &str = "/ISAPI/AccessControl/UserInfo/Modify";
pub const ISAPI_USER_DELETE_PATH: &str = "/ISAPI/AccessControl/UserInfoDetail/Delete";

/// Default enrollment validity window (device local time)
pub const DEFAULT_VALID_BEGIN_TIME: &str = "2023-09-26T00:00:00";
pub const DEFAULT_VALID_END_TIME: &str = "2037-12-31T23:59:59";
