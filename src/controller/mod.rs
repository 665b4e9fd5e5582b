//! # Controller
//!
//! Core reconciliation modules.
//!
//! - `normalize`: Raw roster/device records to canonical users
//! - `diff`: Create/update/delete planning
//! - `dispatch`: Applying one operation to every target device
//! - `reconciler`: One full fetch-diff-apply-report pass
//! - `scheduler`: Periodic and triggered passes, never overlapping
//! - `server`: HTTP server for metrics, health checks and triggers

pub mod diff;
pub mod dispatch;
pub mod normalize;
pub mod reconciler;
pub mod scheduler;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;
