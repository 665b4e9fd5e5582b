//! # Runtime
//!
//! Process-level wiring: building the reconciler from configuration and
//! running it as a long-lived service, a single pass, or a dry run.

pub mod initialization;
pub mod service;

pub use initialization::{build_components, initialize, Components};
pub use service::{run_once, run_plan, run_service};
