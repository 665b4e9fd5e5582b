//! Roster Sync Library
//!
//! Reconciles access-control device users against a personnel roster.
//!
//! ## Quick Start
//!
//! ```rust
//! use roster_sync::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod model;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
