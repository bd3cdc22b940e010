//! Sluice Core
//!
//! Core types and abstractions for the Sluice job control plane.
//!
//! This crate contains:
//! - Domain types: job, project and instance specifications
//! - Window engine: maps a scheduled instant onto its `[dstart, dend)` data window,
//!   with the rounding rules of spec version 1 or 2
//! - Shared error type for spec validation

pub mod domain;
pub mod error;
pub mod time;
pub mod window;

pub use error::{CoreError, Result};
pub use window::{CalendarWindow, TaskWindow, Truncation, Window};
