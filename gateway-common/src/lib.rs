//! Shared building blocks for the assets gateway.
//!
//! This crate carries the pieces every gateway binary needs but that do
//! not belong to the request path itself:
//! - the unified error taxonomy ([`error::Error`]) with HTTP status mapping
//! - configuration loading with profile selection ([`config::Config`])
//! - structured logging setup ([`logging::init_logging`])

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
