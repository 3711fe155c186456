//! Awardgrid Core - Foundation crate for the Awardgrid search service.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Awardgrid crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`AirlineId`, `AirportCode`, `DatePairKey`)
//!   and the search request/task tuples

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AirlineConfig, AppConfig, BrowserConfig, PoolConfig, SearchConfig, ServerConfig,
};
pub use error::{AwardgridError, ConfigError, ConfigResult, Result};
pub use types::{AirlineId, AirportCode, DatePairKey, SearchParams, SearchQuery};
