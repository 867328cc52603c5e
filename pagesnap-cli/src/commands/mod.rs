//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (get, set, list, show, init, path)
//! - [`validate`] - Request validation and locate-plan preview

pub mod config;
pub mod validate;
