//! # kc-metadata-cli
//!
//! Command-line tools for SAML federation metadata.
//!
//! This crate provides command-line utilities for:
//! - Resolving entities by entityID, role and protocol
//! - Inspecting a filtered, signature-checked metadata document
//! - Watching a metadata file through periodic refreshes

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
