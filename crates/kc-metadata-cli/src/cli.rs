//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kc_saml_metadata::RoleKind;

use crate::config::OutputFormat;

/// kc-metadata - SAML federation metadata tool for Keycloak Rust.
#[derive(Debug, Parser)]
#[command(name = "kc-metadata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Metadata file (overrides config).
    #[arg(short, long, global = true, env = "KC_METADATA_SOURCE")]
    pub source: Option<PathBuf>,

    /// Configuration file (defaults to ~/.keycloak/kc-metadata.toml).
    #[arg(short, long, global = true, env = "KC_METADATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (overrides config).
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pipeline options.
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Filter and trust options; each adds to what the config file sets.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Keep only these roles (repeatable).
    #[arg(long = "keep-role", global = true, value_parser = parse_role)]
    pub keep_roles: Vec<RoleKind>,

    /// Keep only these entity IDs (repeatable).
    #[arg(long = "include-entity", global = true)]
    pub include_entities: Vec<String>,

    /// Drop these entity IDs (repeatable).
    #[arg(long = "exclude-entity", global = true)]
    pub exclude_entities: Vec<String>,

    /// Require validUntil on the document, at most this many days ahead.
    #[arg(long, global = true)]
    pub max_validity_days: Option<i64>,

    /// Record enclosing group names on every entity.
    #[arg(long, global = true)]
    pub group_names: bool,

    /// Trusted signer certificate in PEM format (repeatable).
    #[arg(long = "cert", global = true)]
    pub certificates: Vec<PathBuf>,

    /// Trust keys embedded in signatures.
    #[arg(long, global = true)]
    pub allow_embedded_keys: bool,

    /// Refuse content not covered by a trusted signature.
    #[arg(long, global = true)]
    pub require_signature: bool,

    /// Serve entities whose validUntil has passed.
    #[arg(long, global = true)]
    pub allow_expired: bool,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve entities matching a query.
    Resolve(ResolveArgs),

    /// Summarize the filtered document.
    Inspect {
        /// Also list every entity.
        #[arg(long)]
        entities: bool,
    },

    /// Keep refreshing and report status changes until interrupted.
    Watch {
        /// Refresh interval in seconds.
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },

    /// Configuration management.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Arguments for `resolve`.
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Exact entityID.
    #[arg(short, long)]
    pub entity_id: Option<String>,

    /// Role the entity must play.
    #[arg(short, long, value_parser = parse_role)]
    pub role: Option<RoleKind>,

    /// Protocol a role must support.
    #[arg(short, long)]
    pub protocol: Option<String>,

    /// Return only the first match.
    #[arg(long)]
    pub single: bool,
}

/// Config commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,

    /// Show configuration file path.
    Path,

    /// Write a configuration file with the current settings.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Parses a role kind from its short name or element name.
pub fn parse_role(value: &str) -> Result<RoleKind, String> {
    value.parse().map_err(|e: kc_saml_metadata::MetadataError| e.to_string())
}
