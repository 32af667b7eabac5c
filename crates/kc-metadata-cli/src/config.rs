//! CLI configuration.
//!
//! Read from `~/.keycloak/kc-metadata.toml`; every field may be overridden on
//! the command line.

use std::path::{Path, PathBuf};

use kc_saml_metadata::{ResolverConfig, RoleKind};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Metadata file to load.
    pub source: Option<PathBuf>,

    /// Output format.
    pub output_format: OutputFormat,

    /// Resolver settings.
    pub resolver: ResolverConfig,

    /// Trust settings.
    pub trust: TrustConfig,

    /// Filter settings.
    pub filters: FilterConfig,
}

/// Signature trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// PEM certificates of trusted metadata signers.
    pub certificates: Vec<PathBuf>,

    /// Also try keys embedded in the signatures themselves.
    pub allow_embedded_keys: bool,

    /// Signature algorithm URIs to refuse.
    pub blacklisted_algorithms: Vec<String>,
}

impl TrustConfig {
    /// Returns true if signatures should be validated.
    pub fn is_enabled(&self) -> bool {
        !self.certificates.is_empty() || self.allow_embedded_keys
    }
}

/// Filter chain configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Roles to keep; empty keeps all.
    pub roles: Vec<RoleKind>,

    /// Entity IDs to keep; empty keeps all.
    pub include_entities: Vec<String>,

    /// Entity IDs to drop.
    pub exclude_entities: Vec<String>,

    /// Require `validUntil` on the document, bounded by this many days.
    pub max_validity_days: Option<i64>,

    /// Record enclosing group names on entities.
    pub record_group_names: bool,
}

impl CliConfig {
    /// Loads configuration from a file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> crate::CliResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| crate::CliError::Config(format!("failed to parse config: {e}")))
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file.
    pub fn save_to(&self, path: &Path) -> crate::CliResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::CliError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Gets the configuration file path.
    pub fn config_path() -> crate::CliResult<PathBuf> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| crate::CliError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".keycloak").join("kc-metadata.toml"))
    }

    /// Gets the effective source (from args or config).
    pub fn effective_source(&self, arg_source: Option<&Path>) -> crate::CliResult<PathBuf> {
        arg_source
            .map(Path::to_path_buf)
            .or_else(|| self.source.clone())
            .ok_or_else(|| {
                crate::CliError::InvalidArgument(
                    "no metadata source given (use --source or set `source` in the config)"
                        .to_string(),
                )
            })
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// Quiet (minimal output).
    Quiet,
}
