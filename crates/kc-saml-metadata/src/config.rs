//! Resolver configuration.
//!
//! Configuration can be deserialized (the CLI reads it from TOML) or loaded
//! from `KC_METADATA_*` environment variables with defaults for anything
//! unset or unparsable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background refresh behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
    /// Refresh interval in milliseconds; 0 disables background refresh.
    pub interval_ms: u64,

    /// Keep serving the last good snapshot when a refresh fails.
    pub on_error_keep_stale: bool,

    /// Stop serving once the last good snapshot is older than this
    /// (milliseconds), even with `on_error_keep_stale`.
    pub max_staleness_ms: Option<u64>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 0,
            on_error_keep_stale: true,
            max_staleness_ms: None,
        }
    }
}

impl RefreshPolicy {
    /// A policy without background refresh.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A policy refreshing every `interval`.
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// Sets whether stale snapshots are served after a failed refresh.
    #[must_use]
    pub const fn with_keep_stale(mut self, keep_stale: bool) -> Self {
        self.on_error_keep_stale = keep_stale;
        self
    }

    /// Sets the staleness limit.
    #[must_use]
    pub fn with_max_staleness(mut self, max_staleness: Duration) -> Self {
        self.max_staleness_ms = Some(u64::try_from(max_staleness.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the refresh interval, or `None` if refresh is disabled.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.interval_ms))
        }
    }

    /// Returns the staleness limit.
    #[must_use]
    pub fn max_staleness(&self) -> Option<Duration> {
        self.max_staleness_ms.map(Duration::from_millis)
    }
}

/// Metadata resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolver identifier used in logs.
    pub id: String,

    /// Refresh behavior.
    pub refresh: RefreshPolicy,

    /// Reject nodes not covered by a trusted signature.
    pub signature_required: bool,

    /// Hide entities whose `validUntil` (or an ancestor's) has passed.
    pub require_valid_metadata: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            id: "metadata".to_string(),
            refresh: RefreshPolicy::default(),
            signature_required: false,
            require_valid_metadata: true,
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `KC_METADATA_ID` | `metadata` |
    /// | `KC_METADATA_REFRESH_INTERVAL_SECS` | `0` (disabled) |
    /// | `KC_METADATA_KEEP_STALE` | `true` |
    /// | `KC_METADATA_MAX_STALENESS_SECS` | unset |
    /// | `KC_METADATA_SIGNATURE_REQUIRED` | `false` |
    /// | `KC_METADATA_REQUIRE_VALID` | `true` |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let id = std::env::var("KC_METADATA_ID").unwrap_or(defaults.id);

        let interval_secs: u64 = std::env::var("KC_METADATA_REFRESH_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let on_error_keep_stale = env_flag("KC_METADATA_KEEP_STALE", true);

        let max_staleness_ms = std::env::var("KC_METADATA_MAX_STALENESS_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));

        Self {
            id,
            refresh: RefreshPolicy {
                interval_ms: interval_secs.saturating_mul(1000),
                on_error_keep_stale,
                max_staleness_ms,
            },
            signature_required: env_flag("KC_METADATA_SIGNATURE_REQUIRED", false),
            require_valid_metadata: env_flag("KC_METADATA_REQUIRE_VALID", true),
        }
    }

    /// Sets the resolver id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the refresh policy.
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sets whether signatures are required.
    #[must_use]
    pub const fn with_signature_required(mut self, required: bool) -> Self {
        self.signature_required = required;
        self
    }

    /// Sets whether expired entities are hidden from queries.
    #[must_use]
    pub const fn with_require_valid_metadata(mut self, required: bool) -> Self {
        self.require_valid_metadata = required;
        self
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(default)
}
