//! Required valid-until filter.

use chrono::{Duration, Utc};

use super::MetadataFilter;
use crate::error::{MetadataError, MetadataResult};
use crate::model::MetadataTree;

/// Requires the document root to carry `validUntil`, optionally bounded.
///
/// With a maximum validity interval configured, a `validUntil` further in the
/// future than that interval is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredValidUntilFilter {
    max_validity_interval: Option<Duration>,
}

impl RequiredValidUntilFilter {
    /// Creates a filter that only requires the attribute.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_validity_interval: None,
        }
    }

    /// Bounds how far in the future `validUntil` may lie.
    ///
    /// An interval too large to add to the current time imposes no bound.
    #[must_use]
    pub const fn with_max_validity_interval(mut self, interval: Duration) -> Self {
        self.max_validity_interval = Some(interval);
        self
    }
}

impl MetadataFilter for RequiredValidUntilFilter {
    fn filter(&self, tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        let root = tree.node(tree.root());
        let valid_until = root.valid_until().ok_or_else(|| {
            MetadataError::filter(format!("metadata root '{}' has no validUntil", root.label()))
        })?;

        if let Some(max) = self.max_validity_interval {
            // An interval reaching past the representable range bounds nothing.
            let Some(limit) = Utc::now().checked_add_signed(max) else {
                return Ok(Some(tree));
            };
            if valid_until > limit {
                return Err(MetadataError::filter(format!(
                    "validUntil {valid_until} exceeds the maximum validity interval of {}s",
                    max.num_seconds()
                )));
            }
        }

        Ok(Some(tree))
    }

    fn name(&self) -> &'static str {
        "required-valid-until"
    }
}
