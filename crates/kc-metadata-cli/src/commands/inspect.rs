//! Document inspection command.

use std::collections::BTreeMap;
use std::path::Path;

use kc_saml_metadata::{MetadataSnapshot, ResolverStatus, RoleKind};
use serde::Serialize;

use super::build_resolver;
use crate::cli::PipelineArgs;
use crate::config::OutputFormat;
use crate::output::{info, output_single, render_table};
use crate::CliConfig;

/// Summary of a filtered document.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    /// Resolver status after loading.
    pub status: ResolverStatus,
    /// Filters applied, in order.
    pub filters: Vec<&'static str>,
    /// Total nodes in the filtered tree.
    pub nodes: usize,
    /// Groups in the filtered tree.
    pub groups: usize,
    /// Indexed entities.
    pub entities: usize,
    /// Entities per role.
    pub roles: BTreeMap<String, usize>,
    /// Root `validUntil`, if any.
    pub valid_until: Option<String>,
}

impl DocumentSummary {
    fn new(status: ResolverStatus, filters: Vec<&'static str>, snapshot: &MetadataSnapshot) -> Self {
        let tree = snapshot.tree();
        let groups = tree
            .preorder()
            .into_iter()
            .filter(|&id| tree.node(id).as_entities().is_some())
            .count();
        let roles = RoleKind::ALL
            .into_iter()
            .map(|kind| (kind.name().to_string(), snapshot.with_role(kind).len()))
            .filter(|(_, count)| *count > 0)
            .collect();

        Self {
            status,
            filters,
            nodes: tree.len(),
            groups,
            entities: snapshot.entity_count(),
            roles,
            valid_until: tree.node(tree.root()).valid_until().map(|t| t.to_rfc3339()),
        }
    }
}

/// Runs the inspect command.
pub async fn run_inspect(
    list_entities: bool,
    config: &CliConfig,
    source: &Path,
    pipeline: &PipelineArgs,
    format: OutputFormat,
) -> crate::CliResult<()> {
    let resolver = build_resolver(config, source, pipeline, None)?;
    resolver.initialize().await?;
    let snapshot = resolver
        .snapshot()
        .ok_or_else(|| crate::CliError::Config("resolver published no snapshot".to_string()))?;

    let summary = DocumentSummary::new(resolver.status(), resolver.filter_names(), &snapshot);
    output_single(&summary, format)?;

    if list_entities && format == OutputFormat::Table {
        let rows: Vec<_> = snapshot
            .entities()
            .iter()
            .filter_map(|&id| snapshot.tree().node(id).as_entity())
            .map(|entity| EntityLine {
                entity_id: entity.entity_id.clone(),
                roles: entity
                    .roles
                    .iter()
                    .map(|r| r.kind.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        if rows.is_empty() {
            info("The filtered document has no entities.");
        } else {
            println!("{}", render_table(&rows));
        }
    }
    Ok(())
}

#[derive(tabled::Tabled)]
struct EntityLine {
    #[tabled(rename = "Entity ID")]
    entity_id: String,
    #[tabled(rename = "Roles")]
    roles: String,
}
