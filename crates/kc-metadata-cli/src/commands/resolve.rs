//! Entity resolution command.

use std::path::Path;

use kc_saml_metadata::ResolverCriteria;

use super::{build_resolver, EntityRow};
use crate::cli::{PipelineArgs, ResolveArgs};
use crate::config::OutputFormat;
use crate::output::{output, output_single};
use crate::CliConfig;

/// Runs a resolve command.
pub async fn run_resolve(
    args: ResolveArgs,
    config: &CliConfig,
    source: &Path,
    pipeline: &PipelineArgs,
    format: OutputFormat,
) -> crate::CliResult<()> {
    let criteria = criteria_from(&args);
    if criteria.is_empty() {
        return Err(crate::CliError::InvalidArgument(
            "give at least one of --entity-id, --role or --protocol".to_string(),
        ));
    }

    let resolver = build_resolver(config, source, pipeline, None)?;
    resolver.initialize().await?;

    if args.single {
        let entity = resolver
            .resolve_single(&criteria)?
            .ok_or_else(|| crate::CliError::NotFound(describe(&criteria)))?;
        match format {
            OutputFormat::Quiet => println!("{}", entity.entity_id()),
            _ => output_single(entity.descriptor(), format)?,
        }
    } else {
        let entities = resolver.resolve(&criteria)?;
        tracing::debug!(matches = entities.len(), "Resolved entities");
        if format == OutputFormat::Quiet {
            for entity in &entities {
                println!("{}", entity.entity_id());
            }
        } else {
            let rows: Vec<EntityRow> = entities.iter().map(EntityRow::from).collect();
            output(&rows, format)?;
        }
    }
    Ok(())
}

fn criteria_from(args: &ResolveArgs) -> ResolverCriteria {
    ResolverCriteria {
        entity_id: args.entity_id.clone(),
        role: args.role,
        protocol: args.protocol.clone(),
    }
}

fn describe(criteria: &ResolverCriteria) -> String {
    let mut parts = Vec::new();
    if let Some(entity_id) = &criteria.entity_id {
        parts.push(format!("entityID={entity_id}"));
    }
    if let Some(role) = criteria.role {
        parts.push(format!("role={role}"));
    }
    if let Some(protocol) = &criteria.protocol {
        parts.push(format!("protocol={protocol}"));
    }
    parts.join(", ")
}
