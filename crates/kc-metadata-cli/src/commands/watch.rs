//! Watch command: keeps a resolver refreshing and reports status changes.

use std::path::Path;
use std::time::Duration;

use kc_saml_metadata::{ResolverState, ResolverStatus};

use super::build_resolver;
use crate::cli::PipelineArgs;
use crate::config::OutputFormat;
use crate::output::{error, info, output_single, success, warning};
use crate::CliConfig;

/// Runs the watch command until Ctrl-C.
pub async fn run_watch(
    interval_secs: u64,
    config: &CliConfig,
    source: &Path,
    pipeline: &PipelineArgs,
    format: OutputFormat,
) -> crate::CliResult<()> {
    if interval_secs == 0 {
        return Err(crate::CliError::InvalidArgument(
            "interval must be at least one second".to_string(),
        ));
    }
    let interval = Duration::from_secs(interval_secs);

    let resolver = build_resolver(config, source, pipeline, Some(interval))?;
    resolver.initialize().await?;
    success(&format!(
        "Loaded {} entities from {}, refreshing every {interval_secs}s",
        resolver.status().entity_count,
        source.display()
    ));

    let mut last = resolver.status();
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = ticker.tick() => {
                let current = resolver.status();
                if changed(&last, &current) {
                    report(&current, format)?;
                }
                last = current;
            }
        }
    }

    resolver.shutdown().await;
    info("Stopped.");
    Ok(())
}

fn changed(before: &ResolverStatus, after: &ResolverStatus) -> bool {
    before.state != after.state
        || before.last_success != after.last_success
        || before.consecutive_failures != after.consecutive_failures
}

fn report(status: &ResolverStatus, format: OutputFormat) -> crate::CliResult<()> {
    if format != OutputFormat::Table {
        return output_single(status, format);
    }
    match status.state {
        ResolverState::Ready if status.consecutive_failures == 0 => {
            success(&format!("Refreshed: {} entities", status.entity_count));
        }
        ResolverState::Ready | ResolverState::Refreshing => warning(&format!(
            "Refresh failed {} time(s), serving previous snapshot: {}",
            status.consecutive_failures,
            status.last_error.as_deref().unwrap_or("unknown error")
        )),
        _ => error(&format!(
            "Resolver {:?}: {}",
            status.state,
            status.last_error.as_deref().unwrap_or("unknown error")
        )),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: ResolverState, failures: u32) -> ResolverStatus {
        ResolverStatus {
            id: "metadata".to_string(),
            state,
            last_refresh_attempt: None,
            last_success: None,
            last_error: None,
            consecutive_failures: failures,
            entity_count: 3,
        }
    }

    #[test]
    fn change_detection() {
        let ready = status(ResolverState::Ready, 0);
        assert!(!changed(&ready, &status(ResolverState::Ready, 0)));
        assert!(changed(&ready, &status(ResolverState::Ready, 1)));
        assert!(changed(&ready, &status(ResolverState::Failed, 1)));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let result = run_watch(
            0,
            &CliConfig::default(),
            Path::new("md.xml"),
            &PipelineArgs::default(),
            OutputFormat::Quiet,
        )
        .await;
        assert!(matches!(result, Err(crate::CliError::InvalidArgument(_))));
    }
}
