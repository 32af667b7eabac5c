//! Metadata resolver.
//!
//! Fetches a document from a [`MetadataSource`], parses it, runs the filter
//! chain, indexes the result and serves queries from the published
//! [`MetadataSnapshot`]. An optional background task repeats the cycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Initializing -> Ready <-> Refreshing
//!                       |            |          |
//!                       v            v          v
//!                     Failed <-------+----------+
//!
//! any state -> ShutDown
//! ```
//!
//! Queries only clone the current snapshot pointer, so they never wait for a
//! refresh. A refresh builds a complete new snapshot off the query path and
//! publishes it with one pointer swap.

mod index;
mod source;

pub use index::{MetadataSnapshot, ResolvedEntity, ResolverCriteria};
pub use source::{FilesystemSource, InMemorySource, MetadataSource, SourceDocument};

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ResolverConfig;
use crate::criteria::ValidationCriteria;
use crate::error::{MetadataError, MetadataResult};
use crate::filter::{MetadataFilter, MetadataFilterChain, SignatureValidationFilter};
use crate::parser::{MetadataParser, XmlMetadataParser};
use crate::trust::TrustEngine;

// ============================================================================
// State
// ============================================================================

/// Resolver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolverState {
    /// Constructed, `initialize` not yet called.
    Uninitialized,
    /// First cycle running.
    Initializing,
    /// Serving a snapshot.
    Ready,
    /// Serving a snapshot while a refresh runs.
    Refreshing,
    /// No servable snapshot.
    Failed,
    /// Shut down; nothing is served.
    ShutDown,
}

impl ResolverState {
    /// Returns true if queries may be answered in this state.
    #[must_use]
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }
}

/// Point-in-time resolver status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverStatus {
    /// Resolver id.
    pub id: String,
    /// Current state.
    pub state: ResolverState,
    /// Start of the most recent cycle.
    pub last_refresh_attempt: Option<DateTime<Utc>>,
    /// Completion of the most recent successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Error of the most recent failed cycle.
    pub last_error: Option<String>,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Entities in the served snapshot.
    pub entity_count: usize,
}

#[derive(Debug)]
struct StatusRecord {
    state: ResolverState,
    last_refresh_attempt: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
    published_at: Option<Instant>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`MetadataResolver`].
pub struct MetadataResolverBuilder {
    config: ResolverConfig,
    source: Option<Arc<dyn MetadataSource>>,
    parser: Arc<dyn MetadataParser>,
    filters: Vec<Arc<dyn MetadataFilter>>,
    trust_engine: Option<Arc<dyn TrustEngine>>,
    validation_criteria: Option<ValidationCriteria>,
}

impl MetadataResolverBuilder {
    fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
            source: None,
            parser: Arc::new(XmlMetadataParser),
            filters: Vec::new(),
            trust_engine: None,
            validation_criteria: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the document source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replaces the XML parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn MetadataParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Appends a filter to the chain.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn MetadataFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Validates signatures with this engine before any other filter runs.
    #[must_use]
    pub fn with_trust_engine(mut self, engine: Arc<dyn TrustEngine>) -> Self {
        self.trust_engine = Some(engine);
        self
    }

    /// Sets the default criteria for signature validation.
    #[must_use]
    pub fn with_validation_criteria(mut self, criteria: ValidationCriteria) -> Self {
        self.validation_criteria = Some(criteria);
        self
    }

    /// Builds the resolver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no source is set, or if signatures
    /// are required without a trust engine.
    pub fn build(self) -> MetadataResult<MetadataResolver> {
        let source = self
            .source
            .ok_or_else(|| MetadataError::config("a metadata source is required"))?;

        let mut chain = MetadataFilterChain::from_filters(self.filters);
        match self.trust_engine {
            Some(engine) => {
                let mut filter = SignatureValidationFilter::new(engine)
                    .with_signature_required(self.config.signature_required);
                if let Some(criteria) = self.validation_criteria {
                    criteria.validate().map_err(|e| MetadataError::config(e.to_string()))?;
                    filter = filter.with_default_criteria(criteria);
                }
                chain = chain.with_first(Arc::new(filter));
            }
            None if self.config.signature_required => {
                return Err(MetadataError::config(
                    "signature_required needs a trust engine",
                ));
            }
            None => {}
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(MetadataResolver {
            inner: Arc::new(Inner {
                config: self.config,
                source,
                parser: self.parser,
                chain,
                snapshot: RwLock::new(None),
                status: RwLock::new(StatusRecord {
                    state: ResolverState::Uninitialized,
                    last_refresh_attempt: None,
                    last_success: None,
                    last_error: None,
                    consecutive_failures: 0,
                    published_at: None,
                }),
                refresh_lock: tokio::sync::Mutex::new(()),
                shutdown_tx,
                task: Mutex::new(None),
            }),
        })
    }
}

// ============================================================================
// Resolver
// ============================================================================

struct Inner {
    config: ResolverConfig,
    source: Arc<dyn MetadataSource>,
    parser: Arc<dyn MetadataParser>,
    chain: MetadataFilterChain,
    snapshot: RwLock<Option<Arc<MetadataSnapshot>>>,
    status: RwLock<StatusRecord>,
    refresh_lock: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Resolves entities from a filtered, periodically refreshed metadata document.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MetadataResolver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("id", &self.inner.config.id)
            .field("source", &self.inner.source.id())
            .field("filters", &self.inner.chain)
            .field("state", &self.state())
            .finish()
    }
}

impl MetadataResolver {
    /// Starts building a resolver.
    #[must_use]
    pub fn builder() -> MetadataResolverBuilder {
        MetadataResolverBuilder::new()
    }

    /// Returns the resolver id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ResolverState {
        self.inner.status.read().state
    }

    /// Returns the filter names in chain order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.inner.chain.names()
    }

    /// Returns the published snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<MetadataSnapshot>> {
        self.inner.snapshot.read().clone()
    }

    /// Returns a status report.
    #[must_use]
    pub fn status(&self) -> ResolverStatus {
        let entity_count = self.snapshot().map_or(0, |s| s.entity_count());
        let status = self.inner.status.read();
        ResolverStatus {
            id: self.inner.config.id.clone(),
            state: status.state,
            last_refresh_attempt: status.last_refresh_attempt,
            last_success: status.last_success,
            last_error: status.last_error.clone(),
            consecutive_failures: status.consecutive_failures,
            entity_count,
        }
    }

    /// Runs the first cycle and, if configured, starts background refresh.
    ///
    /// # Errors
    ///
    /// Any failure is fatal: the resolver moves to `Failed` and never serves.
    /// Calling this twice is a resolver error.
    pub async fn initialize(&self) -> MetadataResult<()> {
        {
            let mut status = self.inner.status.write();
            if status.state != ResolverState::Uninitialized {
                return Err(MetadataError::resolver(format!(
                    "cannot initialize resolver in state {:?}",
                    status.state
                )));
            }
            status.state = ResolverState::Initializing;
        }

        tracing::info!(
            resolver = %self.inner.config.id,
            source = %self.inner.source.id(),
            filters = ?self.inner.chain.names(),
            "Initializing metadata resolver"
        );

        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.mark_attempt();
        match self.inner.run_cycle().await {
            Ok(snapshot) => {
                if !self.inner.publish(snapshot) {
                    return Err(MetadataError::unavailable("resolver was shut down"));
                }
            }
            Err(e) => {
                tracing::error!(
                    resolver = %self.inner.config.id,
                    error = %e,
                    "Metadata resolver initialization failed"
                );
                let mut status = self.inner.status.write();
                status.consecutive_failures += 1;
                status.last_error = Some(e.to_string());
                if status.state != ResolverState::ShutDown {
                    status.state = ResolverState::Failed;
                }
                return Err(e);
            }
        }

        if let Some(interval) = self.inner.config.refresh.interval() {
            let handle = spawn_refresh_task(&self.inner, interval);
            *self.inner.task.lock() = Some(handle);
        }
        Ok(())
    }

    /// Runs one refresh cycle now.
    ///
    /// Failures follow the refresh policy exactly like background refreshes,
    /// and are also returned to the caller. A resolver that failed after a
    /// successful initialization recovers if the cycle succeeds; a failed
    /// initialization is final.
    ///
    /// # Errors
    ///
    /// Returns a resolver error before initialization, after a failed
    /// initialization or after shutdown, or the cycle's error.
    pub async fn refresh(&self) -> MetadataResult<()> {
        let (state, ever_published) = {
            let status = self.inner.status.read();
            (status.state, status.last_success.is_some())
        };
        match state {
            ResolverState::Uninitialized | ResolverState::Initializing => Err(
                MetadataError::resolver("refresh requested before initialization"),
            ),
            ResolverState::Failed if !ever_published => Err(MetadataError::resolver(
                "resolver initialization failed; create a new resolver",
            )),
            ResolverState::ShutDown => Err(MetadataError::resolver("resolver is shut down")),
            _ => self.inner.refresh_once().await,
        }
    }

    /// Stops background refresh and withdraws the snapshot.
    ///
    /// A refresh still in flight is abandoned without publishing.
    pub async fn shutdown(&self) {
        {
            let mut status = self.inner.status.write();
            if status.state == ResolverState::ShutDown {
                return;
            }
            status.state = ResolverState::ShutDown;
            *self.inner.snapshot.write() = None;
        }
        self.inner.shutdown_tx.send_replace(true);

        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Refresh task ended abnormally");
                }
            }
        }
        tracing::info!(resolver = %self.inner.config.id, "Metadata resolver shut down");
    }

    /// Returns every entity matching `criteria`, in document order.
    ///
    /// # Errors
    ///
    /// Returns a resolver error for empty criteria and an unavailable error
    /// when no snapshot can be served.
    pub fn resolve(&self, criteria: &ResolverCriteria) -> MetadataResult<Vec<ResolvedEntity>> {
        if criteria.is_empty() {
            return Err(MetadataError::resolver(
                "criteria must constrain entityID, role or protocol",
            ));
        }
        let snapshot = self.current_snapshot()?;

        let candidates: Vec<_> = match (&criteria.entity_id, criteria.role) {
            (Some(entity_id), _) => snapshot.entity(entity_id).into_iter().collect(),
            (None, Some(role)) => snapshot.with_role(role).to_vec(),
            (None, None) => snapshot.entities().to_vec(),
        };

        let now = Utc::now();
        let tree = snapshot.tree();
        let matched: Vec<_> = candidates
            .into_iter()
            .filter(|&id| tree.node(id).as_entity().is_some_and(|e| criteria.matches(e)))
            .filter(|&id| {
                let valid = !self.inner.config.require_valid_metadata || snapshot.is_valid_at(id, now);
                if !valid {
                    tracing::debug!(entity = tree.node(id).label(), "Skipping expired entity");
                }
                valid
            })
            .collect();

        matched
            .into_iter()
            .map(|id| ResolvedEntity::new(Arc::clone(&snapshot), id))
            .collect()
    }

    /// Returns the first match in document order.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_single(&self, criteria: &ResolverCriteria) -> MetadataResult<Option<ResolvedEntity>> {
        let mut matches = self.resolve(criteria)?;
        if matches.len() > 1 {
            tracing::debug!(
                matches = matches.len(),
                criteria = ?criteria,
                "Ambiguous single resolution, returning first in document order"
            );
        }
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    fn current_snapshot(&self) -> MetadataResult<Arc<MetadataSnapshot>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        let status = self.inner.status.read();
        Err(match status.state {
            ResolverState::Uninitialized | ResolverState::Initializing => {
                MetadataError::unavailable("resolver is not initialized")
            }
            ResolverState::ShutDown => MetadataError::unavailable("resolver is shut down"),
            _ => MetadataError::unavailable(format!(
                "resolver failed: {}",
                status.last_error.as_deref().unwrap_or("unknown error")
            )),
        })
    }
}

impl Inner {
    fn mark_attempt(&self) {
        self.status.write().last_refresh_attempt = Some(Utc::now());
    }

    async fn run_cycle(&self) -> MetadataResult<Arc<MetadataSnapshot>> {
        let tree = match self.source.fetch().await? {
            SourceDocument::Bytes(bytes) => self.parser.parse(&bytes)?,
            SourceDocument::Tree(tree) => tree,
        };

        let tree = self
            .chain
            .filter(tree)?
            .ok_or_else(|| MetadataError::filter("metadata document rejected by filter chain"))?;

        Ok(Arc::new(MetadataSnapshot::build(tree)))
    }

    /// Publishes unless shut down; returns whether it did.
    fn publish(&self, snapshot: Arc<MetadataSnapshot>) -> bool {
        let mut status = self.status.write();
        if status.state == ResolverState::ShutDown {
            tracing::debug!(resolver = %self.config.id, "Discarding snapshot built during shutdown");
            return false;
        }

        let entities = snapshot.entity_count();
        *self.snapshot.write() = Some(snapshot);
        status.state = ResolverState::Ready;
        status.last_success = Some(Utc::now());
        status.last_error = None;
        status.consecutive_failures = 0;
        status.published_at = Some(Instant::now());
        drop(status);

        tracing::info!(resolver = %self.config.id, entities, "Published metadata snapshot");
        true
    }

    async fn refresh_once(&self) -> MetadataResult<()> {
        let _guard = self.refresh_lock.lock().await;
        {
            let mut status = self.status.write();
            match status.state {
                ResolverState::ShutDown => {
                    return Err(MetadataError::resolver("resolver is shut down"));
                }
                ResolverState::Ready => status.state = ResolverState::Refreshing,
                _ => {}
            }
            status.last_refresh_attempt = Some(Utc::now());
        }

        match self.run_cycle().await {
            Ok(snapshot) => {
                if self.publish(snapshot) {
                    Ok(())
                } else {
                    Err(MetadataError::resolver("resolver is shut down"))
                }
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    fn record_failure(&self, error: &MetadataError) {
        let mut status = self.status.write();
        if status.state == ResolverState::ShutDown {
            return;
        }
        status.consecutive_failures += 1;
        status.last_error = Some(error.to_string());

        let policy = &self.config.refresh;
        let stale_for = status.published_at.map(|at| at.elapsed());
        let too_stale = matches!(
            (policy.max_staleness(), stale_for),
            (Some(max), Some(age)) if age > max
        );
        let has_snapshot = self.snapshot.read().is_some();

        if !policy.on_error_keep_stale || too_stale || !has_snapshot {
            *self.snapshot.write() = None;
            status.state = ResolverState::Failed;
            tracing::error!(
                resolver = %self.config.id,
                error = %error,
                failures = status.consecutive_failures,
                too_stale,
                "Metadata refresh failed, resolver is no longer serving"
            );
        } else {
            status.state = ResolverState::Ready;
            tracing::error!(
                resolver = %self.config.id,
                error = %error,
                failures = status.consecutive_failures,
                "Metadata refresh failed, serving previous snapshot"
            );
        }
    }
}

fn spawn_refresh_task(inner: &Arc<Inner>, interval: Duration) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let mut shutdown = inner.shutdown_tx.subscribe();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let Some(inner) = weak.upgrade() else {
                break;
            };
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::debug!(resolver = %inner.config.id, "Refresh abandoned on shutdown");
                    break;
                }
                result = inner.refresh_once() => {
                    if let Err(e) = result {
                        tracing::debug!(resolver = %inner.config.id, error = %e, "Scheduled refresh failed");
                    }
                }
            }
        }
    })
}
