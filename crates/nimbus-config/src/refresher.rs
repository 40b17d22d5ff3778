//! Environment refresher
//!
//! Orchestrates one refresh pass: snapshot the live environment, run the
//! resolver against the snapshot, strip the synthetic refresh-args source,
//! merge the fresh list into the live one, and tear down the ephemeral
//! context chain on every exit path. Changed keys are reported to the caller
//! and broadcast to subscribers.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info};

use crate::events::{RefreshEvent, changed_keys};
use crate::merger::{ExclusionSet, merge_into};
use crate::resolver::{
    EnvironmentResolver, REFRESH_ARGS_SOURCE_NAME, ResolverOptions,
};
use crate::snapshot::EnvironmentSnapshot;
use crate::source::PropertySources;
use crate::teardown::tear_down;
use crate::{RefreshError, Result};

/// Environment refresher builder
pub struct EnvironmentRefresherBuilder {
    environment: PropertySources,
    resolver: Option<Arc<dyn EnvironmentResolver>>,
    exclusions: ExclusionSet,
    options: ResolverOptions,
}

impl EnvironmentRefresherBuilder {
    pub fn new() -> Self {
        Self {
            environment: PropertySources::new(),
            resolver: None,
            exclusions: ExclusionSet::standard(),
            options: ResolverOptions::default(),
        }
    }

    /// Seed the live environment
    pub fn with_environment(mut self, environment: PropertySources) -> Self {
        self.environment = environment;
        self
    }

    /// Set the resolution collaborator (required)
    pub fn with_resolver(mut self, resolver: Arc<dyn EnvironmentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Override the baseline names the merge must never touch
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Override how the ephemeral resolution context is launched
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<EnvironmentRefresher> {
        let resolver = self.resolver.ok_or(RefreshError::MissingResolver)?;
        let (event_bus, _) = broadcast::channel(16);

        Ok(EnvironmentRefresher {
            environment: Arc::new(RwLock::new(self.environment)),
            resolver,
            exclusions: self.exclusions,
            options: self.options,
            event_bus,
            refresh_lock: Mutex::new(()),
        })
    }
}

impl Default for EnvironmentRefresherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Live environment with refresh-on-demand
///
/// The live list is shared mutable state with no internal locking of its
/// own; the refresher serializes refresh passes through a single-flight
/// guard, so readers observe either the fully-pre-refresh or the
/// fully-post-merge state, never an intermediate one. No internal timeout is
/// imposed; callers needing bounded latency wrap [`refresh`] externally.
///
/// [`refresh`]: EnvironmentRefresher::refresh
pub struct EnvironmentRefresher {
    /// The live ordered source list
    environment: Arc<RwLock<PropertySources>>,
    /// Resolution collaborator
    resolver: Arc<dyn EnvironmentResolver>,
    /// Baseline names never replaced or inserted
    exclusions: ExclusionSet,
    /// Ephemeral-context launch options
    options: ResolverOptions,
    /// Event bus for broadcasting refresh outcomes
    event_bus: broadcast::Sender<RefreshEvent>,
    /// Single-flight guard: at most one refresh pass at a time
    refresh_lock: Mutex<()>,
}

impl EnvironmentRefresher {
    /// Create a new builder
    pub fn builder() -> EnvironmentRefresherBuilder {
        EnvironmentRefresherBuilder::new()
    }

    /// Current live environment (clone)
    pub async fn environment(&self) -> PropertySources {
        self.environment.read().await.clone()
    }

    /// Effective value of a key in the live environment
    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.environment.read().await.get_value(key).cloned()
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_bus.subscribe()
    }

    /// Re-resolve external configuration and splice it into the live
    /// environment, returning the keys whose effective value changed
    ///
    /// One synchronous sequence of steps under the single-flight guard.
    /// Resolution and merge failures surface to the caller; teardown of the
    /// ephemeral context chain runs on every path where a context (even a
    /// partial one) was created, and its failures are absorbed.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        let _flight = self.refresh_lock.lock().await;

        let (before, snapshot) = {
            let live = self.environment.read().await;
            (live.effective_values(), EnvironmentSnapshot::of(&live))
        };
        debug!(sources = snapshot.sources().len(), "environment snapshot taken");

        let context = match self
            .resolver
            .resolve(snapshot.into_sources(), &self.options)
            .await
        {
            Ok(context) => context,
            Err(mut error) => {
                if let Some(partial) = error.take_partial_context() {
                    tear_down(partial);
                }
                return Err(RefreshError::Resolution(error));
            }
        };

        let mut fresh = context.property_sources().clone();
        fresh.remove(REFRESH_ARGS_SOURCE_NAME);

        let merged = {
            let mut live = self.environment.write().await;
            merge_into(&fresh, &mut live, &self.exclusions)
        };
        // teardown always runs once a context exists, success or not
        tear_down(context);
        merged?;

        let after = self.environment.read().await.effective_values();
        let changed = changed_keys(&before, &after);

        let _ = self.event_bus.send(RefreshEvent::new(changed.clone()));
        info!(changed = changed.len(), "environment refreshed");
        Ok(changed)
    }
}

impl std::fmt::Debug for EnvironmentRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentRefresher")
            .field("exclusions", &self.exclusions)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EphemeralContext, OwnedContext, ResolutionError};
    use crate::source::ConfigSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResolver {
        fresh: PropertySources,
    }

    #[async_trait]
    impl EnvironmentResolver for FixedResolver {
        async fn resolve(
            &self,
            _seed: PropertySources,
            _options: &ResolverOptions,
        ) -> std::result::Result<Box<dyn EphemeralContext>, ResolutionError> {
            Ok(Box::new(OwnedContext::new(self.fresh.clone())))
        }
    }

    struct FailingResolver {
        partial_releases: Arc<AtomicUsize>,
    }

    struct CountingContext {
        sources: PropertySources,
        releases: Arc<AtomicUsize>,
    }

    impl EphemeralContext for CountingContext {
        fn property_sources(&self) -> &PropertySources {
            &self.sources
        }

        fn release(
            &mut self,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn take_parent(&mut self) -> Option<Box<dyn EphemeralContext>> {
            None
        }
    }

    #[async_trait]
    impl EnvironmentResolver for FailingResolver {
        async fn resolve(
            &self,
            _seed: PropertySources,
            _options: &ResolverOptions,
        ) -> std::result::Result<Box<dyn EphemeralContext>, ResolutionError> {
            let partial = CountingContext {
                sources: PropertySources::new(),
                releases: Arc::clone(&self.partial_releases),
            };
            Err(ResolutionError::new("config server unreachable")
                .with_partial_context(Box::new(partial)))
        }
    }

    fn live_env() -> PropertySources {
        [
            ConfigSource::new("application").with("server.port", 8080),
            ConfigSource::new("defaults").with("server.host", "0.0.0.0"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_refresh_reports_changed_keys() {
        let fresh: PropertySources = [ConfigSource::new("application")
            .with("server.port", 9090)
            .with("server.timeout_ms", 5000)]
        .into_iter()
        .collect();

        let refresher = EnvironmentRefresher::builder()
            .with_environment(live_env())
            .with_resolver(Arc::new(FixedResolver { fresh }))
            .build()
            .unwrap();

        let changed = refresher.refresh().await.unwrap();

        assert_eq!(changed, vec!["server.port", "server.timeout_ms"]);
        assert_eq!(refresher.get_value("server.port").await, Some(json!(9090)));
    }

    #[tokio::test]
    async fn test_refresh_strips_refresh_args_source() {
        let fresh: PropertySources = [
            ConfigSource::new(REFRESH_ARGS_SOURCE_NAME).with("synthetic", true),
            ConfigSource::new("application").with("server.port", 9090),
        ]
        .into_iter()
        .collect();

        let refresher = EnvironmentRefresher::builder()
            .with_environment(live_env())
            .with_resolver(Arc::new(FixedResolver { fresh }))
            .build()
            .unwrap();

        refresher.refresh().await.unwrap();

        let environment = refresher.environment().await;
        assert!(!environment.contains(REFRESH_ARGS_SOURCE_NAME));
        assert!(environment.get_value("synthetic").is_none());
    }

    #[tokio::test]
    async fn test_refresh_never_touches_excluded_sources() {
        let fresh: PropertySources =
            [ConfigSource::new("defaults").with("server.host", "127.0.0.1")]
                .into_iter()
                .collect();

        let refresher = EnvironmentRefresher::builder()
            .with_environment(live_env())
            .with_resolver(Arc::new(FixedResolver { fresh }))
            .build()
            .unwrap();

        let changed = refresher.refresh().await.unwrap();

        assert!(changed.is_empty());
        assert_eq!(
            refresher.get_value("server.host").await,
            Some(json!("0.0.0.0"))
        );
    }

    #[tokio::test]
    async fn test_resolution_failure_leaves_environment_unchanged() {
        let partial_releases = Arc::new(AtomicUsize::new(0));
        let refresher = EnvironmentRefresher::builder()
            .with_environment(live_env())
            .with_resolver(Arc::new(FailingResolver {
                partial_releases: Arc::clone(&partial_releases),
            }))
            .build()
            .unwrap();

        let before = refresher.environment().await;
        let error = refresher.refresh().await.unwrap_err();

        assert!(matches!(error, RefreshError::Resolution(_)));
        assert_eq!(refresher.environment().await, before);
        // the partially created context was still torn down
        assert_eq!(partial_releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_broadcasts_event() {
        let fresh: PropertySources = [ConfigSource::new("application").with("server.port", 9090)]
            .into_iter()
            .collect();

        let refresher = EnvironmentRefresher::builder()
            .with_environment(live_env())
            .with_resolver(Arc::new(FixedResolver { fresh }))
            .build()
            .unwrap();

        let mut rx = refresher.subscribe();
        refresher.refresh().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.changed_keys, vec!["server.port"]);
    }

    #[tokio::test]
    async fn test_builder_requires_resolver() {
        let error = EnvironmentRefresher::builder().build().unwrap_err();
        assert!(matches!(error, RefreshError::MissingResolver));
    }
}
