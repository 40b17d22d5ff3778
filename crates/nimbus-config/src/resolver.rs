//! The resolution seam: disposable contexts and the resolver trait
//!
//! Re-resolving external configuration is delegated to an
//! [`EnvironmentResolver`] implemented by the surrounding system (bootstrap
//! machinery, a remote config client, test stubs). The resolver runs a
//! disposable, side-effect-minimized context seeded with a snapshot of the
//! live environment and hands back an [`EphemeralContext`]: the freshly
//! resolved sources plus a releasable handle, possibly with a chain of
//! parent contexts created through nested bootstraps.

use async_trait::async_trait;
use std::fmt;

use crate::source::PropertySources;

/// Reserved name of the synthetic source injected by the resolution
/// mechanism. It is an artifact of resolution, not real configuration, and
/// is always stripped from the fresh list before merging.
pub const REFRESH_ARGS_SOURCE_NAME: &str = "refresh-args";

/// Options controlling how the disposable resolution context is launched
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Suppress any startup banner output
    pub disable_banner: bool,
    /// Run with no network-serving capability
    pub disable_web: bool,
    /// Restrict event listeners to only those that affect configuration
    /// resolution, excluding listeners with unrelated side effects such as
    /// logging reconfiguration
    pub listener_subset: Vec<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            disable_banner: true,
            disable_web: true,
            listener_subset: vec!["bootstrap".to_string(), "config-file".to_string()],
        }
    }
}

/// A disposable resolution context
///
/// Owns its resolved property sources and, when it was created through a
/// nested bootstrap, a parent context that must also be released. The live
/// target list is never owned by an ephemeral context; it is borrowed by the
/// refresher and outlives the operation. A context never outlives the
/// refresh call that created it.
pub trait EphemeralContext: Send {
    /// The freshly resolved, ordered source list
    fn property_sources(&self) -> &PropertySources;

    /// Release resources held by this context (not its parents)
    fn release(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Yield ownership of the parent context, if any
    ///
    /// Returns `None` once the chain is exhausted or the parent is not of a
    /// releasable kind. Subsequent calls return `None`.
    fn take_parent(&mut self) -> Option<Box<dyn EphemeralContext>>;
}

/// Failure of the ephemeral resolution step
///
/// Fatal to the refresh. May still carry a partially created context so the
/// refresher can tear it down before surfacing the error.
pub struct ResolutionError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    partial: Option<Box<dyn EphemeralContext>>,
}

impl ResolutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            partial: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a context that was created before resolution failed
    pub fn with_partial_context(mut self, partial: Box<dyn EphemeralContext>) -> Self {
        self.partial = Some(partial);
        self
    }

    /// Take the partially created context for teardown
    pub fn take_partial_context(&mut self) -> Option<Box<dyn EphemeralContext>> {
        self.partial.take()
    }
}

impl fmt::Debug for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionError")
            .field("message", &self.message)
            .field("source", &self.source)
            .field("has_partial_context", &self.partial.is_some())
            .finish()
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Collaborator that re-resolves external configuration
///
/// Implementations launch a disposable context seeded with the snapshot and
/// restricted per the options. Any failure to launch or resolve is fatal to
/// the refresh; there is no partial-success state for this step.
#[async_trait]
pub trait EnvironmentResolver: Send + Sync {
    async fn resolve(
        &self,
        seed: PropertySources,
        options: &ResolverOptions,
    ) -> std::result::Result<Box<dyn EphemeralContext>, ResolutionError>;
}

/// Ephemeral context backed by plain owned data
///
/// Convenience for resolver implementations whose resources are fully
/// released by dropping (and for test doubles).
pub struct OwnedContext {
    sources: PropertySources,
    parent: Option<Box<dyn EphemeralContext>>,
}

impl OwnedContext {
    pub fn new(sources: PropertySources) -> Self {
        Self {
            sources,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Box<dyn EphemeralContext>) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl EphemeralContext for OwnedContext {
    fn property_sources(&self) -> &PropertySources {
        &self.sources
    }

    fn release(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    fn take_parent(&mut self) -> Option<Box<dyn EphemeralContext>> {
        self.parent.take()
    }
}
