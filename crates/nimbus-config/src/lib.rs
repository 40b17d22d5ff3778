//! Live environment refresh for running services
//!
//! This crate re-resolves external configuration (files, remote config
//! servers, environment) without a process restart and splices the freshly
//! resolved values into the service's active, ordered configuration state:
//! - Snapshots the live property sources into an isolated copy
//! - Runs a disposable resolution context seeded with that snapshot
//! - Merges the resolved sources into the live list with anchor-based
//!   positional rules, honoring a set of untouchable baseline sources
//! - Tears down the disposable context and its parent chain on every path
//! - Broadcasts the set of changed keys to subscribers
//!
//! # Architecture
//!
//! ```text
//! live PropertySources ──snapshot──▶ EnvironmentResolver (disposable)
//!          ▲                                   │
//!          │                            fresh sources
//!          │                                   ▼
//!          └──────── merge (anchor rules) ◀────┘
//!                         │
//!                    tear_down (always)
//!                         │
//!                    RefreshEvent ──▶ subscribers
//! ```

pub mod events;
pub mod merger;
pub mod refresher;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod teardown;

// Re-export main types
pub use events::{RefreshEvent, changed_keys};
pub use merger::{ExclusionSet, STANDARD_SOURCE_NAMES, merge_into};
pub use refresher::{EnvironmentRefresher, EnvironmentRefresherBuilder};
pub use resolver::{
    EnvironmentResolver, EphemeralContext, OwnedContext, REFRESH_ARGS_SOURCE_NAME,
    ResolutionError, ResolverOptions,
};
pub use snapshot::EnvironmentSnapshot;
pub use source::{ConfigSource, PropertySources};
pub use teardown::tear_down;

/// Error types for refresh operations
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The ephemeral resolution step could not complete. Fatal to the
    /// refresh; surfaced after best-effort teardown of any partial context.
    #[error("environment resolution failed")]
    Resolution(#[source] ResolutionError),

    /// The merge anchor vanished between the containment check and the
    /// insertion. Invariant violation, not a recoverable condition.
    #[error("merge anchor {name:?} not present in the target list")]
    AnchorNotFound { name: String },

    /// Insertion would have produced two sources with the same name.
    #[error("source {name:?} is already present in the list")]
    DuplicateSource { name: String },

    /// Replacement target does not exist.
    #[error("source {name:?} is not present in the list")]
    SourceNotFound { name: String },

    /// The refresher builder was finalized without a resolver.
    #[error("no environment resolver configured")]
    MissingResolver,
}

impl RefreshError {
    pub fn anchor_not_found(name: impl Into<String>) -> Self {
        Self::AnchorNotFound { name: name.into() }
    }

    pub fn duplicate_source(name: impl Into<String>) -> Self {
        Self::DuplicateSource { name: name.into() }
    }

    pub fn source_not_found(name: impl Into<String>) -> Self {
        Self::SourceNotFound { name: name.into() }
    }
}

/// Result type for refresh operations
pub type Result<T> = std::result::Result<T, RefreshError>;
