//! Anchor-based merging of freshly resolved sources into the live list
//!
//! The merge walks the fresh list once, in order, and splices each source
//! into the live target list:
//! - a name already present in the target is replaced in place
//! - a new name is inserted immediately after the anchor, the most recently
//!   seen fresh-list name known to exist in the target
//! - with no anchor yet, the new name goes to the head of the list
//!
//! The anchor is updated from the containment check *before* the exclusion
//! filter runs, so an excluded source that already exists in the target
//! still positions the sources that follow it. Each newly inserted source is
//! promoted to the anchor immediately; without that promotion, repeated
//! head-insertions would invert the fresh list's relative order.
//!
//! Target sources whose names never appear in the fresh list are left
//! untouched, at their original positions.

use std::collections::HashSet;
use tracing::debug;

use crate::source::PropertySources;
use crate::{RefreshError, Result};

/// Baseline source names a refresh must never replace or insert
///
/// These are registered once at process start and outside the refresh
/// engine's authority: command-line arguments, the process environment, and
/// hardcoded defaults.
pub const STANDARD_SOURCE_NAMES: &[&str] = &["command-line", "process-environment", "defaults"];

/// Names of baseline sources the merge must never replace or insert
///
/// Membership test only; carries no ordering semantics. Which names count as
/// baseline is the caller's policy decision, so the set is built up front
/// and stays immutable for the duration of a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: HashSet<String>,
}

impl ExclusionSet {
    /// An empty set: every fresh source is eligible for merging
    pub fn empty() -> Self {
        Self::default()
    }

    /// The conventional baseline names ([`STANDARD_SOURCE_NAMES`])
    pub fn standard() -> Self {
        STANDARD_SOURCE_NAMES.iter().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Merge `fresh` into `target` in place, honoring `exclusions`
///
/// Single pass over `fresh` in order, per the anchor rules above. The
/// relative order of newly inserted sources matches their order in `fresh`;
/// sources absent from `fresh` keep their position and content.
///
/// [`RefreshError::AnchorNotFound`] indicates the containment check and the
/// insertion diverged, which cannot happen under serialized callers; if it
/// is ever observed the merge aborts where it stands. Entries already
/// replaced or inserted are not rolled back.
pub fn merge_into(
    fresh: &PropertySources,
    target: &mut PropertySources,
    exclusions: &ExclusionSet,
) -> Result<()> {
    let mut anchor: Option<String> = None;

    for source in fresh.iter() {
        let name = source.name();

        // anchor updates regardless of exclusion: an excluded name already
        // in the target still positions whatever follows it
        if target.contains(name) {
            anchor = Some(name.to_string());
        }
        if exclusions.contains(name) {
            debug!(source = name, "skipping excluded source");
            continue;
        }

        if target.contains(name) {
            target.replace(source.clone())?;
            debug!(source = name, "replaced in place");
        } else {
            match anchor.as_deref() {
                Some(at) => {
                    target.add_after(at, source.clone())?;
                    debug!(source = name, after = at, "inserted after anchor");
                }
                None => {
                    target.add_first(source.clone())?;
                    debug!(source = name, "inserted at head");
                }
            }
            // the inserted source becomes the anchor so the next insertion
            // lands after it rather than before it
            anchor = Some(name.to_string());
        }
    }

    Ok(())
}
