//! Snapshot of the live environment used to seed ephemeral resolution
//!
//! Resolution must not observe or race with concurrent mutation of the live
//! list, so it always runs against a deep, independent copy.

use crate::source::PropertySources;

/// A deep, independent copy of the live property sources
///
/// Mutations to the snapshot never affect the live list and vice versa; all
/// contained data is owned, so the clone is deep by construction.
#[derive(Debug, Clone)]
pub struct EnvironmentSnapshot {
    sources: PropertySources,
}

impl EnvironmentSnapshot {
    /// Snapshot the given live list
    pub fn of(live: &PropertySources) -> Self {
        Self {
            sources: live.clone(),
        }
    }

    pub fn sources(&self) -> &PropertySources {
        &self.sources
    }

    /// Consume the snapshot, yielding the copied list as a resolution seed
    pub fn into_sources(self) -> PropertySources {
        self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ConfigSource;
    use serde_json::json;

    #[test]
    fn test_snapshot_is_independent() {
        let mut live: PropertySources = [ConfigSource::new("app").with("port", 8080)]
            .into_iter()
            .collect();

        let snapshot = EnvironmentSnapshot::of(&live);
        let mut copy = snapshot.into_sources();

        // mutate the copy; live must not change
        copy.replace(ConfigSource::new("app").with("port", 9090))
            .unwrap();
        copy.add_first(ConfigSource::new("extra")).unwrap();
        assert_eq!(live.get_value("port"), Some(&json!(8080)));
        assert!(!live.contains("extra"));

        // mutate live; copy must not change
        live.remove("app");
        assert_eq!(copy.get_value("port"), Some(&json!(9090)));
    }
}
