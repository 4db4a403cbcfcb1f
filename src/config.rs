//! Active-configuration contract and the default in-memory store.
//!
//! The engine never owns runtime state. Each running instance holds its
//! configuration behind this contract: per-region "current active child"
//! slots, per-region history slots, and a termination flag. Keys are
//! qualified region names; values are child vertex names (unique within
//! their region), so the mapping is stable across process restarts for
//! callers that persist it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-instance active-configuration storage.
///
/// A default in-memory implementation is provided by
/// [`InMemoryConfiguration`]. Callers needing persistence supply their
/// own implementation keyed identically by qualified region name.
///
/// The engine assumes single-writer, sequential dispatch per instance;
/// implementations do not need interior synchronization.
pub trait ActiveConfiguration {
    /// The currently active child of a region, or `None` if the region
    /// is not active.
    fn current(&self, region: &str) -> Option<String>;

    /// Records the currently active child of a region. Implementations
    /// must also record the value into the region's history slot: the
    /// engine relies on the history slot holding the last child that was
    /// ever current, which is what history pseudostates restore.
    fn set_current(&mut self, region: &str, vertex: &str);

    /// Clears the live slot of an exited region. The history slot keeps
    /// its value.
    fn clear_current(&mut self, region: &str);

    /// The last child that was current in a region, surviving exits.
    /// `None` if the region has never been entered.
    fn history(&self, region: &str) -> Option<String>;

    /// Whether the instance has reached a terminate pseudostate. Checked
    /// by `evaluate` as a fast-path short-circuit.
    fn is_terminated(&self) -> bool;

    /// Freezes the instance; all further messages are ignored.
    fn set_terminated(&mut self);
}

/// Default in-memory active configuration.
///
/// Serializable so callers can persist an instance between messages and
/// restore it later against a machine with the same structural checksum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryConfiguration {
    current: HashMap<String, String>,
    history: HashMap<String, String>,
    terminated: bool,
}

impl InMemoryConfiguration {
    /// Creates an empty configuration; populate it with
    /// [`StateMachine::initialise`](crate::machine::StateMachine::initialise).
    pub fn new() -> Self {
        Self::default()
    }

    /// All live region slots, for inspection and tests.
    pub fn active_regions(&self) -> &HashMap<String, String> {
        &self.current
    }
}

impl ActiveConfiguration for InMemoryConfiguration {
    fn current(&self, region: &str) -> Option<String> {
        self.current.get(region).cloned()
    }

    fn set_current(&mut self, region: &str, vertex: &str) {
        self.current.insert(region.to_string(), vertex.to_string());
        self.history.insert(region.to_string(), vertex.to_string());
    }

    fn clear_current(&mut self, region: &str) {
        self.current.remove(region);
    }

    fn history(&self, region: &str) -> Option<String> {
        self.history.get(region).cloned()
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn set_terminated(&mut self) {
        self.terminated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_current_records_history() {
        let mut config = InMemoryConfiguration::new();
        config.set_current("root/a", "x");

        assert_eq!(config.current("root/a").as_deref(), Some("x"));
        assert_eq!(config.history("root/a").as_deref(), Some("x"));
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut config = InMemoryConfiguration::new();
        config.set_current("root/a", "x");
        config.clear_current("root/a");

        assert_eq!(config.current("root/a"), None);
        assert_eq!(config.history("root/a").as_deref(), Some("x"));
    }

    #[test]
    fn test_never_entered_region_is_absent() {
        let config = InMemoryConfiguration::new();
        assert_eq!(config.current("root/a"), None);
        assert_eq!(config.history("root/a"), None);
    }

    #[test]
    fn test_termination_flag() {
        let mut config = InMemoryConfiguration::new();
        assert!(!config.is_terminated());
        config.set_terminated();
        assert!(config.is_terminated());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut config = InMemoryConfiguration::new();
        config.set_current("root", "operational");
        config.set_current("root/operational/media", "stopped");

        let json = serde_json::to_string(&config).unwrap();
        let restored: InMemoryConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
