//! Regions: orthogonal containers of sibling vertices.

use crate::vertex::VertexId;
use std::fmt;

/// Handle into the region arena of the machine that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub(crate) usize);

/// An orthogonal container of sibling vertices.
///
/// A region is owned by exactly one composite state, or by the machine
/// itself (a root region). At runtime each region holds at most one
/// active child per instance, recorded in the externally-held active
/// configuration under the region's qualified name.
pub struct Region {
    /// Name, unique within the owning state.
    pub name: String,
    /// Owning composite state; `None` for a root region.
    pub owner: Option<VertexId>,
    /// Child vertices in declaration order. The order is significant:
    /// it breaks transition-priority ties and is the default-entry
    /// fallback when the region has no entry pseudostate.
    pub children: Vec<VertexId>,
    /// Root-to-leaf path, the stable key into the active configuration.
    pub(crate) qualified_name: String,
    /// Entry pseudostate (initial or history), if any. Filled at bootstrap.
    pub(crate) entry: Option<VertexId>,
}

impl Region {
    pub(crate) fn new(name: impl Into<String>, owner: Option<VertexId>) -> Self {
        Self {
            name: name.into(),
            owner,
            children: Vec::new(),
            qualified_name: String::new(),
            entry: None,
        }
    }

    /// Qualified name of this region, the key used by the
    /// [`ActiveConfiguration`](crate::config::ActiveConfiguration) contract.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("children", &self.children.len())
            .finish()
    }
}
