//! Vertex hierarchy: states, pseudostates and final states.
//!
//! Vertices live in an arena owned by the [`StateMachine`](crate::machine::StateMachine)
//! and are addressed by [`VertexId`] handles. Back-references (vertex to
//! owning region) are plain ids, never ownership; the forward containment
//! (region owns vertices, state owns regions) is the only ownership
//! direction.

use crate::region::RegionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle into the vertex arena of the machine that created it.
///
/// Ids are only meaningful together with the builder/machine that issued
/// them; mixing ids across machines is an authoring error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(pub(crate) usize);

/// Entry/exit hook invoked during the cascade.
///
/// The message is absent when the hook runs during
/// [`initialise`](crate::machine::StateMachine::initialise) or during a
/// completion round, and present when a caller message triggered the
/// cascade. Hooks are expected to be synchronous and non-blocking; a
/// panicking hook propagates to the caller unchanged.
pub type Hook<M> = Arc<dyn Fn(Option<&M>) + Send + Sync>;

/// The kind of a transient pseudostate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudostateKind {
    /// Default entry point of a region; resolved automatically on entry.
    Initial,
    /// Restores the immediately-remembered child, then default entry below.
    ShallowHistory,
    /// Restores the full remembered sub-configuration transitively.
    DeepHistory,
    /// Dynamic conditional branch resolved against the current message.
    Choice,
    /// Static conditional branch; resolved identically to `Choice` here.
    Junction,
    /// Entering it terminates the instance.
    Terminate,
}

impl PseudostateKind {
    /// Whether this kind may act as a region's default entry point.
    pub fn is_entry(self) -> bool {
        matches!(
            self,
            PseudostateKind::Initial
                | PseudostateKind::ShallowHistory
                | PseudostateKind::DeepHistory
        )
    }
}

/// Closed variant set over the vertex kinds.
///
/// The kind set is fixed, so the engine branches on it exhaustively
/// instead of going through open polymorphism.
pub enum VertexKind<M: 'static> {
    /// A simple or composite state. Composite states own one or more
    /// child regions, orthogonal if more than one.
    State {
        regions: Vec<RegionId>,
        on_entry: Option<Hook<M>>,
        on_exit: Option<Hook<M>>,
    },
    /// A transient pseudostate, never an instance's resting vertex.
    Pseudo(PseudostateKind),
    /// A final state: no outgoing transitions; once active, its owning
    /// region is complete.
    Final,
}

impl<M> VertexKind<M> {
    pub fn is_state(&self) -> bool {
        matches!(self, VertexKind::State { .. })
    }

    /// Short tag used for diagnostics and the structural checksum.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            VertexKind::State { .. } => "state",
            VertexKind::Pseudo(PseudostateKind::Initial) => "initial",
            VertexKind::Pseudo(PseudostateKind::ShallowHistory) => "shallow_history",
            VertexKind::Pseudo(PseudostateKind::DeepHistory) => "deep_history",
            VertexKind::Pseudo(PseudostateKind::Choice) => "choice",
            VertexKind::Pseudo(PseudostateKind::Junction) => "junction",
            VertexKind::Pseudo(PseudostateKind::Terminate) => "terminate",
            VertexKind::Final => "final",
        }
    }
}

impl<M> fmt::Debug for VertexKind<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A vertex in the shared, immutable definition graph.
pub struct Vertex<M: 'static> {
    /// Name, unique within the owning region.
    pub name: String,
    /// Owning region, fixed at construction.
    pub parent: RegionId,
    pub kind: VertexKind<M>,
    /// Root-to-leaf path, stable external key. Filled at bootstrap.
    pub(crate) qualified_name: String,
    /// Ancestor chain, root-most vertex first, ending with this vertex.
    /// Filled at bootstrap.
    pub(crate) ancestors: Vec<VertexId>,
}

impl<M> Vertex<M> {
    pub(crate) fn new(name: impl Into<String>, parent: RegionId, kind: VertexKind<M>) -> Self {
        Self {
            name: name.into(),
            parent,
            kind,
            qualified_name: String::new(),
            ancestors: Vec::new(),
        }
    }

    /// Root-to-leaf qualified name of this vertex.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
}

impl<M> fmt::Debug for Vertex<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kinds() {
        assert!(PseudostateKind::Initial.is_entry());
        assert!(PseudostateKind::ShallowHistory.is_entry());
        assert!(PseudostateKind::DeepHistory.is_entry());
        assert!(!PseudostateKind::Choice.is_entry());
        assert!(!PseudostateKind::Junction.is_entry());
        assert!(!PseudostateKind::Terminate.is_entry());
    }

    #[test]
    fn test_kind_tags() {
        let state: VertexKind<()> = VertexKind::State {
            regions: Vec::new(),
            on_entry: None,
            on_exit: None,
        };
        assert_eq!(state.tag(), "state");
        assert!(state.is_state());
        assert_eq!(VertexKind::<()>::Final.tag(), "final");
        assert!(!VertexKind::<()>::Final.is_state());
        assert!(!VertexKind::<()>::Pseudo(PseudostateKind::Choice).is_state());
        assert_eq!(
            VertexKind::<()>::Pseudo(PseudostateKind::DeepHistory).tag(),
            "deep_history"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&PseudostateKind::ShallowHistory).unwrap();
        assert_eq!(json, "\"shallow_history\"");
    }
}
