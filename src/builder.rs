//! Graph construction surface.
//!
//! The builder is declarative configuration: it accumulates vertices,
//! regions and immutable transition records, then
//! [`build`](StateMachineBuilder::build) validates the whole graph at
//! once and returns the bootstrapped machine. Authoring mistakes that
//! the fluent surface cannot express as types (a region on a simple
//! state, hooks on a pseudostate) are collected as defects and reported
//! from `build`, so the fluent calls themselves never fail.

use crate::error::StructuralError;
use crate::machine::StateMachine;
use crate::region::{Region, RegionId};
use crate::transition::{Transition, TransitionId, TransitionKind};
use crate::vertex::{PseudostateKind, Vertex, VertexId, VertexKind};
use std::sync::Arc;

/// Builder for a [`StateMachine`] graph.
///
/// ```
/// use orthostate::{PseudostateKind, StateMachineBuilder};
///
/// let mut b = StateMachineBuilder::<String>::new("door");
/// let root = b.root_region("root");
/// let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
/// let closed = b.state(root, "closed");
/// let open = b.state(root, "open");
/// b.to(init, closed).completion();
/// b.to(closed, open).when(|m: &String| m == "open");
/// b.to(open, closed).when(|m: &String| m == "close");
/// let machine = b.build().unwrap();
/// assert_eq!(machine.name(), "door");
/// ```
pub struct StateMachineBuilder<M: 'static> {
    pub(crate) name: String,
    pub(crate) vertices: Vec<Vertex<M>>,
    pub(crate) regions: Vec<Region>,
    pub(crate) transitions: Vec<Transition<M>>,
    pub(crate) defects: Vec<StructuralError>,
}

impl<M> StateMachineBuilder<M> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            regions: Vec::new(),
            transitions: Vec::new(),
            defects: Vec::new(),
        }
    }

    /// Adds a region owned by the machine itself.
    pub fn root_region(&mut self, name: impl Into<String>) -> RegionId {
        let id = RegionId(self.regions.len());
        self.regions.push(Region::new(name, None));
        id
    }

    /// Adds a region to a composite state. Declaring a region on
    /// anything but a state is a defect reported by [`build`](Self::build).
    pub fn region(&mut self, owner: VertexId, name: impl Into<String>) -> RegionId {
        let id = RegionId(self.regions.len());
        self.regions.push(Region::new(name, Some(owner)));
        match self.vertices.get_mut(owner.0).map(|v| &mut v.kind) {
            Some(VertexKind::State { regions, .. }) => regions.push(id),
            _ => self.defects.push(StructuralError::NotComposite {
                vertex: self.vertex_label(owner),
            }),
        }
        id
    }

    /// Adds a simple state to a region. It becomes composite once a
    /// region is declared on it.
    pub fn state(&mut self, region: RegionId, name: impl Into<String>) -> VertexId {
        self.push_vertex(
            region,
            name,
            VertexKind::State {
                regions: Vec::new(),
                on_entry: None,
                on_exit: None,
            },
        )
    }

    /// Adds a pseudostate of the given kind to a region.
    pub fn pseudostate(
        &mut self,
        region: RegionId,
        name: impl Into<String>,
        kind: PseudostateKind,
    ) -> VertexId {
        self.push_vertex(region, name, VertexKind::Pseudo(kind))
    }

    /// Adds a final state to a region.
    pub fn final_state(&mut self, region: RegionId, name: impl Into<String>) -> VertexId {
        self.push_vertex(region, name, VertexKind::Final)
    }

    /// Attaches an entry hook to a state.
    pub fn on_entry(&mut self, state: VertexId, hook: impl Fn(Option<&M>) + Send + Sync + 'static) {
        match self.vertices.get_mut(state.0).map(|v| &mut v.kind) {
            Some(VertexKind::State { on_entry, .. }) => *on_entry = Some(Arc::new(hook)),
            _ => self.defects.push(StructuralError::NotComposite {
                vertex: self.vertex_label(state),
            }),
        }
    }

    /// Attaches an exit hook to a state.
    pub fn on_exit(&mut self, state: VertexId, hook: impl Fn(Option<&M>) + Send + Sync + 'static) {
        match self.vertices.get_mut(state.0).map(|v| &mut v.kind) {
            Some(VertexKind::State { on_exit, .. }) => *on_exit = Some(Arc::new(hook)),
            _ => self.defects.push(StructuralError::NotComposite {
                vertex: self.vertex_label(state),
            }),
        }
    }

    /// Starts a transition edge from `source` to `target`. The edge is
    /// external by default; refine it through the returned builder.
    pub fn to(&mut self, source: VertexId, target: VertexId) -> EdgeBuilder<'_, M> {
        let id = TransitionId(self.transitions.len());
        self.transitions.push(Transition {
            source,
            target,
            kind: TransitionKind::External,
            guard: None,
            effect: None,
        });
        EdgeBuilder {
            transitions: &mut self.transitions,
            id,
        }
    }

    /// Validates the graph and bootstraps the machine: ancestor paths,
    /// entry/exit path caches, outgoing-transition index, structural
    /// checksum. Consuming the builder makes post-bootstrap mutation
    /// unrepresentable.
    pub fn build(self) -> Result<StateMachine<M>, StructuralError> {
        StateMachine::bootstrap(self)
    }

    fn push_vertex(
        &mut self,
        region: RegionId,
        name: impl Into<String>,
        kind: VertexKind<M>,
    ) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex::new(name, region, kind));
        if let Some(r) = self.regions.get_mut(region.0) {
            r.children.push(id);
        } else {
            self.defects.push(StructuralError::DetachedVertex {
                vertex: self.vertex_label(id),
            });
        }
        id
    }

    fn vertex_label(&self, id: VertexId) -> String {
        self.vertices
            .get(id.0)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }
}

/// Fluent edge builder returned by [`StateMachineBuilder::to`].
///
/// Produces an immutable [`Transition`] record; each call refines the
/// record in place.
pub struct EdgeBuilder<'a, M: 'static> {
    transitions: &'a mut Vec<Transition<M>>,
    id: TransitionId,
}

impl<'a, M> EdgeBuilder<'a, M> {
    /// Attaches a guard predicate over the incoming message.
    pub fn when(self, guard: impl Fn(&M) -> bool + Send + Sync + 'static) -> Self {
        self.transitions[self.id.0].guard = Some(Arc::new(guard));
        self
    }

    /// Attaches an effect, run after all exits and before any entries.
    pub fn effect(self, effect: impl Fn(Option<&M>) + Send + Sync + 'static) -> Self {
        self.transitions[self.id.0].effect = Some(Arc::new(effect));
        self
    }

    /// Sets an explicit transition kind.
    pub fn kind(self, kind: TransitionKind) -> Self {
        self.transitions[self.id.0].kind = kind;
        self
    }

    /// Marks the edge as a completion transition.
    pub fn completion(self) -> Self {
        self.kind(TransitionKind::Completion)
    }

    /// Marks the edge as local.
    pub fn local(self) -> Self {
        self.kind(TransitionKind::Local)
    }

    /// Marks the edge as internal (effect only, no exits or entries).
    pub fn internal(self) -> Self {
        self.kind(TransitionKind::Internal)
    }

    /// Handle of the transition being built.
    pub fn id(&self) -> TransitionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_edge_builder() {
        let mut b = StateMachineBuilder::<u32>::new("m");
        let root = b.root_region("root");
        let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
        let a = b.state(root, "a");
        let z = b.state(root, "z");
        b.to(init, a).completion();
        let edge = b.to(a, z).when(|m| *m > 3).effect(|_| {});
        assert_eq!(edge.id(), TransitionId(1));

        let machine = b.build().unwrap();
        assert_eq!(machine.transition_count(), 2);
    }

    #[test]
    fn test_region_on_simple_vertex_is_a_defect() {
        let mut b = StateMachineBuilder::<u32>::new("m");
        let root = b.root_region("root");
        let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
        let a = b.state(root, "a");
        b.to(init, a).completion();
        b.region(init, "inner");

        let err = b.build().unwrap_err();
        assert!(matches!(err, StructuralError::NotComposite { .. }));
    }

    #[test]
    fn test_hook_on_pseudostate_is_a_defect() {
        let mut b = StateMachineBuilder::<u32>::new("m");
        let root = b.root_region("root");
        let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
        let a = b.state(root, "a");
        b.to(init, a).completion();
        b.on_entry(init, |_| {});

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::NotComposite { .. }
        ));
    }
}
