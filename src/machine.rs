//! State machine: graph ownership and one-time structural bootstrap.
//!
//! Bootstrap validates the whole graph up front and precomputes per-vertex
//! ancestor chains, the outgoing-transition index, qualified names and a
//! structural checksum. All structural faults surface here; a
//! bootstrapped machine never raises errors during evaluation.

use crate::builder::StateMachineBuilder;
use crate::error::StructuralError;
use crate::region::{Region, RegionId};
use crate::transition::{Transition, TransitionId, TransitionKind};
use crate::vertex::{PseudostateKind, Vertex, VertexId, VertexKind};
use serde::Serialize;
use std::fmt;

/// An immutable, bootstrapped state machine definition.
///
/// The graph is shared read-only across all instances: wrap it in an
/// `Arc` to evaluate many instances from many threads. All runtime state
/// lives in the per-instance
/// [`ActiveConfiguration`](crate::config::ActiveConfiguration).
pub struct StateMachine<M: 'static> {
    name: String,
    pub(crate) vertices: Vec<Vertex<M>>,
    pub(crate) regions: Vec<Region>,
    pub(crate) transitions: Vec<Transition<M>>,
    pub(crate) roots: Vec<RegionId>,
    /// Outgoing transitions per vertex, in declaration order.
    pub(crate) outgoing: Vec<Vec<TransitionId>>,
    checksum: String,
}

/// Canonical structural shape backing the checksum. Callers persisting
/// configurations compare checksums across restarts to detect
/// definition drift.
#[derive(Serialize)]
struct StructuralSummary<'a> {
    name: &'a str,
    regions: Vec<(Option<usize>, &'a str)>,
    vertices: Vec<(usize, &'a str, &'a str)>,
    transitions: Vec<(usize, usize, TransitionKind, bool)>,
}

impl<M> StateMachine<M> {
    pub(crate) fn bootstrap(builder: StateMachineBuilder<M>) -> Result<Self, StructuralError> {
        let StateMachineBuilder {
            name,
            mut vertices,
            mut regions,
            transitions,
            mut defects,
        } = builder;

        if let Some(defect) = defects.drain(..).next() {
            return Err(defect);
        }

        for (index, t) in transitions.iter().enumerate() {
            if t.source.0 >= vertices.len() || t.target.0 >= vertices.len() {
                return Err(StructuralError::DanglingEndpoint { index });
            }
        }

        let roots: Vec<RegionId> = regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.owner.is_none())
            .map(|(i, _)| RegionId(i))
            .collect();

        // Qualified names and ancestor chains, walking containment from
        // the roots. Anything the walk never reaches is detached.
        let mut visited = vec![false; vertices.len()];
        let mut region_stack: Vec<RegionId> = roots.clone();
        while let Some(rid) = region_stack.pop() {
            let (owner_qname, owner_ancestors) = match regions[rid.0].owner {
                Some(owner) => (
                    Some(vertices[owner.0].qualified_name.clone()),
                    vertices[owner.0].ancestors.clone(),
                ),
                None => (None, Vec::new()),
            };
            let region_qname = match owner_qname {
                Some(q) => format!("{}/{}", q, regions[rid.0].name),
                None => regions[rid.0].name.clone(),
            };
            regions[rid.0].qualified_name = region_qname.clone();

            let children = regions[rid.0].children.clone();
            for v in children {
                vertices[v.0].qualified_name = format!("{}/{}", region_qname, vertices[v.0].name);
                let mut ancestors = owner_ancestors.clone();
                ancestors.push(v);
                vertices[v.0].ancestors = ancestors;
                visited[v.0] = true;
                if let VertexKind::State { regions: owned, .. } = &vertices[v.0].kind {
                    region_stack.extend(owned.iter().copied());
                }
            }
        }
        if let Some(i) = visited.iter().position(|seen| !seen) {
            return Err(StructuralError::DetachedVertex {
                vertex: vertices[i].name.clone(),
            });
        }

        // At most one entry pseudostate per region.
        for rid in 0..regions.len() {
            let mut entry = None;
            for &v in &regions[rid].children {
                if let VertexKind::Pseudo(kind) = &vertices[v.0].kind {
                    if kind.is_entry() {
                        if entry.is_some() {
                            return Err(StructuralError::MultipleEntryPseudostates {
                                region: regions[rid].qualified_name.clone(),
                            });
                        }
                        entry = Some(v);
                    }
                }
            }
            regions[rid].entry = entry;
        }

        let mut outgoing: Vec<Vec<TransitionId>> = vec![Vec::new(); vertices.len()];
        for (i, t) in transitions.iter().enumerate() {
            outgoing[t.source.0].push(TransitionId(i));
        }

        for t in transitions.iter() {
            let source = &vertices[t.source.0];
            if matches!(source.kind, VertexKind::Final) {
                return Err(StructuralError::TransitionFromFinal {
                    vertex: source.qualified_name.clone(),
                });
            }
            if t.kind == TransitionKind::Completion && t.guard.is_some() {
                return Err(StructuralError::GuardedCompletion {
                    vertex: source.qualified_name.clone(),
                });
            }
            if t.kind == TransitionKind::Internal && t.source != t.target {
                return Err(StructuralError::InternalNotSelf {
                    vertex: source.qualified_name.clone(),
                });
            }
        }

        // Pseudostate arities, and entry-transition targets confined to
        // the pseudostate's owning region subtree.
        for (vi, v) in vertices.iter().enumerate() {
            let VertexKind::Pseudo(kind) = &v.kind else {
                continue;
            };
            let out = &outgoing[vi];
            use crate::vertex::PseudostateKind::*;
            match kind {
                Initial | ShallowHistory | DeepHistory => {
                    let well_formed = out.len() == 1 && {
                        let t = &transitions[out[0].0];
                        t.kind == TransitionKind::Completion && t.guard.is_none()
                    };
                    if !well_formed {
                        return Err(StructuralError::BadEntryTransition {
                            vertex: v.qualified_name.clone(),
                        });
                    }
                }
                Choice | Junction => {
                    let has_else = out.iter().any(|id| transitions[id.0].guard.is_none());
                    if out.is_empty() || !has_else {
                        return Err(StructuralError::IncompleteChoice {
                            vertex: v.qualified_name.clone(),
                        });
                    }
                }
                Terminate => continue,
            }
            for id in out {
                let target = transitions[id.0].target;
                let in_scope = vertices[target.0]
                    .ancestors
                    .iter()
                    .any(|a| vertices[a.0].parent == v.parent);
                if !in_scope {
                    return Err(StructuralError::EscapingEntryTransition {
                        vertex: v.qualified_name.clone(),
                    });
                }
            }
        }

        // Transitions taken without a caller message (completion edges,
        // and every branch out of an entry or choice pseudostate) must be
        // acyclic so cascading and entry resolution terminate.
        let auto_source: Vec<bool> = vertices
            .iter()
            .map(|v| {
                matches!(&v.kind, VertexKind::Pseudo(kind) if *kind != PseudostateKind::Terminate)
            })
            .collect();
        let mut color = vec![0u8; vertices.len()];
        for v in 0..vertices.len() {
            if color[v] == 0 {
                if let Some(cycle) =
                    automatic_dfs(v, &transitions, &outgoing, &auto_source, &mut color)
                {
                    return Err(StructuralError::AutomaticCycle {
                        vertex: vertices[cycle].qualified_name.clone(),
                    });
                }
            }
        }

        let summary = StructuralSummary {
            name: &name,
            regions: regions
                .iter()
                .map(|r| (r.owner.map(|v| v.0), r.name.as_str()))
                .collect(),
            vertices: vertices
                .iter()
                .map(|v| (v.parent.0, v.name.as_str(), v.kind.tag()))
                .collect(),
            transitions: transitions
                .iter()
                .map(|t| (t.source.0, t.target.0, t.kind, t.guard.is_some()))
                .collect(),
        };
        let checksum = format!("{:08x}", crc32c::crc32c(&serde_json::to_vec(&summary)?));

        tracing::info!(
            "bootstrap complete: machine '{}', {} vertices, {} regions, {} transitions, checksum {}",
            name,
            vertices.len(),
            regions.len(),
            transitions.len(),
            checksum
        );

        Ok(Self {
            name,
            vertices,
            regions,
            transitions,
            roots,
            outgoing,
            checksum,
        })
    }

    /// Machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// crc32c checksum over the canonical structural shape of the graph.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Root regions in declaration order.
    pub fn root_regions(&self) -> &[RegionId] {
        &self.roots
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Qualified root-to-leaf name of a vertex.
    pub fn qualified_vertex_name(&self, id: VertexId) -> &str {
        &self.vertices[id.0].qualified_name
    }

    /// Qualified name of a region, the key used against the active
    /// configuration.
    pub fn qualified_region_name(&self, id: RegionId) -> &str {
        &self.regions[id.0].qualified_name
    }

    /// Looks up a vertex by qualified name.
    pub fn find_vertex(&self, qualified: &str) -> Option<VertexId> {
        self.vertices
            .iter()
            .position(|v| v.qualified_name == qualified)
            .map(VertexId)
    }

    pub(crate) fn vertex(&self, id: VertexId) -> &Vertex<M> {
        &self.vertices[id.0]
    }

    pub(crate) fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub(crate) fn transition(&self, id: TransitionId) -> &Transition<M> {
        &self.transitions[id.0]
    }

    pub(crate) fn outgoing(&self, id: VertexId) -> &[TransitionId] {
        &self.outgoing[id.0]
    }

    /// Resolves a stored child name back to a vertex of the region.
    pub(crate) fn child_by_name(&self, region: RegionId, name: &str) -> Option<VertexId> {
        self.regions[region.0]
            .children
            .iter()
            .copied()
            .find(|v| self.vertices[v.0].name == name)
    }
}

impl<M> fmt::Debug for StateMachine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("vertices", &self.vertices)
            .field("regions", &self.regions)
            .field("transitions", &self.transitions)
            .field("roots", &self.roots)
            .field("checksum", &self.checksum)
            .finish()
    }
}

/// Colors: 0 unvisited, 1 on the current path, 2 done. Follows every
/// edge the engine may take without a caller message: completion
/// transitions, and any outgoing branch of a non-terminate pseudostate.
/// Returns a vertex on a cycle, if any.
fn automatic_dfs<M>(
    v: usize,
    transitions: &[Transition<M>],
    outgoing: &[Vec<TransitionId>],
    auto_source: &[bool],
    color: &mut [u8],
) -> Option<usize> {
    color[v] = 1;
    for id in &outgoing[v] {
        let t = &transitions[id.0];
        if t.kind != TransitionKind::Completion && !auto_source[v] {
            continue;
        }
        match color[t.target.0] {
            0 => {
                if let Some(cycle) =
                    automatic_dfs(t.target.0, transitions, outgoing, auto_source, color)
                {
                    return Some(cycle);
                }
            }
            1 => return Some(t.target.0),
            _ => {}
        }
    }
    color[v] = 2;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateMachineBuilder;
    use crate::vertex::PseudostateKind;

    fn minimal() -> StateMachineBuilder<String> {
        let mut b = StateMachineBuilder::new("m");
        let root = b.root_region("root");
        let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
        let a = b.state(root, "a");
        b.to(init, a).completion();
        b
    }

    #[test]
    fn test_bootstrap_minimal() {
        let machine = minimal().build().unwrap();
        assert_eq!(machine.name(), "m");
        assert_eq!(machine.vertex_count(), 2);
        assert_eq!(machine.region_count(), 1);
        assert_eq!(machine.qualified_vertex_name(VertexId(1)), "root/a");
        assert_eq!(machine.find_vertex("root/a"), Some(VertexId(1)));
        assert_eq!(machine.find_vertex("root/zzz"), None);
    }

    #[test]
    fn test_qualified_names_nest_through_composites() {
        let mut b = minimal();
        let a = VertexId(1);
        let inner = b.region(a, "inner");
        let i2 = b.pseudostate(inner, "initial", PseudostateKind::Initial);
        let leaf = b.state(inner, "leaf");
        b.to(i2, leaf).completion();

        let machine = b.build().unwrap();
        assert_eq!(machine.qualified_region_name(inner), "root/a/inner");
        assert_eq!(machine.qualified_vertex_name(leaf), "root/a/inner/leaf");
    }

    #[test]
    fn test_two_entry_pseudostates_rejected() {
        let mut b = minimal();
        let root = RegionId(0);
        b.pseudostate(root, "history", PseudostateKind::DeepHistory);

        // The history pseudostate also lacks its entry transition, but
        // the region-level check fires first.
        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::MultipleEntryPseudostates { .. }
        ));
    }

    #[test]
    fn test_initial_needs_exactly_one_completion_edge() {
        let mut b = StateMachineBuilder::<String>::new("m");
        let root = b.root_region("root");
        let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
        let a = b.state(root, "a");
        let z = b.state(root, "z");
        b.to(init, a).completion();
        b.to(init, z).completion();

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::BadEntryTransition { .. }
        ));
    }

    #[test]
    fn test_guarded_completion_rejected() {
        let mut b = minimal();
        let a = VertexId(1);
        let z = b.state(RegionId(0), "z");
        b.to(a, z).completion().when(|_: &String| true);

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::GuardedCompletion { .. }
        ));
    }

    #[test]
    fn test_transition_from_final_rejected() {
        let mut b = minimal();
        let f = b.final_state(RegionId(0), "done");
        b.to(f, VertexId(1)).when(|_: &String| true);

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::TransitionFromFinal { .. }
        ));
    }

    #[test]
    fn test_internal_must_be_self_transition() {
        let mut b = minimal();
        let a = VertexId(1);
        let z = b.state(RegionId(0), "z");
        b.to(a, z).internal();

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::InternalNotSelf { .. }
        ));
    }

    #[test]
    fn test_completion_cycle_rejected() {
        let mut b = minimal();
        let a = VertexId(1);
        let z = b.state(RegionId(0), "z");
        b.to(a, z).completion();
        b.to(z, a).completion();

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::AutomaticCycle { .. }
        ));
    }

    #[test]
    fn test_choice_cycle_rejected() {
        let mut b = minimal();
        let a = VertexId(1);
        let c1 = b.pseudostate(RegionId(0), "c1", PseudostateKind::Choice);
        let c2 = b.pseudostate(RegionId(0), "c2", PseudostateKind::Choice);
        b.to(a, c1).when(|_: &String| true);
        // Else branches are taken without a message; a mutual pair would
        // spin entry resolution forever.
        b.to(c1, c2);
        b.to(c2, c1);

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::AutomaticCycle { .. }
        ));
    }

    #[test]
    fn test_acyclic_choice_chain_accepted() {
        let mut b = minimal();
        let a = VertexId(1);
        let c1 = b.pseudostate(RegionId(0), "c1", PseudostateKind::Choice);
        let c2 = b.pseudostate(RegionId(0), "c2", PseudostateKind::Choice);
        let z = b.state(RegionId(0), "z");
        b.to(a, c1).when(|_: &String| true);
        b.to(c1, c2);
        b.to(c2, z);

        assert!(b.build().is_ok());
    }

    #[test]
    fn test_choice_without_else_rejected() {
        let mut b = minimal();
        let choice = b.pseudostate(RegionId(0), "pick", PseudostateKind::Choice);
        let z = b.state(RegionId(0), "z");
        b.to(VertexId(1), choice).when(|_: &String| true);
        b.to(choice, z).when(|_: &String| true);

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::IncompleteChoice { .. }
        ));
    }

    #[test]
    fn test_entry_transition_must_stay_in_scope() {
        let mut b = minimal();
        let a = VertexId(1);
        let inner = b.region(a, "inner");
        let i2 = b.pseudostate(inner, "initial", PseudostateKind::Initial);
        let outside = b.state(RegionId(0), "outside");
        b.to(i2, outside).completion();

        assert!(matches!(
            b.build().unwrap_err(),
            StructuralError::EscapingEntryTransition { .. }
        ));
    }

    #[test]
    fn test_checksum_is_stable_and_structural() {
        let m1 = minimal().build().unwrap();
        let m2 = minimal().build().unwrap();
        assert_eq!(m1.checksum(), m2.checksum());

        let mut b = minimal();
        b.state(RegionId(0), "extra");
        let m3 = b.build().unwrap();
        assert_ne!(m1.checksum(), m3.checksum());
    }
}
