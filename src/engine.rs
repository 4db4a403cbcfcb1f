//! Evaluation engine: transition selection and the exit/effect/entry
//! cascade.
//!
//! Given an instance's active configuration and a message, the engine
//! walks the configuration from the deepest active vertex in each region
//! upward, selects at most one transition per region (deeper sources
//! override ancestors; declaration order breaks ties), then executes the
//! exit -> effect -> entry cascade bounded by the least common ancestor
//! of source and target. Entry resolves pseudostates (initial, history,
//! choice) and activates every region of each composite it passes
//! through. After the configuration settles, unguarded completion
//! transitions cascade until none apply.

use crate::config::ActiveConfiguration;
use crate::machine::StateMachine;
use crate::region::RegionId;
use crate::transition::{TransitionId, TransitionKind};
use crate::vertex::{PseudostateKind, VertexId, VertexKind};

/// How far history applies while entering a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum HistoryMode {
    None,
    Shallow,
    Deep,
}

impl HistoryMode {
    fn of_entry(kind: PseudostateKind) -> Self {
        match kind {
            PseudostateKind::ShallowHistory => HistoryMode::Shallow,
            PseudostateKind::DeepHistory => HistoryMode::Deep,
            _ => HistoryMode::None,
        }
    }

    /// Mode propagated into child regions: only deep history recurses.
    fn child(self) -> Self {
        match self {
            HistoryMode::Deep => HistoryMode::Deep,
            _ => HistoryMode::None,
        }
    }
}

impl<M> StateMachine<M> {
    /// Populates an empty instance: descends from every root region
    /// through initial/default entry until each reachable region has a
    /// current vertex, invoking entry hooks root-to-leaf, then runs any
    /// enabled completion transitions.
    ///
    /// Call once per instance before the first [`evaluate`](Self::evaluate).
    /// Calling it again re-enters the default configuration.
    pub fn initialise(&self, instance: &mut dyn ActiveConfiguration) {
        tracing::debug!("initialise machine '{}'", self.name());
        let mut cascade = Cascade {
            machine: self,
            instance,
            message: None,
        };
        for &root in self.root_regions() {
            cascade.enter_region(root, HistoryMode::None);
        }
        cascade.sweep_completions();
    }

    /// Evaluates a single message against the instance's current
    /// configuration. Returns whether any transition fired.
    ///
    /// A transition sourced from a deeper vertex takes priority over one
    /// sourced from an ancestor; among enabled transitions from the same
    /// source, the first in declaration order fires (deterministic
    /// tie-break for ambiguous models). At most one transition fires per
    /// region per call, before completion cascading.
    ///
    /// Returns `false`, leaving the configuration untouched, when the
    /// instance is terminated or no guard accepts the message. A panic
    /// from a guard or hook propagates unchanged and leaves the
    /// configuration wherever the cascade reached.
    pub fn evaluate(&self, instance: &mut dyn ActiveConfiguration, message: &M) -> bool {
        if instance.is_terminated() {
            return false;
        }
        let mut cascade = Cascade {
            machine: self,
            instance,
            message: Some(message),
        };
        let mut handled = false;
        for &root in self.root_regions() {
            if let Some(current) = cascade.current_child(root) {
                if cascade.eval_vertex(current) {
                    handled = true;
                }
            }
        }
        if handled {
            cascade.sweep_completions();
        }
        handled
    }
}

/// One exit/effect/entry pass over a single instance.
struct Cascade<'a, M: 'static> {
    machine: &'a StateMachine<M>,
    instance: &'a mut dyn ActiveConfiguration,
    message: Option<&'a M>,
}

impl<'a, M> Cascade<'a, M> {
    // ---------------------------------------------------------------------
    // Candidate discovery and priority
    // ---------------------------------------------------------------------

    /// Deepest-first evaluation: active children override their
    /// ancestors' reaction to the same message.
    fn eval_vertex(&mut self, v: VertexId) -> bool {
        let machine = self.machine;
        let mut handled = false;
        if let VertexKind::State { regions, .. } = &machine.vertex(v).kind {
            for &region in regions {
                if let Some(child) = self.current_child(region) {
                    if self.eval_vertex(child) {
                        handled = true;
                    }
                }
            }
        }
        if !handled {
            handled = self.fire_enabled(v);
        }
        handled
    }

    /// Fires the first outgoing transition, in declaration order, whose
    /// guard accepts the message.
    fn fire_enabled(&mut self, v: VertexId) -> bool {
        let Some(message) = self.message else {
            return false;
        };
        let machine = self.machine;
        let enabled = machine
            .outgoing(v)
            .iter()
            .copied()
            .find(|&id| machine.transition(id).accepts(message));
        match enabled {
            Some(id) => {
                self.fire(id);
                true
            }
            None => false,
        }
    }

    fn fire(&mut self, id: TransitionId) {
        let machine = self.machine;
        let t = machine.transition(id);
        tracing::debug!(
            "transition '{}' -> '{}' ({:?})",
            machine.qualified_vertex_name(t.source),
            machine.qualified_vertex_name(t.target),
            t.kind
        );
        match t.kind {
            TransitionKind::Internal => self.run_effect(id),
            TransitionKind::Local => self.traverse_local(id),
            TransitionKind::External | TransitionKind::Completion => self.traverse_external(id),
        }
    }

    // ---------------------------------------------------------------------
    // Exit / effect / entry cascade
    // ---------------------------------------------------------------------

    fn traverse_external(&mut self, id: TransitionId) {
        let machine = self.machine;
        let t = machine.transition(id);
        let spath = &machine.vertex(t.source).ancestors;
        let tpath = &machine.vertex(t.target).ancestors;

        let shared = spath
            .iter()
            .zip(tpath.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut divergence = shared;
        if divergence == spath.len() || divergence == tpath.len() {
            // Source and target lie on one containment line; the
            // shallower endpoint is itself exited and re-entered.
            divergence = divergence.saturating_sub(1);
        }

        self.exit_domain(spath[divergence]);
        self.run_effect(id);
        let chain: Vec<VertexId> = tpath[divergence..].to_vec();
        self.enter_chain(&chain, HistoryMode::None);
    }

    fn traverse_local(&mut self, id: TransitionId) {
        let machine = self.machine;
        let t = machine.transition(id);
        let spath = &machine.vertex(t.source).ancestors;
        let tpath = &machine.vertex(t.target).ancestors;

        if tpath.len() > spath.len() && tpath[..spath.len()] == spath[..] {
            // Target nests inside source: swap the active child of the
            // region on the target's path without exiting the source.
            let entry = &tpath[spath.len()..];
            let region = machine.vertex(entry[0]).parent;
            self.exit_region(region);
            self.run_effect(id);
            let chain = entry.to_vec();
            self.enter_chain(&chain, HistoryMode::None);
        } else if spath.len() > tpath.len() && spath[..tpath.len()] == tpath[..] {
            // Source nests inside target: exit up to (not including) the
            // target, then re-resolve that region's default entry.
            let region = machine.vertex(spath[tpath.len()]).parent;
            self.exit_region(region);
            self.run_effect(id);
            self.enter_region(region, HistoryMode::None);
        } else {
            // Neither endpoint contains the other; UML leaves this
            // combination undefined, treat as external.
            self.traverse_external(id);
        }
    }

    fn run_effect(&mut self, id: TransitionId) {
        if let Some(effect) = &self.machine.transition(id).effect {
            effect(self.message);
        }
    }

    /// Exits a vertex and clears its slot in the owning region.
    fn exit_domain(&mut self, v: VertexId) {
        let machine = self.machine;
        self.exit_vertex(v);
        let region = machine.vertex(v).parent;
        self.instance
            .clear_current(machine.region(region).qualified_name());
    }

    /// Exits whatever is active in a region, leaving the history slot.
    fn exit_region(&mut self, region: RegionId) {
        let machine = self.machine;
        if let Some(child) = self.current_child(region) {
            self.exit_vertex(child);
            self.instance
                .clear_current(machine.region(region).qualified_name());
        }
    }

    /// Leaf-to-root exit: descendants first, then this vertex's exit
    /// hook. Cleared regions keep their history slot, which is the
    /// sub-configuration a future history entry restores.
    fn exit_vertex(&mut self, v: VertexId) {
        let machine = self.machine;
        if let VertexKind::State {
            regions, on_exit, ..
        } = &machine.vertex(v).kind
        {
            for &region in regions {
                self.exit_region(region);
            }
            tracing::trace!("exit '{}'", machine.vertex(v).qualified_name());
            if let Some(hook) = on_exit {
                hook(self.message);
            }
        }
    }

    fn enter_chain(&mut self, chain: &[VertexId], mode: HistoryMode) {
        if let Some((&head, tail)) = chain.split_first() {
            self.enter_vertex(head, tail, mode);
        }
    }

    /// Root-to-leaf entry along a definitional path. Every region of a
    /// composite on the path is activated: the one containing the next
    /// path element continues down the path, the others resolve their
    /// own initial/history/default vertex.
    fn enter_vertex(&mut self, v: VertexId, rest: &[VertexId], mode: HistoryMode) {
        let machine = self.machine;
        match &machine.vertex(v).kind {
            VertexKind::State {
                regions, on_entry, ..
            } => {
                self.set_current(v);
                tracing::trace!("enter '{}'", machine.vertex(v).qualified_name());
                if let Some(hook) = on_entry {
                    hook(self.message);
                }
                if let Some((&next, tail)) = rest.split_first() {
                    let next_region = machine.vertex(next).parent;
                    for &region in regions {
                        if region == next_region {
                            self.enter_vertex(next, tail, mode.child());
                        } else {
                            self.enter_region(region, mode.child());
                        }
                    }
                } else {
                    for &region in regions {
                        self.enter_region(region, mode.child());
                    }
                }
            }
            VertexKind::Final => {
                self.set_current(v);
                tracing::trace!("final '{}'", machine.vertex(v).qualified_name());
            }
            VertexKind::Pseudo(kind) => self.resolve_pseudostate(v, *kind),
        }
    }

    /// Activates a region: restore history when it applies, otherwise
    /// resolve the entry pseudostate, otherwise enter the first declared
    /// child.
    fn enter_region(&mut self, region: RegionId, mode: HistoryMode) {
        let machine = self.machine;
        let r = machine.region(region);
        let default_mode = r
            .entry
            .map(|p| match &machine.vertex(p).kind {
                VertexKind::Pseudo(kind) => HistoryMode::of_entry(*kind),
                _ => HistoryMode::None,
            })
            .unwrap_or(HistoryMode::None);
        let effective = mode.max(default_mode);

        if effective != HistoryMode::None {
            if let Some(remembered) = self.history_child(region) {
                self.enter_vertex(remembered, &[], effective.child());
                return;
            }
        }
        match r.entry {
            Some(p) => {
                if let VertexKind::Pseudo(kind) = &machine.vertex(p).kind {
                    self.resolve_pseudostate(p, *kind);
                }
            }
            None => {
                if let Some(&first) = r.children.first() {
                    self.enter_vertex(first, &[], HistoryMode::None);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Pseudostate resolution
    // ---------------------------------------------------------------------

    fn resolve_pseudostate(&mut self, p: VertexId, kind: PseudostateKind) {
        let machine = self.machine;
        match kind {
            PseudostateKind::Terminate => {
                tracing::debug!(
                    "terminate '{}' reached; instance frozen",
                    machine.vertex(p).qualified_name()
                );
                self.instance.set_terminated();
            }
            PseudostateKind::Initial => self.take_entry_edge(p),
            PseudostateKind::ShallowHistory | PseudostateKind::DeepHistory => {
                let region = machine.vertex(p).parent;
                match self.history_child(region) {
                    Some(remembered) => {
                        let mode = HistoryMode::of_entry(kind);
                        self.enter_vertex(remembered, &[], mode.child());
                    }
                    // Never recorded: fall back to the default target.
                    None => self.take_entry_edge(p),
                }
            }
            PseudostateKind::Choice | PseudostateKind::Junction => {
                let out = machine.outgoing(p);
                let chosen = self
                    .message
                    .and_then(|m| {
                        out.iter().copied().find(|&id| {
                            machine
                                .transition(id)
                                .guard
                                .as_ref()
                                .map(|g| g(m))
                                .unwrap_or(false)
                        })
                    })
                    .or_else(|| {
                        // Unguarded branches are the else arm.
                        out.iter()
                            .copied()
                            .find(|&id| machine.transition(id).guard.is_none())
                    });
                if let Some(id) = chosen {
                    self.run_effect(id);
                    self.enter_scoped(p, machine.transition(id).target);
                }
            }
        }
    }

    /// Takes the single validated outgoing completion transition of an
    /// initial/history pseudostate.
    fn take_entry_edge(&mut self, p: VertexId) {
        let machine = self.machine;
        if let Some(&id) = machine.outgoing(p).first() {
            self.run_effect(id);
            self.enter_scoped(p, machine.transition(id).target);
        }
    }

    /// Enters `target` along the path below the pseudostate's owning
    /// region. Bootstrap guarantees the path passes through that region.
    fn enter_scoped(&mut self, p: VertexId, target: VertexId) {
        let machine = self.machine;
        let scope = machine.vertex(p).parent;
        let path = &machine.vertex(target).ancestors;
        if let Some(start) = path
            .iter()
            .position(|&a| machine.vertex(a).parent == scope)
        {
            let chain: Vec<VertexId> = path[start..].to_vec();
            self.enter_chain(&chain, HistoryMode::None);
        }
    }

    // ---------------------------------------------------------------------
    // Completion cascading
    // ---------------------------------------------------------------------

    /// Fires enabled completion transitions until none apply, bounded as
    /// a backstop behind the bootstrap cycle check, then freezes the
    /// instance if every root region rests in a final state.
    fn sweep_completions(&mut self) {
        let budget = self.machine.transition_count() + 1;
        let mut rounds = 0;
        while !self.instance.is_terminated() {
            let Some(id) = self.enabled_completion() else {
                break;
            };
            if rounds >= budget {
                tracing::warn!("completion cascade exceeded {} rounds; stopping", budget);
                return;
            }
            rounds += 1;
            self.fire(id);
        }
        if !self.instance.is_terminated() && self.roots_complete() {
            tracing::debug!("all root regions complete; instance frozen");
            self.instance.set_terminated();
        }
    }

    fn enabled_completion(&mut self) -> Option<TransitionId> {
        let machine = self.machine;
        for &root in machine.root_regions() {
            if let Some(child) = self.current_child(root) {
                if let Some(id) = self.completion_below(child) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Deepest completed state wins, mirroring message priority.
    fn completion_below(&mut self, v: VertexId) -> Option<TransitionId> {
        let machine = self.machine;
        if let VertexKind::State { regions, .. } = &machine.vertex(v).kind {
            for &region in regions {
                if let Some(child) = self.current_child(region) {
                    if let Some(id) = self.completion_below(child) {
                        return Some(id);
                    }
                }
            }
            if self.vertex_complete(v) {
                return machine
                    .outgoing(v)
                    .iter()
                    .copied()
                    .find(|&id| machine.transition(id).kind == TransitionKind::Completion);
            }
        }
        None
    }

    /// A simple state is complete once entered; a composite is complete
    /// when every region rests in a final state.
    fn vertex_complete(&self, v: VertexId) -> bool {
        let machine = self.machine;
        match &machine.vertex(v).kind {
            VertexKind::State { regions, .. } => regions.iter().all(|&region| {
                self.current_child(region)
                    .map(|c| matches!(machine.vertex(c).kind, VertexKind::Final))
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }

    fn roots_complete(&self) -> bool {
        let machine = self.machine;
        machine.root_regions().iter().all(|&region| {
            self.current_child(region)
                .map(|c| matches!(machine.vertex(c).kind, VertexKind::Final))
                .unwrap_or(false)
        })
    }

    // ---------------------------------------------------------------------
    // Configuration access
    // ---------------------------------------------------------------------

    fn set_current(&mut self, v: VertexId) {
        let machine = self.machine;
        let region = machine.vertex(v).parent;
        self.instance.set_current(
            machine.region(region).qualified_name(),
            &machine.vertex(v).name,
        );
    }

    fn current_child(&self, region: RegionId) -> Option<VertexId> {
        let machine = self.machine;
        let name = self
            .instance
            .current(machine.region(region).qualified_name())?;
        let found = machine.child_by_name(region, &name);
        if found.is_none() {
            tracing::warn!(
                "configuration names unknown vertex '{}' in region '{}'",
                name,
                machine.region(region).qualified_name()
            );
        }
        found
    }

    fn history_child(&self, region: RegionId) -> Option<VertexId> {
        let machine = self.machine;
        let name = self
            .instance
            .history(machine.region(region).qualified_name())?;
        machine.child_by_name(region, &name)
    }
}
