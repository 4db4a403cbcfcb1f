//! Transitions: directed, guarded edges between vertices.

use crate::vertex::VertexId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle into the transition arena of the machine that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionId(pub(crate) usize);

/// Guard predicate over an incoming message.
///
/// Guards must be pure with respect to the instance: no shared mutable
/// state should be captured unless cross-instance state is explicitly
/// intended. A panicking guard propagates to the caller unchanged.
pub type Guard<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

/// Transition effect, run after all exits and before any entries.
///
/// The message is absent for effects run during `initialise` or a
/// completion round.
pub type Effect<M> = Arc<dyn Fn(Option<&M>) + Send + Sync>;

/// The kind of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Exits up to the least common ancestor of source and target, then
    /// enters down to the target. A self-transition exits and re-enters
    /// its source.
    #[default]
    External,
    /// Stays inside the containing composite: neither the source (when
    /// the target nests inside it) nor the target (when the source nests
    /// inside it) is exited.
    Local,
    /// Runs the effect only; no state is exited or entered.
    Internal,
    /// Unguarded; taken automatically once its source is fully
    /// entered/completed, without an external message.
    Completion,
}

/// A directed edge between two vertices in the shared graph.
///
/// Transitions are owned by the machine's transition set; vertices hold
/// only an index of their outgoing edges.
pub struct Transition<M: 'static> {
    pub source: VertexId,
    pub target: VertexId,
    pub kind: TransitionKind,
    /// Guard predicate; `None` on completion transitions (always taken)
    /// and on pseudostate else-branches. An unguarded non-completion
    /// transition from a state is an authoring gap and is never
    /// evaluated against messages.
    pub guard: Option<Guard<M>>,
    pub effect: Option<Effect<M>>,
}

impl<M> Transition<M> {
    /// Whether the guard accepts the message. Unguarded transitions
    /// accept nothing here; completion transitions are not
    /// message-triggered.
    pub(crate) fn accepts(&self, message: &M) -> bool {
        match (&self.guard, self.kind) {
            (_, TransitionKind::Completion) => false,
            (Some(guard), _) => guard(message),
            (None, _) => false,
        }
    }
}

impl<M> fmt::Debug for Transition<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}
