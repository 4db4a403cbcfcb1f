//! Structural error types.

use thiserror::Error;

/// Errors raised while bootstrapping a state machine graph.
///
/// Every variant describes a structural authoring fault. They are raised
/// by [`StateMachineBuilder::build`](crate::builder::StateMachineBuilder::build)
/// only; a bootstrapped machine never raises errors during evaluation.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("'{vertex}' is not a composite state and cannot own a region")]
    NotComposite { vertex: String },

    #[error("region '{region}' has more than one entry pseudostate")]
    MultipleEntryPseudostates { region: String },

    #[error("transition #{index} has a dangling endpoint")]
    DanglingEndpoint { index: usize },

    #[error("vertex '{vertex}' is not reachable from any root region")]
    DetachedVertex { vertex: String },

    #[error("pseudostate '{vertex}' must have exactly one unguarded outgoing completion transition")]
    BadEntryTransition { vertex: String },

    #[error("pseudostate '{vertex}' needs at least one outgoing transition and an unguarded else branch")]
    IncompleteChoice { vertex: String },

    #[error("final state '{vertex}' cannot have outgoing transitions")]
    TransitionFromFinal { vertex: String },

    #[error("completion transition from '{vertex}' cannot carry a guard")]
    GuardedCompletion { vertex: String },

    #[error("internal transition on '{vertex}' must be a self-transition")]
    InternalNotSelf { vertex: String },

    #[error("automatic transitions form a cycle through '{vertex}'")]
    AutomaticCycle { vertex: String },

    #[error("entry transition from '{vertex}' targets a vertex outside its owning region")]
    EscapingEntryTransition { vertex: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
