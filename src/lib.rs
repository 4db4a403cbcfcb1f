//! # orthostate
//!
//! Hierarchical finite-state-machine engine: statechart-style machines
//! with composite states, orthogonal regions, pseudostates (initial,
//! history, choice, terminate) and guarded transitions, evaluated
//! against externally owned per-instance state.
//!
//! - **Machine as shared definition**: a [`StateMachine`] is an
//!   immutable graph built once via [`StateMachineBuilder`] and shared
//!   across any number of instances.
//! - **State lives outside the engine**: each instance's active
//!   configuration sits behind the [`ActiveConfiguration`] contract
//!   ([`InMemoryConfiguration`] is the default), keyed by qualified
//!   region names so it can be persisted and restored.
//! - **Deterministic evaluation**: one message in, at most one
//!   transition per region out; deeper sources override ancestors and
//!   declaration order breaks ties.
//! - **Bootstrap validation**: structural defects ([`StructuralError`])
//!   are rejected when the builder is consumed, never at runtime.
//!
//! ```
//! use orthostate::{InMemoryConfiguration, PseudostateKind, StateMachineBuilder};
//!
//! let mut b = StateMachineBuilder::<String>::new("door");
//! let root = b.root_region("root");
//! let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
//! let closed = b.state(root, "closed");
//! let open = b.state(root, "open");
//! b.to(init, closed).completion();
//! b.to(closed, open).when(|m: &String| m == "open");
//! b.to(open, closed).when(|m: &String| m == "close");
//! let machine = b.build().unwrap();
//!
//! let mut instance = InMemoryConfiguration::new();
//! machine.initialise(&mut instance);
//! assert!(machine.evaluate(&mut instance, &"open".to_string()));
//! ```

pub mod builder;
pub mod config;
mod engine;
pub mod error;
pub mod machine;
pub mod region;
pub mod transition;
pub mod vertex;

pub use builder::{EdgeBuilder, StateMachineBuilder};
pub use config::{ActiveConfiguration, InMemoryConfiguration};
pub use error::StructuralError;
pub use machine::StateMachine;
pub use region::{Region, RegionId};
pub use transition::{Effect, Guard, Transition, TransitionId, TransitionKind};
pub use vertex::{Hook, PseudostateKind, Vertex, VertexId, VertexKind};
