//! Core state machine types.
//!
//! This module contains the building blocks the state manager is made of:
//! - The opaque `State` produced by machine transitions
//! - The `StateMachine` contract with its five schema-routed capabilities
//! - `StateFuture`, the lazy, memoizing node holding a machine's next state
//! - `TrackerState` and its immutable `TrackerStateSnapshot`
//!
//! Machine capabilities are pure: they read an event and a state and return
//! a contribution, without side effects (except `after_track`).

mod future;
mod machine;
mod state;
mod tracker_state;

pub use future::StateFuture;
pub use machine::{Capability, StateMachine, WILDCARD_SCHEMA};
pub use state::{AsAny, State};
pub use tracker_state::{TrackerState, TrackerStateSnapshot};
