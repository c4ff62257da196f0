//! Contextflow: schema-routed state machines for analytics event enrichment
//!
//! Contextflow sits between the code that tracks events and the code that
//! sends them. Registered state machines watch the event stream, keep their
//! own state, and decorate each event with context entities and payload
//! values, or filter it out entirely.
//!
//! # Core Concepts
//!
//! - **State Machine**: five independent capabilities (transition, entities,
//!   payload update, after-track, filter), each routed by event schema
//! - **State**: opaque per-machine value produced by transitions
//! - **Tracker State**: the states of all machines, snapshotted onto every
//!   event so later stages read the state as of that event
//! - **Engine**: runs the pipeline for each event on one serial executor
//!
//! # Example
//!
//! ```rust
//! use contextflow::{Engine, EngineConfig};
//! use contextflow::event::{DeepLinkReceived, ScreenView, SelfDescribing};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.track(DeepLinkReceived::new("https://example.com/sale").into_event()).unwrap();
//!
//! let event = engine.track(ScreenView::new("home").into_event()).unwrap().unwrap();
//! assert!(event
//!     .entities()
//!     .iter()
//!     .any(|e| e.data["url"] == "https://example.com/sale"));
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod event;
pub mod executor;
pub mod machines;
pub mod manager;

// Re-export commonly used types
pub use config::EngineConfig;
pub use core::{State, StateMachine};
pub use engine::{Engine, EngineError};
pub use event::{Event, Payload, SelfDescribingJson};
pub use machines::PluginStateMachine;
