//! Execution contexts for the engine.
//!
//! - [`SerialExecutor`]: one dedicated thread that owns a context value and
//!   runs submitted work against it strictly in FIFO order. All state manager
//!   mutation happens here.
//! - [`BackgroundQueue`]: a small pool of workers for fire-and-forget work
//!   that must not hold up the serial executor (after-track callbacks).
//!
//! Executors are plain values. Each engine owns its own, so separate engines
//! never share an ordering domain.

mod background;
mod error;
mod periodic;
mod serial;

pub use background::BackgroundQueue;
pub use error::ExecutorError;
pub use periodic::PeriodicTask;
pub use serial::SerialExecutor;
