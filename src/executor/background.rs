//! Worker pool for fire-and-forget work off the serial executor.

use super::error::ExecutorError;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send>;

/// A fixed set of worker threads pulling tasks from a shared queue.
///
/// Tasks run concurrently with each other and in no particular order. A
/// panicking task is logged and does not take its worker down.
#[derive(Clone)]
pub struct BackgroundQueue {
    sender: Sender<Task>,
}

impl BackgroundQueue {
    /// Start `workers` threads (at least one) named `{name}-{n}`.
    pub fn spawn(name: &str, workers: usize) -> Result<Self, ExecutorError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();

        for n in 0..workers.max(1) {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("{name}-{n}"))
                .spawn(move || work_loop(receiver))?;
        }

        debug!(queue = name, workers = workers.max(1), "background queue started");
        Ok(Self { sender })
    }

    /// Hand `task` to the next free worker.
    pub fn dispatch<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Box::new(task))
            .map_err(|_| ExecutorError::Terminated)
    }
}

fn work_loop(receiver: Receiver<Task>) {
    // Ends once every queue handle is dropped and the backlog is drained.
    for task in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("background task panicked");
        }
    }
}
