//! Single-threaded FIFO executor owning a context value.

use super::error::ExecutorError;
use super::periodic::PeriodicTask;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error};

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

enum Command<C> {
    Run(Job<C>),
    RunAfter { due: Instant, job: Job<C> },
}

struct Deferred<C> {
    due: Instant,
    seq: u64,
    job: Job<C>,
}

// Min-heap on (due, seq): earliest first, submission order among equals.
impl<C> Ord for Deferred<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl<C> PartialOrd for Deferred<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> PartialEq for Deferred<C> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<C> Eq for Deferred<C> {}

struct Inner<C> {
    sender: Sender<Command<C>>,
    thread_id: ThreadId,
    name: String,
}

impl<C> Inner<C> {
    fn send(&self, command: Command<C>) -> Result<(), ExecutorError> {
        self.sender
            .send(command)
            .map_err(|_| ExecutorError::Terminated)
    }
}

/// A dedicated thread running work against an exclusively owned context.
///
/// Work runs one item at a time in submission order, so the context needs no
/// locking. The handle is cheap to clone; the thread stops once every handle
/// is dropped, discarding deferred work that has not come due.
///
/// # Example
///
/// ```rust
/// use contextflow::executor::SerialExecutor;
///
/// let executor = SerialExecutor::spawn("counter", 0u32).unwrap();
/// executor.run_async(|count| *count += 1).unwrap();
/// executor.run_async(|count| *count += 1).unwrap();
///
/// assert_eq!(executor.run_and_wait(|count| *count).unwrap(), 2);
/// ```
pub struct SerialExecutor<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for SerialExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + 'static> SerialExecutor<C> {
    /// Start the executor thread, moving `context` onto it.
    pub fn spawn(name: impl Into<String>, context: C) -> Result<Self, ExecutorError> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(receiver, context))?;

        debug!(executor = %name, "serial executor started");
        Ok(Self {
            inner: Arc::new(Inner {
                sender,
                thread_id: handle.thread().id(),
                name,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the calling thread is this executor's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Enqueue `work` behind everything already submitted.
    pub fn run_async<F>(&self, work: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.inner.send(Command::Run(Box::new(work)))
    }

    /// Run `work` and block until it has finished, returning its result.
    ///
    /// A panic inside `work` is contained on the executor thread and reported
    /// as [`ExecutorError::Panicked`]; the executor keeps serving later work.
    ///
    /// # Panics
    ///
    /// Panics when called from work already running on this executor. The
    /// executor is not reentrant and waiting on itself would never return.
    pub fn run_and_wait<F, R>(&self, work: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut C) -> R + Send + 'static,
        R: Send + 'static,
    {
        assert!(
            !self.is_current(),
            "run_and_wait called from within executor '{}'",
            self.inner.name
        );

        let (reply, result) = mpsc::channel();
        self.run_async(move |context| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(context)));
            let _ = reply.send(outcome.ok());
        })?;
        match result.recv() {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(ExecutorError::Panicked),
            Err(_) => Err(ExecutorError::Terminated),
        }
    }

    /// Run `work` once `delay` has elapsed.
    pub fn run_after<F>(&self, delay: Duration, work: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.inner.send(Command::RunAfter {
            due: Instant::now() + delay,
            job: Box::new(work),
        })
    }

    /// Run `work` every `interval` until the returned task is cancelled.
    ///
    /// Each firing schedules the next one before invoking `work`, and a
    /// firing does nothing once the task is cancelled. Cancelling from inside
    /// `work` therefore also suppresses the next firing.
    pub fn run_periodically<F>(&self, interval: Duration, work: F) -> Result<PeriodicTask, ExecutorError>
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        let task = PeriodicTask::new();
        arm(
            &self.inner,
            Arc::downgrade(&self.inner),
            interval,
            task.flag(),
            Arc::new(Mutex::new(work)),
        )?;
        Ok(task)
    }
}

fn arm<C, F>(
    inner: &Inner<C>,
    weak: Weak<Inner<C>>,
    interval: Duration,
    active: Arc<AtomicBool>,
    work: Arc<Mutex<F>>,
) -> Result<(), ExecutorError>
where
    C: Send + 'static,
    F: FnMut(&mut C) + Send + 'static,
{
    inner.send(Command::RunAfter {
        due: Instant::now() + interval,
        job: Box::new(move |context: &mut C| {
            if !active.load(AtomicOrdering::SeqCst) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let _ = arm(&inner, Weak::clone(&weak), interval, Arc::clone(&active), Arc::clone(&work));
            }
            let mut work = work.lock().unwrap_or_else(PoisonError::into_inner);
            (*work)(context);
        }),
    })
}

fn run_loop<C>(receiver: Receiver<Command<C>>, mut context: C) {
    let mut deferred: BinaryHeap<Deferred<C>> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        while deferred.peek().is_some_and(|next| next.due <= Instant::now()) {
            if let Some(next) = deferred.pop() {
                run_job(next.job, &mut context);
            }
        }

        let command = match deferred.peek() {
            Some(next) => {
                match receiver.recv_timeout(next.due.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Run(job) => run_job(job, &mut context),
            Command::RunAfter { due, job } => {
                seq += 1;
                deferred.push(Deferred { due, seq, job });
            }
        }
    }

    debug!(pending = deferred.len(), "serial executor stopped");
}

// A panicking job must not take the context's thread down with it.
fn run_job<C>(job: Job<C>, context: &mut C) {
    if panic::catch_unwind(AssertUnwindSafe(|| job(context))).is_err() {
        let thread = thread::current();
        error!(executor = thread.name().unwrap_or("unnamed"), "executor job panicked");
    }
}
