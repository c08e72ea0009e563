//! Bounded-concurrency, order-preserving map over a sequence.
//!
//! Work is executed by OS threads pulling from a shared queue. A call either
//! spins up an ephemeral pool sized `min(threads, items)` and tears it down
//! before returning, or submits into a [`SharedPool`] that outlives the call.
//!
//! Every dispatched task runs to completion unless its shared pool is
//! disabled first, which discards queued tasks. Failures (including panics)
//! are collected per index and, once all tasks have finished, the
//! lowest-index failure is returned together with a backtrace of the caller.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ConfigurationError, ParallelError};

/// Worker count of an ephemeral pool when none is given.
pub const DEFAULT_THREADS: usize = 16;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// A set of worker threads draining one queue.
struct Workers {
    inbox: Sender<Message>,
    queue: Receiver<Message>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    fn spawn(size: usize, label: &str) -> Result<Self, ConfigurationError> {
        let (inbox, queue) = crossbeam_channel::unbounded::<Message>();
        let mut workers = Self {
            inbox,
            queue,
            handles: Vec::with_capacity(size),
        };

        for id in 0..size {
            let queue = workers.queue.clone();
            let spawned = thread::Builder::new()
                .name(format!("{label}-{id}"))
                .spawn(move || work_loop(id, queue));
            match spawned {
                Ok(handle) => workers.handles.push(handle),
                Err(err) => {
                    workers.stop();
                    return Err(ConfigurationError::Spawn(err.to_string()));
                }
            }
        }

        debug!(size, label, "worker pool started");
        Ok(workers)
    }

    fn size(&self) -> usize {
        self.handles.len()
    }

    /// Discard queued work, then send one stop message per worker and wait
    /// for all of them to exit.
    ///
    /// A discarded job drops its result sender, so the run waiting on it
    /// fails with [`ConfigurationError::PoolShutDown`]. Jobs already running
    /// finish first.
    fn stop(mut self) {
        let mut discarded = self.queue.try_iter().count();
        for _ in &self.handles {
            let _ = self.inbox.send(Message::Stop);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread exited abnormally");
            }
        }
        // Work submitted while the workers were retiring.
        discarded += self.queue.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "cleared pending work");
        }
    }
}

impl fmt::Debug for Workers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workers")
            .field("size", &self.size())
            .field("queued", &self.queue.len())
            .finish()
    }
}

fn work_loop(id: usize, queue: Receiver<Message>) {
    debug!(worker = id, "worker idle");
    while let Ok(message) = queue.recv() {
        match message {
            Message::Run(job) => job(),
            Message::Stop => break,
        }
    }
    debug!(worker = id, "worker stopped");
}

/// A process-scoped worker pool with an explicit lifecycle.
///
/// Concurrent runs against the same enabled pool interleave their tasks on
/// the same workers, bounding total concurrency.
///
/// # Example
///
/// ```rust
/// use scatter_core::{Parallel, SharedPool};
///
/// let pool = SharedPool::new();
/// pool.enable(4).unwrap();
///
/// let doubled = Parallel::new()
///     .pool(&pool)
///     .run(vec![1, 2, 3], |n, _| Ok::<_, std::io::Error>(n * 2))
///     .unwrap();
/// assert_eq!(doubled, vec![2, 4, 6]);
///
/// pool.disable().unwrap();
/// ```
#[derive(Default)]
pub struct SharedPool {
    workers: Mutex<Option<Workers>>,
}

impl SharedPool {
    /// Create a disabled pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `size` workers.
    pub fn enable(&self, size: usize) -> Result<(), ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::ZeroThreads);
        }
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return Err(ConfigurationError::AlreadyEnabled);
        }
        *workers = Some(Workers::spawn(size, "scatter-shared")?);
        Ok(())
    }

    /// Clear the queue and stop every worker, blocking until running jobs
    /// have finished.
    pub fn disable(&self) -> Result<(), ConfigurationError> {
        let workers = self
            .workers
            .lock()
            .take()
            .ok_or(ConfigurationError::NotEnabled)?;
        workers.stop();
        debug!("shared worker pool disabled");
        Ok(())
    }

    /// Whether the pool currently has workers.
    pub fn is_enabled(&self) -> bool {
        self.workers.lock().is_some()
    }

    /// Number of workers, if enabled.
    pub fn size(&self) -> Option<usize> {
        self.workers.lock().as_ref().map(Workers::size)
    }

    fn inbox(&self) -> Result<Sender<Message>, ConfigurationError> {
        self.workers
            .lock()
            .as_ref()
            .map(|workers| workers.inbox.clone())
            .ok_or(ConfigurationError::NotEnabled)
    }
}

impl fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPool")
            .field("size", &self.size())
            .finish()
    }
}

impl Drop for SharedPool {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            workers.stop();
        }
    }
}

enum Mode<'p> {
    Ephemeral(usize),
    Shared(&'p SharedPool),
}

type Outcome<R, E> = Result<Result<R, E>, String>;

/// Configures and runs one parallel map.
///
/// Without a pool (or with `shared(false)`), each call uses an ephemeral pool.
/// With an enabled pool attached, calls use it unless told otherwise; giving
/// `threads` in that mode is a configuration error.
#[derive(Debug, Clone, Copy)]
pub struct Parallel<'p> {
    threads: Option<usize>,
    pool: Option<&'p SharedPool>,
    shared: Option<bool>,
    expand_backtrace: bool,
}

impl Default for Parallel<'_> {
    fn default() -> Self {
        Self {
            threads: None,
            pool: None,
            shared: None,
            expand_backtrace: true,
        }
    }
}

impl<'p> Parallel<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker count of the ephemeral pool.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Attach a shared pool.
    pub fn pool(mut self, pool: &'p SharedPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Force shared or ephemeral mode. Defaults to shared if the attached pool
    /// is enabled.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Attach a backtrace of the caller to task failures (default `true`).
    pub fn expand_backtrace(mut self, expand: bool) -> Self {
        self.expand_backtrace = expand;
        self
    }

    fn mode(&self) -> Result<Mode<'p>, ConfigurationError> {
        let shared = self
            .shared
            .unwrap_or_else(|| self.pool.is_some_and(SharedPool::is_enabled));

        if shared {
            if self.threads.is_some() {
                return Err(ConfigurationError::ThreadsWithSharedPool);
            }
            let pool = self.pool.ok_or(ConfigurationError::NotEnabled)?;
            return Ok(Mode::Shared(pool));
        }

        match self.threads.unwrap_or(DEFAULT_THREADS) {
            0 => Err(ConfigurationError::ZeroThreads),
            threads => Ok(Mode::Ephemeral(threads)),
        }
    }

    fn context(&self) -> Backtrace {
        if self.expand_backtrace {
            Backtrace::force_capture()
        } else {
            Backtrace::disabled()
        }
    }

    /// Apply `work(item, index)` to every item, returning results in input order.
    pub fn run<I, T, R, E, F>(&self, items: I, work: F) -> Result<Vec<R>, ParallelError<E>>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T, usize) -> Result<R, E> + Send + Sync + 'static,
    {
        let items: Vec<T> = items.into_iter().collect();
        let count = items.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let (ephemeral, inbox) = match self.mode()? {
            Mode::Shared(pool) => (None, pool.inbox()?),
            Mode::Ephemeral(threads) => {
                let workers = Workers::spawn(threads.min(count), "scatter-worker")?;
                let inbox = workers.inbox.clone();
                (Some(workers), inbox)
            }
        };

        let slots = dispatch(items, work, &inbox);
        drop(inbox);
        if let Some(workers) = ephemeral {
            workers.stop();
        }

        let mut values = Vec::with_capacity(count);
        for (index, slot) in slots?.into_iter().enumerate() {
            match slot {
                Some(Ok(Ok(value))) => values.push(value),
                Some(Ok(Err(error))) => {
                    return Err(ParallelError::Task {
                        index,
                        error,
                        context: self.context(),
                    })
                }
                Some(Err(message)) => {
                    return Err(ParallelError::Panicked {
                        index,
                        message,
                        context: self.context(),
                    })
                }
                None => return Err(ConfigurationError::PoolShutDown.into()),
            }
        }
        Ok(values)
    }
}

/// Queue one job per item and block until every outcome has arrived.
fn dispatch<T, R, E, F>(
    items: Vec<T>,
    work: F,
    inbox: &Sender<Message>,
) -> Result<Vec<Option<Outcome<R, E>>>, ConfigurationError>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T, usize) -> Result<R, E> + Send + Sync + 'static,
{
    let count = items.len();
    let work = Arc::new(work);
    let (outbox, completed) = crossbeam_channel::unbounded::<(usize, Outcome<R, E>)>();

    for (index, item) in items.into_iter().enumerate() {
        let work = Arc::clone(&work);
        let outbox = outbox.clone();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(item, index)))
                .map_err(panic_message);
            let _ = outbox.send((index, outcome));
        });
        inbox
            .send(Message::Run(job))
            .map_err(|_| ConfigurationError::PoolShutDown)?;
    }
    drop(outbox);

    let mut slots: Vec<Option<Outcome<R, E>>> = (0..count).map(|_| None).collect();
    for _ in 0..count {
        // Fails only once every job has been dropped without reporting.
        let (index, outcome) = completed
            .recv()
            .map_err(|_| ConfigurationError::PoolShutDown)?;
        slots[index] = Some(outcome);
    }
    Ok(slots)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("boom at {0}")]
    struct Boom(usize);

    // ========================================================================
    // Ephemeral pools
    // ========================================================================

    #[test]
    fn results_follow_input_order() {
        let results = Parallel::new()
            .threads(2)
            .run(vec![1u64, 2, 3, 4, 5], |n, index| {
                // Earlier items finish last.
                thread::sleep(Duration::from_millis((5 - n) * 10));
                Ok::<_, Boom>((n * 10, index))
            })
            .unwrap();

        assert_eq!(results, vec![(10, 0), (20, 1), (30, 2), (40, 3), (50, 4)]);
    }

    #[test]
    fn first_failure_surfaces_after_all_tasks_ran() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        let err = Parallel::new()
            .threads(2)
            .run(vec![1, 2, 3, 4, 5], move |n, index| {
                counter.fetch_add(1, Ordering::SeqCst);
                if index == 2 {
                    Err(Boom(index))
                } else {
                    Ok(n)
                }
            })
            .unwrap_err();

        assert_eq!(ran.load(Ordering::SeqCst), 5);
        assert_eq!(err.index(), Some(2));
        match err {
            ParallelError::Task { error, .. } => assert_eq!(error, Boom(2)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lowest_index_failure_wins() {
        let err = Parallel::new()
            .threads(4)
            .run(0..8usize, |n, _| {
                if n == 6 {
                    Err(Boom(6))
                } else if n == 3 {
                    thread::sleep(Duration::from_millis(30));
                    Err(Boom(3))
                } else {
                    Ok(n)
                }
            })
            .unwrap_err();

        assert_eq!(err.index(), Some(3));
    }

    #[test]
    fn panics_become_failures() {
        let err = Parallel::new()
            .threads(2)
            .run(vec![0, 1, 2], |n, _| {
                if n == 1 {
                    panic!("window exploded");
                }
                Ok::<_, Boom>(n)
            })
            .unwrap_err();

        match err {
            ParallelError::Panicked { index, message, .. } => {
                assert_eq!(index, 1);
                assert_eq!(message, "window exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_input_runs_nothing() {
        let results: Vec<u8> = Parallel::new()
            .run(Vec::<u8>::new(), |n, _| Ok::<_, Boom>(n))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let err = Parallel::new()
            .threads(0)
            .run(vec![1], |n, _| Ok::<_, Boom>(n))
            .unwrap_err();
        assert!(matches!(
            err,
            ParallelError::Configuration(ConfigurationError::ZeroThreads)
        ));
    }

    #[test]
    fn concurrency_is_bounded_by_threads() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        Parallel::new()
            .threads(3)
            .run(0..12, move |n, _| {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                a.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Boom>(n)
            })
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn backtrace_can_be_disabled() {
        let err = Parallel::new()
            .expand_backtrace(false)
            .run(vec![0], |_, index| Err::<(), _>(Boom(index)))
            .unwrap_err();

        let context = err.context().unwrap();
        assert_eq!(
            context.status(),
            std::backtrace::BacktraceStatus::Disabled
        );
    }

    // ========================================================================
    // Shared pool
    // ========================================================================

    #[test]
    fn shared_pool_is_reused_across_calls() {
        let pool = SharedPool::new();
        pool.enable(3).unwrap();
        assert_eq!(pool.size(), Some(3));

        for round in 0..3usize {
            let results = Parallel::new()
                .pool(&pool)
                .run(0..10usize, move |n, _| Ok::<_, Boom>(n + round))
                .unwrap();
            assert_eq!(results, (round..round + 10).collect::<Vec<_>>());
        }

        pool.disable().unwrap();
        assert!(!pool.is_enabled());
    }

    #[test]
    fn enabling_twice_is_an_error() {
        let pool = SharedPool::new();
        pool.enable(1).unwrap();
        assert_eq!(pool.enable(1), Err(ConfigurationError::AlreadyEnabled));
        pool.disable().unwrap();
    }

    #[test]
    fn disabling_without_enable_is_an_error() {
        let pool = SharedPool::new();
        assert_eq!(pool.disable(), Err(ConfigurationError::NotEnabled));
    }

    #[test]
    fn threads_conflict_with_shared_pool() {
        let pool = SharedPool::new();
        pool.enable(2).unwrap();

        let err = Parallel::new()
            .pool(&pool)
            .threads(4)
            .run(vec![1], |n, _| Ok::<_, Boom>(n))
            .unwrap_err();
        assert!(matches!(
            err,
            ParallelError::Configuration(ConfigurationError::ThreadsWithSharedPool)
        ));

        // Opting out of the shared pool makes threads valid again.
        let results = Parallel::new()
            .pool(&pool)
            .shared(false)
            .threads(4)
            .run(vec![1], |n, _| Ok::<_, Boom>(n))
            .unwrap();
        assert_eq!(results, vec![1]);
    }

    #[test]
    fn shared_mode_requires_enabled_pool() {
        let pool = SharedPool::new();
        let err = Parallel::new()
            .pool(&pool)
            .shared(true)
            .run(vec![1], |n, _| Ok::<_, Boom>(n))
            .unwrap_err();
        assert!(matches!(
            err,
            ParallelError::Configuration(ConfigurationError::NotEnabled)
        ));
    }

    #[test]
    fn disabled_pool_falls_back_to_ephemeral() {
        let pool = SharedPool::new();
        let results = Parallel::new()
            .pool(&pool)
            .run(vec![1, 2], |n, _| Ok::<_, Boom>(n))
            .unwrap();
        assert_eq!(results, vec![1, 2]);
    }

    #[test]
    fn shared_pool_survives_failures() {
        let pool = SharedPool::new();
        pool.enable(2).unwrap();

        let failed = Parallel::new()
            .pool(&pool)
            .run(vec![0, 1], |n, _| {
                if n == 0 {
                    panic!("first");
                }
                Err::<(), _>(Boom(n))
            });
        assert_eq!(failed.unwrap_err().index(), Some(0));

        let results = Parallel::new()
            .pool(&pool)
            .run(vec![5, 6], |n, _| Ok::<_, Boom>(n))
            .unwrap();
        assert_eq!(results, vec![5, 6]);
    }

    #[test]
    fn disable_discards_queued_work() {
        let pool = Arc::new(SharedPool::new());
        pool.enable(1).unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let run = {
            let pool = Arc::clone(&pool);
            let ran = Arc::clone(&ran);
            thread::spawn(move || {
                Parallel::new().pool(&pool).run(0..20usize, move |n, _| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok::<_, Boom>(n)
                })
            })
        };

        thread::sleep(Duration::from_millis(50));
        let started = std::time::Instant::now();
        pool.disable().unwrap();
        let waited = started.elapsed();

        let err = run.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ParallelError::Configuration(ConfigurationError::PoolShutDown)
        ));
        // Only the job in flight is waited for, not the backlog.
        assert!(waited < Duration::from_millis(200), "disable took {waited:?}");
        assert!(ran.load(Ordering::SeqCst) < 20);
        assert!(!pool.is_enabled());
    }
}
