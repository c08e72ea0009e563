//! Error types for the aggregation core.

use std::backtrace::Backtrace;

use thiserror::Error;

/// Alias so the `Error` derive does not treat context fields as provided
/// backtraces, which requires a nightly compiler.
type Context = Backtrace;

/// Boxed upstream failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Misuse of the worker pools. These are programming errors at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("shared worker pool has already been initialized")]
    AlreadyEnabled,

    #[error("shared worker pool has not been initialized")]
    NotEnabled,

    #[error("threads is not a supported option when the shared pool is enabled")]
    ThreadsWithSharedPool,

    #[error("worker count must be at least 1")]
    ZeroThreads,

    #[error("worker pool shut down before all tasks completed")]
    PoolShutDown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Failure of a [`Parallel`](crate::Parallel) run.
///
/// Task failures carry the index of the first failing element and a backtrace
/// captured where the executor re-raised it.
#[derive(Debug, Error)]
pub enum ParallelError<E> {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("task {index} failed: {error}")]
    Task {
        index: usize,
        #[source]
        error: E,
        context: Context,
    },

    #[error("task {index} panicked: {message}")]
    Panicked {
        index: usize,
        message: String,
        context: Context,
    },
}

impl<E> ParallelError<E> {
    /// Index of the failed task, if a task failed.
    pub fn index(&self) -> Option<usize> {
        match self {
            ParallelError::Configuration(_) => None,
            ParallelError::Task { index, .. } | ParallelError::Panicked { index, .. } => {
                Some(*index)
            }
        }
    }

    /// The executor backtrace attached to a task failure.
    pub fn context(&self) -> Option<&Backtrace> {
        match self {
            ParallelError::Configuration(_) => None,
            ParallelError::Task { context, .. } | ParallelError::Panicked { context, .. } => {
                Some(context)
            }
        }
    }
}

/// Failure of a statistics aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("window duration must be positive, got {0}")]
    InvalidDuration(i64),

    #[error("end time {end} precedes start time {start}")]
    InvalidRange { start: i64, end: i64 },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("window {index} failed: {source}")]
    Upstream {
        index: usize,
        #[source]
        source: BoxError,
        context: Context,
    },

    #[error("window {index} panicked: {message}")]
    Panicked {
        index: usize,
        message: String,
        context: Context,
    },
}

impl<E> From<ParallelError<E>> for AggregateError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: ParallelError<E>) -> Self {
        match err {
            ParallelError::Configuration(err) => AggregateError::Configuration(err),
            ParallelError::Task {
                index,
                error,
                context,
            } => AggregateError::Upstream {
                index,
                source: Box::new(error),
                context,
            },
            ParallelError::Panicked {
                index,
                message,
                context,
            } => AggregateError::Panicked {
                index,
                message,
                context,
            },
        }
    }
}

/// Failure of a trace lookup.
#[derive(Debug, Error)]
pub enum TraceLookupError {
    #[error("trace lookup failed: {0}")]
    Upstream(#[source] BoxError),
}
