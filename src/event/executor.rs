//! Async Delivery Executors
//!
//! Asynchronous delivery runs one task per fired event on a worker pool. The
//! pool comes from [`ExecutorServices`] when installed, otherwise the shared
//! rayon global pool is used.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

/// Unit of work handed to an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs tasks on worker threads
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Provider of the engine's task executor
pub trait ExecutorServices: Send + Sync {
    fn task_executor(&self) -> Arc<dyn TaskExecutor>;
}

/// Executor backed by rayon, either the global pool or a dedicated one
pub struct RayonExecutor {
    pool: Option<rayon::ThreadPool>,
}

impl RayonExecutor {
    /// Executor running tasks on rayon's shared global pool
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// Executor with a dedicated pool of `threads` named worker threads
    pub fn with_threads(threads: usize, thread_name: &str) -> Result<Self> {
        let prefix = thread_name.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(move |index| format!("{}-{}", prefix, index))
            .build()
            .with_context(|| format!("Failed to build async executor pool with {} threads", threads))?;
        debug!("Created async executor pool with {} threads", pool.current_num_threads());
        Ok(Self { pool: Some(pool) })
    }

    pub fn thread_count(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl TaskExecutor for RayonExecutor {
    fn execute(&self, task: Task) {
        match &self.pool {
            Some(pool) => pool.spawn(task),
            None => rayon::spawn(task),
        }
    }
}

/// Executor that runs tasks on a tokio runtime's blocking pool
pub struct TokioBlockingExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioBlockingExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor for the runtime the caller is running in
    pub fn current() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .context("No tokio runtime available for async event delivery")?;
        Ok(Self::new(handle))
    }
}

impl TaskExecutor for TokioBlockingExecutor {
    fn execute(&self, task: Task) {
        // The join handle is not needed; completion is reported by the task itself
        drop(self.handle.spawn_blocking(task));
    }
}

/// [`ExecutorServices`] returning a fixed executor
pub struct FixedExecutorServices {
    executor: Arc<dyn TaskExecutor>,
}

impl FixedExecutorServices {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self { executor }
    }
}

impl ExecutorServices for FixedExecutorServices {
    fn task_executor(&self) -> Arc<dyn TaskExecutor> {
        Arc::clone(&self.executor)
    }
}
