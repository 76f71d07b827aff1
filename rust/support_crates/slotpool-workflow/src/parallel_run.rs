//! Parallel runs over a short-lived [`WorkerPool`].
//!
//! This module provides two ways of running a batch of independent tasks with a
//! bounded number of workers:
//! - [`run_parallel`] - the caller submits tasks to the pool by hand
//! - [`run_parallel_over`] - the caller supplies input items and a factory that
//!   turns each item into a task
//!
//! Either way, a fresh pool and a fresh [`SharedLock`] are created for the run,
//! the same lock is handed to every caller-provided closure, and the pool is
//! joined before the function returns.

use crate::{
    shared_lock::SharedLock,
    worker_pool::{PoolConfig, WorkerPool},
};
use log::debug;
use slotpool_common::{Result, error::Error};

/// Options of a parallel run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Abort the process when a task panics. Defaults to `true`.
    pub abort_on_panic: bool,
    /// Optional worker thread name prefix.
    pub thread_name: Option<String>,
}

impl RunOptions {
    pub fn with_abort_on_panic(mut self, abort_on_panic: bool) -> RunOptions {
        self.abort_on_panic = abort_on_panic;
        self
    }

    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> RunOptions {
        self.thread_name = Some(prefix.into());
        self
    }

    fn pool_config(&self, slots: usize) -> PoolConfig {
        let config = PoolConfig::new(slots).with_abort_on_panic(self.abort_on_panic);
        match &self.thread_name {
            Some(prefix) => config.with_thread_name(prefix.clone()),
            None => config,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            abort_on_panic: true,
            thread_name: None,
        }
    }
}

/// Runs `body` against a new pool of `slots` workers, then joins the pool.
///
/// `body` is called once with the pool and the run's shared lock, and may
/// submit any number of tasks. Tasks that need the lock capture a clone of it.
/// Once `body` returns, successfully or not, the pool is joined, so every task
/// submitted by `body` has finished when this function returns. The result of
/// `body` is then passed through.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if `slots` is 0, without calling `body`.
/// Otherwise returns whatever `body` returns.
pub fn run_parallel<B, R>(slots: usize, options: RunOptions, body: B) -> Result<R>
where
    B: FnOnce(&WorkerPool, &SharedLock) -> Result<R>,
{
    let pool = WorkerPool::new(options.pool_config(slots))?;
    let lock = SharedLock::new();

    debug!("parallel run submitting");
    let result = body(&pool, &lock);

    debug!("parallel run draining");
    pool.join();
    debug!("parallel run terminated");
    result
}

/// Runs one task per item of `instances` on a new pool of `slots` workers.
///
/// Items are visited in order. For each, `factory` receives the item and the
/// run's shared lock and returns the task to run, which is submitted right
/// away (blocking while the pool's queue is full). After the last item the
/// pool is joined, so all tasks have finished when this function returns.
///
/// # Errors
///
/// - `InvalidConfiguration` if `slots` is 0; `factory` is never called.
/// - `InvalidFactoryResult` if `factory` returns `None`. Later items are not
///   visited, and the tasks submitted before that point still run to
///   completion before the error is returned.
/// - `PoolExhausted` if every worker was lost to a panicking task (only
///   possible with `abort_on_panic` off).
pub fn run_parallel_over<I, T, G, F>(
    slots: usize,
    options: RunOptions,
    instances: I,
    mut factory: G,
) -> Result<()>
where
    I: IntoIterator<Item = T>,
    G: FnMut(T, &SharedLock) -> Option<F>,
    F: FnOnce() + Send + 'static,
{
    run_parallel(slots, options, |pool, lock| {
        for (index, item) in instances.into_iter().enumerate() {
            let task = factory(item, lock).ok_or_else(|| Error::invalid_factory_result(index))?;
            pool.submit(task)?;
        }
        Ok(())
    })
}
