//! Bounded-concurrency task execution.
//!
//! This crate runs large numbers of independent units of work on a fixed number
//! of worker threads, with backpressure on submission and a fail-fast policy
//! for tasks that panic.
//!
//! # Key Components
//!
//! - [`worker_pool::WorkerPool`] - a fixed set of OS threads fed through a
//!   bounded queue; [`submit`](worker_pool::WorkerPool::submit) blocks while the
//!   queue is full and [`join`](worker_pool::WorkerPool::join) drains it
//! - [`parallel_run`] - one-call runs over a short-lived pool, either with
//!   tasks submitted by hand ([`run_parallel`](parallel_run::run_parallel)) or
//!   built from input items by a factory
//!   ([`run_parallel_over`](parallel_run::run_parallel_over))
//! - [`shared_lock::SharedLock`] - the mutual-exclusion handle shared by all
//!   tasks of a run
//! - [`bounded_queue`] - the blocking multi-consumer queue between the
//!   submitter and the workers
//!
//! # Failure Policy
//!
//! By default a panicking task aborts the whole process. When that is turned
//! off, a panic ends only the worker that ran the task: the pool keeps going
//! with one worker fewer, and the lost worker is never replaced.

pub mod bounded_queue;
pub mod parallel_run;
pub mod shared_lock;
pub mod worker_pool;

pub use parallel_run::{RunOptions, run_parallel, run_parallel_over};
pub use shared_lock::SharedLock;
pub use worker_pool::{PoolConfig, Task, WorkerPool};
