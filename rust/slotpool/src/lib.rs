//! # Slotpool: bounded-concurrency task execution
//!
//! Slotpool runs many independent units of work on a fixed number of worker
//! threads. Submission blocks once the pool's queue is full, which bounds the
//! amount of work in flight, and a task that panics takes the whole process
//! down unless the caller opts out of that policy.
//!
//! ## Module Organization
//!
//! * [`common`] - Error taxonomy and result helpers shared by all crates
//! * [`workflow`] - The worker pool, the parallel run helpers and the shared
//!   lock handed to tasks
//!
//! ## Getting Started
//!
//! ```no_run
//! use slotpool::workflow::{RunOptions, run_parallel_over};
//!
//! run_parallel_over(4, RunOptions::default(), 1..=100u64, |n, lock| {
//!     let lock = lock.clone();
//!     Some(move || {
//!         let square = n * n;
//!         let _guard = lock.lock();
//!         println!("{n}^2 = {square}");
//!     })
//! })
//! .unwrap();
//! ```

pub use slotpool_common as common;
pub use slotpool_workflow as workflow;
