//! Sleep command implementation

use anyhow::{Context, Result};
use slotpool::workflow::{RunOptions, run_parallel};
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::{resolve_slots, run_options};

pub fn run(slots: Option<usize>, keep_going: bool, count: usize, millis: u64) -> Result<()> {
    let slots = resolve_slots(slots);
    let elapsed = sleep_tasks(slots, run_options(keep_going), count, Duration::from_millis(millis))?;
    println!("ran {count} task(s) on {slots} slot(s) in {elapsed:?}");
    Ok(())
}

/// Submits `count` tasks that each sleep for `duration` and returns the wall
/// clock time until all of them finished.
pub fn sleep_tasks(
    slots: usize,
    options: RunOptions,
    count: usize,
    duration: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    run_parallel(slots, options, |pool, lock| {
        for i in 0..count {
            let lock = lock.clone();
            pool.submit(move || {
                thread::sleep(duration);
                lock.with(|| log::debug!("task {i} done after {:?}", start.elapsed()));
            })?;
        }
        Ok(())
    })
    .context("parallel sleep run failed")?;
    Ok(start.elapsed())
}
