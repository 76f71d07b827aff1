//! Bounded worker pool for fail-fast parallel task execution.
//!
//! [`WorkerPool`] owns a fixed number of OS threads and a bounded queue with one
//! slot per worker. Submitting blocks while the queue is full, which caps the
//! amount of queued work. Each worker takes messages off the queue in order and
//! runs them on its own thread until it receives its stop message.
//!
//! A task that panics is handled according to the pool's failure policy (see
//! [`PoolConfig::with_abort_on_panic`]): either the whole process is aborted,
//! or the worker that ran the task quietly exits and the pool carries on with
//! one worker fewer. Lost workers are not replaced.

use crate::bounded_queue::{self, Receiver, Sender};
use log::{debug, error, warn};
use slotpool_common::{Result, error::Error, verify_arg};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

/// A unit of work executed by a pool worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A message on the pool's queue.
enum Message {
    Run(Task),
    Stop,
}

/// Configuration of a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers, which is also the capacity of the task queue.
    pub slots: usize,
    /// Abort the process when a task panics. Defaults to `true`.
    pub abort_on_panic: bool,
    /// Prefix for worker thread names; worker `i` is named `"{prefix}-{i}"`.
    pub thread_name: Option<String>,
}

impl PoolConfig {
    pub fn new(slots: usize) -> PoolConfig {
        PoolConfig {
            slots,
            abort_on_panic: true,
            thread_name: None,
        }
    }

    /// Selects the failure policy.
    ///
    /// With `true` (the default), a panicking task aborts the process. With
    /// `false`, the panic ends only the worker that ran the task; the remaining
    /// workers keep draining the queue and the lost worker is not replaced.
    ///
    /// The pool does not touch the process-wide panic hook, so with either
    /// setting the hook still reports the panic (by default on stderr). A lost
    /// worker is also logged at `warn` level.
    pub fn with_abort_on_panic(mut self, abort_on_panic: bool) -> PoolConfig {
        self.abort_on_panic = abort_on_panic;
        self
    }

    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> PoolConfig {
        self.thread_name = Some(prefix.into());
        self
    }
}

impl Default for PoolConfig {
    /// Sizes the pool from the available parallelism of the system, or 8 if
    /// that cannot be determined.
    fn default() -> Self {
        let slots = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        PoolConfig::new(slots)
    }
}

/// A fixed-size pool of worker threads fed through a bounded queue.
///
/// The pool is created running. Work is added with [`submit`](Self::submit) and
/// the pool is shut down with [`join`](Self::join), which lets every worker
/// finish the work queued ahead of its stop message. Dropping a pool without
/// joining it performs the same shutdown.
///
/// There is no ordering guarantee between workers. A single worker runs the
/// tasks it dequeues in the order it dequeued them.
pub struct WorkerPool {
    sender: Sender<Message>,
    workers: Vec<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
    slots: usize,
}

impl WorkerPool {
    /// Creates the pool and spawns all of its workers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config.slots` is 0, before any thread
    /// is spawned, and `SpawnWorker` if the OS refuses to create a thread. In
    /// the latter case the workers spawned so far shut down on their own.
    pub fn new(config: PoolConfig) -> Result<WorkerPool> {
        verify_arg!(slots, config.slots > 0);

        let (sender, receiver) = bounded_queue::bounded::<Message>(config.slots);
        let live = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(config.slots);
        for index in 0..config.slots {
            let mut builder = thread::Builder::new();
            if let Some(prefix) = &config.thread_name {
                builder = builder.name(format!("{prefix}-{index}"));
            }
            let worker = Worker {
                index,
                receiver: receiver.clone(),
                abort_on_panic: config.abort_on_panic,
                live: live.clone(),
            };
            live.fetch_add(1, Ordering::SeqCst);
            let handle = builder
                .spawn(move || worker.run())
                .map_err(|e| Error::spawn_worker(index, e))?;
            workers.push(handle);
            #[cfg(test)]
            SPAWNED_WORKERS.with(|n| n.set(n.get() + 1));
        }

        debug!(
            "worker pool started: {} slot(s), abort_on_panic={}",
            config.slots, config.abort_on_panic
        );
        Ok(WorkerPool {
            sender,
            workers,
            live,
            slots: config.slots,
        })
    }

    /// Creates a pool of `slots` workers with the default failure policy.
    pub fn with_slots(slots: usize) -> Result<WorkerPool> {
        Self::new(PoolConfig::new(slots))
    }

    /// Number of workers the pool was created with.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Number of workers that have not been lost to a panicking task.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Queues `task` for execution, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `PoolExhausted` when every worker has been lost to a panicking
    /// task, since nothing is left to run the task. This can only happen when
    /// the pool does not abort on panic.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(task))
    }

    /// Same as [`submit`](Self::submit), for an already boxed task.
    pub fn submit_boxed(&self, task: Task) -> Result<()> {
        self.sender
            .send(Message::Run(task))
            .map_err(|_| Error::pool_exhausted())
    }

    /// Stops the workers and waits for all of them to exit.
    ///
    /// One stop message is queued per worker behind any pending tasks, so all
    /// work submitted before this call runs to completion first.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        debug!("joining {} worker(s)", self.workers.len());
        for _ in 0..self.workers.len() {
            if self.sender.send(Message::Stop).is_err() {
                // Every remaining worker is gone already.
                break;
            }
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
        debug!("worker pool joined");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Workers spawned by pools created on the current thread.
#[cfg(test)]
thread_local! {
    static SPAWNED_WORKERS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

struct Worker {
    index: usize,
    receiver: Receiver<Message>,
    abort_on_panic: bool,
    live: Arc<AtomicUsize>,
}

impl Worker {
    fn run(self) {
        let Worker {
            index,
            receiver,
            abort_on_panic,
            live,
        } = self;
        debug!("worker {index} started");

        while let Ok(message) = receiver.recv() {
            let task = match message {
                Message::Run(task) => task,
                Message::Stop => {
                    debug!("worker {index} stopped");
                    return;
                }
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let failure = Error::task_failure(index, panic_message(payload.as_ref()));
                if abort_on_panic {
                    error!("{failure}; aborting");
                    std::process::abort();
                }

                // Leave the queue before announcing the loss, so that once the
                // live count hits zero nobody can be waiting on a consumer.
                drop(receiver);
                let remaining = live.fetch_sub(1, Ordering::SeqCst) - 1;
                warn!("{failure}; worker exits, {remaining} worker(s) left");
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpool_common::error::ErrorKind;
    use std::{
        sync::{Condvar, Mutex},
        time::{Duration, Instant},
    };

    /// A latch that blocks tasks until the test opens it.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl Gate {
        fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
        }

        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while !cond() {
            if start.elapsed() > timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    #[test]
    fn test_new_worker_pool() {
        let pool = WorkerPool::with_slots(2).unwrap();
        assert_eq!(pool.slots(), 2);
        assert_eq!(pool.live_workers(), 2);
        pool.join();
    }

    #[test]
    fn test_zero_slots_rejected() {
        let spawned = || SPAWNED_WORKERS.with(|n| n.get());
        let before = spawned();

        let err = WorkerPool::new(PoolConfig::new(0).with_thread_name("empty"))
            .err()
            .unwrap();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidConfiguration { name, .. } if name == "slots"
        ));
        assert_eq!(spawned(), before);

        WorkerPool::with_slots(3).unwrap().join();
        assert_eq!(spawned(), before + 3);
    }

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert!(config.slots >= 1);
        assert!(config.abort_on_panic);
        assert!(config.thread_name.is_none());
    }

    #[test]
    fn test_every_task_runs_exactly_once() {
        for slots in [1, 2, 3, 8] {
            let pool = WorkerPool::with_slots(slots).unwrap();
            let runs: Arc<Vec<AtomicUsize>> =
                Arc::new((0..100).map(|_| AtomicUsize::new(0)).collect());
            for i in 0..100 {
                let runs = runs.clone();
                pool.submit(move || {
                    runs[i].fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            pool.join();
            assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
        }
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let pool = WorkerPool::with_slots(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = order.clone();
            pool.submit(move || order.lock().unwrap().push(i)).unwrap();
        }
        pool.join();
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_blocks_when_workers_and_queue_are_full() {
        let slots = 2;
        let pool = WorkerPool::with_slots(slots).unwrap();
        let gate = Arc::new(Gate::default());
        let completed = Arc::new(AtomicUsize::new(0));

        let blocking_task = || {
            let gate = gate.clone();
            let completed = completed.clone();
            move || {
                gate.wait();
                completed.fetch_add(1, Ordering::SeqCst);
            }
        };

        // One task per worker plus one per queue slot.
        for _ in 0..slots * 2 {
            pool.submit(blocking_task()).unwrap();
        }

        let submitted = AtomicUsize::new(0);
        thread::scope(|s| {
            let extra = blocking_task();
            let handle = s.spawn(|| {
                pool.submit(extra).unwrap();
                submitted.store(completed.load(Ordering::SeqCst) + 1, Ordering::SeqCst);
            });

            thread::sleep(Duration::from_millis(100));
            assert_eq!(submitted.load(Ordering::SeqCst), 0);

            gate.open();
            handle.join().unwrap();
        });

        // The blocked submit went through only after some task had completed.
        assert!(submitted.load(Ordering::SeqCst) >= 2);
        pool.join();
        assert_eq!(completed.load(Ordering::SeqCst), slots * 2 + 1);
    }

    #[test]
    fn test_concurrency_is_bounded_by_slots() {
        let slots = 3;
        let pool = WorkerPool::with_slots(slots).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..30 {
            let running = running.clone();
            let peak = peak.clone();
            let millis = fastrand::u64(1..5);
            pool.submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(millis));
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.join();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= slots);
    }

    #[test]
    fn test_concurrent_task_execution() {
        let pool = WorkerPool::with_slots(4).unwrap();
        let sleep_duration = Duration::from_millis(50);
        let start_time = Instant::now();
        for _ in 0..4 {
            pool.submit(move || thread::sleep(sleep_duration)).unwrap();
        }
        pool.join();
        assert!(start_time.elapsed() < sleep_duration * 3);
    }

    #[test]
    fn test_panicking_task_loses_one_worker() {
        let pool = WorkerPool::new(PoolConfig::new(2).with_abort_on_panic(false)).unwrap();
        let completed = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("task failure")).unwrap();
        for _ in 0..20 {
            let completed = completed.clone();
            pool.submit(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || {
            pool.live_workers() == 1 && completed.load(Ordering::SeqCst) == 20
        }));

        // The surviving worker keeps serving new work.
        let completed_clone = completed.clone();
        pool.submit(move || {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.join();
        assert_eq!(completed.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_pool_exhausted_after_all_workers_lost() {
        let pool = WorkerPool::new(PoolConfig::new(1).with_abort_on_panic(false)).unwrap();
        pool.submit(|| panic!("only worker fails")).unwrap();
        assert!(wait_until(Duration::from_secs(5), || pool.live_workers() == 0));

        let err = pool.submit(|| {}).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PoolExhausted));
        pool.join();
    }

    #[test]
    fn test_join_with_partially_lost_pool() {
        let pool = WorkerPool::new(PoolConfig::new(3).with_abort_on_panic(false)).unwrap();
        pool.submit(|| panic!("first")).unwrap();
        pool.submit(|| panic!("second")).unwrap();
        assert!(wait_until(Duration::from_secs(5), || pool.live_workers() == 1));
        // Three stop messages for one live worker must not hang.
        pool.join();
    }

    #[test]
    fn test_thread_names() {
        let pool = WorkerPool::new(PoolConfig::new(2).with_thread_name("pool")).unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..4 {
            let names = names.clone();
            pool.submit(move || {
                let name = thread::current().name().map(str::to_string);
                names.lock().unwrap().push(name);
            })
            .unwrap();
        }
        pool.join();
        let names = names.lock().unwrap();
        assert_eq!(names.len(), 4);
        assert!(
            names
                .iter()
                .all(|n| matches!(n.as_deref(), Some("pool-0") | Some("pool-1")))
        );
    }

    #[test]
    fn test_drop_runs_pending_tasks() {
        let completed = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::with_slots(2).unwrap();
            for _ in 0..10 {
                let completed = completed.clone();
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "task panicked");
    }
}
