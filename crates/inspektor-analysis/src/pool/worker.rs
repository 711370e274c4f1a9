// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-size worker pool with a bounded job queue.
//
// Jobs are opaque closures. A submission waits at most the configured timeout
// for queue capacity and is rejected (counters untouched) when the queue
// stays full. Workers survive panicking jobs; the panic is logged and counted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use inspektor_core::config::EngineConfig;
use inspektor_core::error::{InspektorError, Result};

/// A unit of work handed to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Default time a submission waits for queue capacity.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of queue slots per worker.
pub const DEFAULT_QUEUE_CAPACITY_PER_WORKER: usize = 4;

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    /// Jobs currently executing.
    pub active_jobs: usize,
    /// Jobs accepted since construction.
    pub total_jobs: u64,
    /// Jobs that ran to completion without panicking.
    pub completed_jobs: u64,
    /// Jobs that panicked.
    pub failed_jobs: u64,
    /// Jobs accepted but not yet picked up by a worker.
    pub queue_length: usize,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    /// Accepted jobs that have not finished yet.
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Counters {
    fn accept(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    /// Undo `accept` for a submission the queue refused.
    fn revert(&self) {
        self.total.fetch_sub(1, Ordering::SeqCst);
        self.finish();
    }

    fn finish(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// Bounded pool of named worker threads.
///
/// Construction does not spawn threads; [`start`](Self::start) does, and
/// the first submission starts the pool implicitly. [`close`](Self::close)
/// is idempotent and also runs on drop.
pub struct WorkerPool {
    workers: usize,
    submit_timeout: Duration,
    sender: RwLock<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Pool with `workers` threads (0 = host parallelism), four queue slots
    /// per worker, and the default submission timeout.
    pub fn new(workers: usize) -> Self {
        Self::with_limits(workers, DEFAULT_QUEUE_CAPACITY_PER_WORKER, DEFAULT_SUBMIT_TIMEOUT)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_limits(
            config.workers,
            config.queue_capacity_per_worker,
            config.submit_timeout(),
        )
    }

    pub fn with_limits(workers: usize, capacity_per_worker: usize, submit_timeout: Duration) -> Self {
        let workers = if workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            workers
        };
        let capacity = workers.saturating_mul(capacity_per_worker.max(1));
        let (sender, receiver) = crossbeam_channel::bounded(capacity);

        debug!(workers, capacity, "Worker pool created");
        Self {
            workers,
            submit_timeout,
            sender: RwLock::new(Some(sender)),
            receiver,
            handles: Mutex::new(Vec::with_capacity(workers)),
            started: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawn the worker threads. Calling it again, or after `close`, does
    /// nothing.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() || self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for id in 0..self.workers {
            let receiver = self.receiver.clone();
            let counters = Arc::clone(&self.counters);
            let spawned = thread::Builder::new()
                .name(format!("inspektor-worker-{id}"))
                .spawn(move || run_worker(id, receiver, counters));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => error!(worker = id, error = %err, "Failed to spawn worker thread"),
            }
        }
        info!(workers = handles.len(), "Worker pool started");
    }

    /// Enqueue a job, waiting up to the pool's submission timeout.
    ///
    /// Returns `false` when the pool is closed or the queue stayed full.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.try_submit(Box::new(job)).is_ok()
    }

    /// Like [`submit`](Self::submit) with an explicit timeout.
    pub fn submit_with_timeout(&self, job: impl FnOnce() + Send + 'static, timeout: Duration) -> bool {
        self.try_submit_with_timeout(Box::new(job), timeout).is_ok()
    }

    pub fn try_submit(&self, job: Job) -> Result<()> {
        self.try_submit_with_timeout(job, self.submit_timeout)
    }

    /// Enqueue a job, reporting why it was refused.
    pub fn try_submit_with_timeout(&self, job: Job, timeout: Duration) -> Result<()> {
        self.start();

        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(InspektorError::PoolClosed);
        };

        self.counters.accept();
        match sender.send_timeout(job, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                self.counters.revert();
                warn!(timeout_ms = timeout.as_millis() as u64, "Worker pool queue full; job rejected");
                Err(InspektorError::PoolSaturated {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                self.counters.revert();
                Err(InspektorError::PoolClosed)
            }
        }
    }

    /// Block until every accepted job has finished.
    pub fn wait(&self) {
        let mut pending = self.counters.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while *pending > 0 {
            pending = self
                .counters
                .drained
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns
    /// whether the pool drained.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.counters.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (pending, _) = self
            .counters
            .drained
            .wait_timeout_while(pending, timeout, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *pending == 0
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    pub fn close(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return;
        };
        drop(sender);

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for handle in handles {
            // A job closing its own pool cannot join the thread it runs on.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }
        info!(
            completed = self.counters.completed.load(Ordering::SeqCst),
            failed = self.counters.failed.load(Ordering::SeqCst),
            "Worker pool closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            active_jobs: self.counters.active.load(Ordering::SeqCst),
            total_jobs: self.counters.total.load(Ordering::SeqCst),
            completed_jobs: self.counters.completed.load(Ordering::SeqCst),
            failed_jobs: self.counters.failed.load(Ordering::SeqCst),
            queue_length: self.receiver.len(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(id: usize, receiver: Receiver<Job>, counters: Arc<Counters>) {
    debug!(worker = id, "Worker started");
    for job in receiver.iter() {
        counters.active.fetch_add(1, Ordering::SeqCst);
        let outcome = panic::catch_unwind(AssertUnwindSafe(job));
        counters.active.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(worker = id, panic = %panic_message(payload.as_ref()), "Job panicked; worker continues");
            }
        }
        counters.finish();
    }
    debug!(worker = id, "Worker exiting");
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
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
    use std::sync::mpsc;

    #[test]
    fn runs_submitted_jobs() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            assert!(pool.submit(move || tx.send(i).unwrap()));
        }
        pool.wait();

        let mut seen: Vec<i32> = rx.try_iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());

        let stats = pool.stats();
        assert_eq!(stats.workers, 2);
        assert_eq!(stats.total_jobs, 8);
        assert_eq!(stats.completed_jobs, 8);
        assert_eq!(stats.active_jobs, 0);
        assert_eq!(stats.queue_length, 0);
    }

    #[test]
    fn zero_workers_means_host_parallelism() {
        let pool = WorkerPool::new(0);
        assert!(pool.workers() >= 1);
    }

    #[test]
    fn saturated_queue_rejects_without_counting() {
        let pool = WorkerPool::with_limits(1, 1, Duration::from_millis(20));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        // Occupy the only worker.
        assert!(pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }));
        started_rx.recv().unwrap();

        // Fill the single queue slot.
        assert!(pool.submit(|| {}));

        let err = pool.try_submit(Box::new(|| {})).unwrap_err();
        assert!(matches!(err, InspektorError::PoolSaturated { timeout_ms: 20 }));
        assert_eq!(pool.stats().total_jobs, 2);
        assert_eq!(pool.stats().queue_length, 1);

        release_tx.send(()).unwrap();
        pool.wait();
        assert_eq!(pool.stats().completed_jobs, 2);
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1);
        assert!(pool.submit(|| panic!("boom")));
        let (tx, rx) = mpsc::channel();
        assert!(pool.submit(move || tx.send(42).unwrap()));
        pool.wait();

        assert_eq!(rx.recv().unwrap(), 42);
        let stats = pool.stats();
        assert_eq!(stats.failed_jobs, 1);
        assert_eq!(stats.completed_jobs, 1);
    }

    #[test]
    fn close_is_idempotent_and_rejects_later_jobs() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = mpsc::channel();
        assert!(pool.submit(move || tx.send(()).unwrap()));

        pool.close();
        pool.close();

        // Queued work finished before close returned.
        assert!(rx.try_recv().is_ok());
        assert!(pool.is_closed());
        assert!(!pool.submit(|| {}));
        assert!(matches!(
            pool.try_submit(Box::new(|| {})),
            Err(InspektorError::PoolClosed)
        ));
        pool.start();
        assert!(pool.is_closed());
    }

    #[test]
    fn wait_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(1);
        pool.wait();
        assert!(pool.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wait_timeout_reports_unfinished_work() {
        let pool = WorkerPool::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        assert!(pool.submit(move || {
            release_rx.recv().unwrap();
        }));

        assert!(!pool.wait_timeout(Duration::from_millis(20)));
        release_tx.send(()).unwrap();
        assert!(pool.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn panic_message_extracts_text() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
