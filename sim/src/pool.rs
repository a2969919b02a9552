//! Statically partitioned parallel-for.
//!
//! A stage hands the pool a slice of per-entity work items. The slice is cut
//! into contiguous, non-overlapping batches ([`partition`]), one per worker,
//! and every batch only ever writes its own items. The call blocks until all
//! batches have finished, which is the only synchronization a stage needs.
//!
//! Batches are fail-open: each one works on a scratch copy of its items and
//! the copy is written back only if the batch succeeds. A batch that returns
//! an error or panics is logged and leaves its items exactly as they were.

use crate::error::BatchError;
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Number of workers for a machine with `available` hardware threads.
pub fn worker_count(available: usize) -> usize {
    available.saturating_sub(1).max(2)
}

/// Worker count derived from the current machine.
pub fn default_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    worker_count(available)
}

/// Split `0..count` into contiguous ranges of `ceil(count / workers)` items.
///
/// The ranges are disjoint, ordered, and their union is exactly `0..count`.
/// At most `workers` ranges are produced.
pub fn partition(count: usize, workers: usize) -> Vec<Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    let batch = count.div_ceil(workers.max(1));
    (0..count)
        .step_by(batch)
        .map(|start| start..(start + batch).min(count))
        .collect()
}

/// Result of one stage run on the pool.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Batches whose results were written back.
    pub applied: usize,
    /// Batches that were dropped, with their index ranges.
    pub failed: Vec<(Range<usize>, BatchError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fixed-size worker pool used by one subsystem.
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
    pool: rayon::ThreadPool,
    // Receiver is !Sync; the pool lives in a shared ECS resource.
    exits: Mutex<Receiver<usize>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .finish()
    }
}

impl WorkerPool {
    /// Start a pool with `workers` threads named `{name}-{index}`.
    pub fn new(name: &'static str, workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let (exit_tx, exits) = mpsc::channel();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{name}-{index}"))
            .exit_handler(move |index| {
                let _ = exit_tx.send(index);
            })
            .build()?;
        log::info!("{name} pool started with {workers} workers");
        Ok(Self {
            name,
            workers,
            pool,
            exits: Mutex::new(exits),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` over `items` in parallel, one batch per worker.
    ///
    /// `f` receives the index of the batch's first item and the batch's
    /// items. Blocks until every batch has finished.
    pub fn run<T, F>(&self, stage: &'static str, items: &mut [T], f: F) -> BatchReport
    where
        T: Clone + Send,
        F: Fn(usize, &mut [T]) -> Result<(), BatchError> + Sync,
    {
        let ranges = partition(items.len(), self.workers);

        let mut chunks = Vec::with_capacity(ranges.len());
        let mut rest = items;
        for range in &ranges {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            chunks.push(head);
            rest = tail;
        }

        let mut outcomes: Vec<Option<Result<(), BatchError>>> = (0..ranges.len()).map(|_| None).collect();
        let f = &f;
        self.pool.scope(|scope| {
            for ((range, chunk), outcome) in ranges.iter().zip(chunks).zip(outcomes.iter_mut()) {
                let start = range.start;
                scope.spawn(move |_| {
                    *outcome = Some(run_batch(start, chunk, f));
                });
            }
        });

        collect_report(stage, ranges, outcomes)
    }

    /// Run `f` over all of `items` as a single batch on the calling thread,
    /// with the same fail-open contract as [`WorkerPool::run`].
    pub fn run_inline<T, F>(&self, stage: &'static str, items: &mut [T], f: F) -> BatchReport
    where
        T: Clone,
        F: Fn(usize, &mut [T]) -> Result<(), BatchError>,
    {
        run_single(stage, items, f)
    }

    /// Stop the pool, waiting at most `timeout` for the workers to exit.
    ///
    /// Returns false if some workers were still running when the wait ran
    /// out; those threads are detached and finish on their own.
    pub fn shutdown(self, timeout: Duration) -> bool {
        let Self {
            name,
            workers,
            pool,
            exits,
        } = self;
        drop(pool);
        let exits = exits.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());

        let deadline = Instant::now() + timeout;
        let mut exited = 0;
        while exited < workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match exits.recv_timeout(remaining) {
                Ok(_) => exited += 1,
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "{name} pool: {} of {workers} workers still running after {timeout:?}, abandoning them",
                        workers - exited
                    );
                    return false;
                }
                // Every exit handler has run and dropped its sender.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!("{name} pool shut down");
        true
    }
}

/// Run `f` over all of `items` as one batch on the calling thread, with the
/// fail-open contract of [`WorkerPool::run`]. Needs no pool.
pub fn run_single<T, F>(stage: &'static str, items: &mut [T], f: F) -> BatchReport
where
    T: Clone,
    F: Fn(usize, &mut [T]) -> Result<(), BatchError>,
{
    if items.is_empty() {
        return BatchReport::default();
    }
    let range = 0..items.len();
    let outcome = run_batch(0, items, &f);
    collect_report(stage, vec![range], vec![Some(outcome)])
}

fn run_batch<T, F>(start: usize, chunk: &mut [T], f: &F) -> Result<(), BatchError>
where
    T: Clone,
    F: Fn(usize, &mut [T]) -> Result<(), BatchError>,
{
    let mut scratch = chunk.to_vec();
    match panic::catch_unwind(AssertUnwindSafe(|| f(start, &mut scratch))) {
        Ok(Ok(())) => {
            chunk.clone_from_slice(&scratch);
            Ok(())
        }
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(BatchError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn collect_report(
    stage: &'static str,
    ranges: Vec<Range<usize>>,
    outcomes: Vec<Option<Result<(), BatchError>>>,
) -> BatchReport {
    let mut report = BatchReport::default();
    for (range, outcome) in ranges.into_iter().zip(outcomes) {
        match outcome {
            Some(Ok(())) => report.applied += 1,
            Some(Err(err)) => {
                log::error!("{stage}: batch {range:?} dropped: {err}");
                report.failed.push((range, err));
            }
            None => {
                let err = BatchError::Panicked("batch never ran".to_string());
                log::error!("{stage}: batch {range:?} dropped: {err}");
                report.failed.push((range, err));
            }
        }
    }
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_floor() {
        assert_eq!(worker_count(0), 2);
        assert_eq!(worker_count(1), 2);
        assert_eq!(worker_count(3), 2);
        assert_eq!(worker_count(8), 7);
    }

    #[test]
    fn test_partition_covers_range_disjointly() {
        for count in 0..64 {
            for workers in 1..12 {
                let ranges = partition(count, workers);
                assert!(ranges.len() <= workers);

                let mut next = 0;
                for range in &ranges {
                    assert_eq!(range.start, next, "gap or overlap for {count}/{workers}");
                    assert!(range.end > range.start);
                    next = range.end;
                }
                assert_eq!(next, count);
            }
        }
    }

    #[test]
    fn test_partition_batch_size() {
        let ranges = partition(10, 3);
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
        assert!(partition(0, 4).is_empty());
        assert_eq!(partition(5, 0), vec![0..5]);
    }

    #[test]
    fn test_run_writes_every_item() {
        let pool = WorkerPool::new("test", 3).unwrap();
        let mut items: Vec<usize> = vec![0; 25];
        let report = pool.run("fill", &mut items, |start, chunk| {
            for (offset, item) in chunk.iter_mut().enumerate() {
                *item = start + offset;
            }
            Ok(())
        });
        assert!(report.is_clean());
        assert_eq!(report.applied, 3);
        assert_eq!(items, (0..25).collect::<Vec<_>>());
        assert!(pool.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn test_failed_batch_is_dropped() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let mut items = vec![1_i32; 10];
        let report = pool.run("fail", &mut items, |start, chunk| {
            for item in chunk.iter_mut() {
                *item = 7;
            }
            if start == 0 {
                return Err(BatchError::Panicked("refused".to_string()));
            }
            Ok(())
        });

        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 0..5);
        assert_eq!(&items[..5], &[1; 5]);
        assert_eq!(&items[5..], &[7; 5]);
    }

    #[test]
    fn test_panicking_batch_is_contained() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let mut items = vec![0_u8; 4];
        let report = pool.run("panic", &mut items, |start, chunk| {
            chunk.fill(9);
            if start > 0 {
                panic!("boom");
            }
            Ok(())
        });

        assert_eq!(report.applied, 1);
        assert_eq!(report.failed[0].1, BatchError::Panicked("boom".to_string()));
        assert_eq!(items, vec![9, 9, 0, 0]);
    }

    #[test]
    fn test_run_inline_matches_contract() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let mut items = vec![1, 2, 3];
        let report = pool.run_inline("inline", &mut items, |start, chunk| {
            assert_eq!(start, 0);
            chunk.iter_mut().for_each(|x| *x *= 10);
            Ok(())
        });
        assert!(report.is_clean());
        assert_eq!(items, vec![10, 20, 30]);

        let report = pool.run_inline("inline", &mut items, |_, chunk| {
            chunk.fill(0);
            Err(BatchError::Panicked("no".to_string()))
        });
        assert!(!report.is_clean());
        assert_eq!(items, vec![10, 20, 30]);
    }

    #[test]
    fn test_run_single_without_pool_is_fail_open() {
        let mut items = vec![1.0_f32, 2.0, 3.0];
        let report = run_single("single", &mut items, |_, chunk| {
            for item in chunk.iter_mut() {
                *item += 1.0;
                if !item.is_finite() || *item > 2.5 {
                    return Err(BatchError::Panicked("too big".to_string()));
                }
            }
            Ok(())
        });
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 0..3);
        assert_eq!(items, vec![1.0, 2.0, 3.0]);

        let mut empty: Vec<f32> = Vec::new();
        assert!(run_single("single", &mut empty, |_, _| Ok(())).is_clean());
    }

    #[test]
    fn test_shutdown_gives_up_on_stuck_worker() {
        let pool = WorkerPool::new("stuck", 2).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.pool.spawn(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(!pool.shutdown(Duration::from_millis(10)));

        release_tx.send(()).unwrap();
    }
}
