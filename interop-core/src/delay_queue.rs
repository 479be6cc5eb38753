//! Per-call timed task runner.
//!
//! A [`DelayQueue`] runs a growing sequence of actions strictly one after the
//! other. Each action waits for its own delay, measured from the moment the
//! previous action signalled completion (or from the `add` call when the
//! queue was idle), and then receives an [`Advance`] token. Nothing else runs
//! until that token is consumed, so actions that write to a single outbound
//! stream never interleave.
//!
//! The queue is an actor: `new` spawns one tokio task that owns the pending
//! sequence and drains it. Appending is non-blocking and safe while the queue
//! is draining; appended tasks always run after everything already queued.
//!
//! Lifecycle:
//! - Dropping the `DelayQueue` handle does not cancel anything. Queued tasks
//!   keep draining and the actor exits once the sequence is empty.
//! - [`DelayQueue::cancel`] discards every task that has not started yet.
//! - An action that drops its `Advance` without calling it (including by
//!   panicking) stalls the queue for good. The stall is logged and reported
//!   through [`QueueError::Stalled`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn, Instrument};

use crate::error::QueueError;
use crate::logging::queue_span;
use crate::time::as_micros_u64;

type Action = Box<dyn FnOnce(Advance) + Send + 'static>;

struct ScheduledTask {
    seq: u64,
    delay: Duration,
    action: Action,
}

/// Completion token handed to a scheduled action.
///
/// The action must call [`Advance::advance`] exactly once, either before
/// returning or later from another task. The next queued action only starts
/// after that call.
#[must_use = "a scheduled action must call `Advance::advance` or the queue stalls"]
#[derive(Debug)]
pub struct Advance {
    seq: u64,
    done: oneshot::Sender<()>,
}

impl Advance {
    /// Let the queue move on to the next task.
    pub fn advance(self) {
        let _ = self.done.send(());
    }

    /// Position of the running task in submission order, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Observable state of a [`DelayQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Nothing pending; the next `add` starts draining immediately.
    Idle,
    /// At least one task is waiting for its delay or running.
    Draining,
    /// A task never advanced. No further task will run.
    Stalled,
    /// [`DelayQueue::cancel`] was called.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    pending: usize,
    stalled: bool,
    cancelled: bool,
}

impl Progress {
    fn state(&self) -> QueueState {
        if self.cancelled {
            QueueState::Cancelled
        } else if self.stalled {
            QueueState::Stalled
        } else if self.pending == 0 {
            QueueState::Idle
        } else {
            QueueState::Draining
        }
    }

    fn check(&self) -> Result<(), QueueError> {
        match self.state() {
            QueueState::Cancelled => Err(QueueError::Cancelled),
            QueueState::Stalled => Err(QueueError::Stalled),
            QueueState::Idle | QueueState::Draining => Ok(()),
        }
    }
}

/// Strictly ordered, one-at-a-time, delay-respecting task runner.
pub struct DelayQueue {
    tasks: mpsc::UnboundedSender<ScheduledTask>,
    progress: Arc<watch::Sender<Progress>>,
    next_seq: AtomicU64,
    drain: AbortHandle,
}

impl DelayQueue {
    /// Create an idle queue and spawn its drain task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        let (tasks, pending) = mpsc::unbounded_channel();
        let (progress, _) = watch::channel(Progress::default());
        let progress = Arc::new(progress);
        let drain = tokio::spawn(drain(pending, progress.clone()).instrument(queue_span()))
            .abort_handle();

        Self {
            tasks,
            progress,
            next_seq: AtomicU64::new(0),
            drain,
        }
    }

    /// Append `action`, to run `delay` after the previous task advanced.
    ///
    /// On an idle queue the delay starts now.
    pub fn add<F>(&self, action: F, delay: Duration) -> Result<(), QueueError>
    where
        F: FnOnce(Advance) + Send + 'static,
    {
        self.progress.borrow().check()?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.progress.send_modify(|p| p.pending += 1);

        let task = ScheduledTask {
            seq,
            delay,
            action: Box::new(action),
        };
        if self.tasks.send(task).is_err() {
            self.progress
                .send_modify(|p| p.pending = p.pending.saturating_sub(1));
            self.progress.borrow().check()?;
            return Err(QueueError::Closed);
        }

        trace!(seq, delay_us = as_micros_u64(delay), "task scheduled");
        Ok(())
    }

    /// Append `action` with no delay of its own.
    pub fn add_now<F>(&self, action: F) -> Result<(), QueueError>
    where
        F: FnOnce(Advance) + Send + 'static,
    {
        self.add(action, Duration::ZERO)
    }

    /// Discard every task that has not started.
    ///
    /// An action that is already running finishes normally; its writes are the
    /// caller's concern. Afterwards [`pending`](Self::pending) is 0 and later
    /// `add` calls fail with [`QueueError::Cancelled`].
    pub fn cancel(&self) {
        let mut discarded = 0;
        self.progress.send_modify(|p| {
            discarded = p.pending;
            p.pending = 0;
            p.cancelled = true;
        });
        self.drain.abort();
        debug!(discarded, "delay queue cancelled");
    }

    /// Tasks added and not yet advanced, including the running one.
    pub fn pending(&self) -> usize {
        self.progress.borrow().pending
    }

    pub fn state(&self) -> QueueState {
        self.progress.borrow().state()
    }

    /// Wait until every task added so far has advanced.
    ///
    /// Returns an error instead of waiting forever when the queue stalls or is
    /// cancelled.
    pub async fn wait_idle(&self) -> Result<(), QueueError> {
        let mut progress = self.progress.subscribe();
        let settled = *progress
            .wait_for(|p| p.pending == 0 || p.stalled || p.cancelled)
            .await
            .map_err(|_| QueueError::Closed)?;
        settled.check()
    }
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DelayQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = *self.progress.borrow();
        f.debug_struct("DelayQueue")
            .field("state", &progress.state())
            .field("pending", &progress.pending)
            .field("next_seq", &self.next_seq.load(Ordering::Relaxed))
            .finish()
    }
}

async fn drain(
    mut tasks: mpsc::UnboundedReceiver<ScheduledTask>,
    progress: Arc<watch::Sender<Progress>>,
) {
    while let Some(ScheduledTask { seq, delay, action }) = tasks.recv().await {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (done, advanced) = oneshot::channel();
        trace!(seq, "running scheduled task");
        if panic::catch_unwind(AssertUnwindSafe(|| action(Advance { seq, done }))).is_err() {
            warn!(seq, "scheduled task panicked");
        }

        if advanced.await.is_err() {
            warn!(seq, "scheduled task never advanced; delay queue stalled");
            progress.send_modify(|p| p.stalled = true);
            return;
        }
        progress.send_modify(|p| p.pending = p.pending.saturating_sub(1));
    }

    trace!("delay queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    type Log = Arc<Mutex<Vec<(u32, Duration)>>>;

    fn record(log: &Log, start: Instant, id: u32) -> impl FnOnce(Advance) + Send + 'static {
        let log = log.clone();
        move |advance| {
            log.lock().unwrap().push((id, start.elapsed()));
            advance.advance();
        }
    }

    fn assert_at(actual: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(2),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn runs_in_submission_order_with_cumulative_delays() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        queue.add(record(&log, start, 0), Duration::from_millis(30)).unwrap();
        queue.add(record(&log, start, 1), Duration::from_millis(10)).unwrap();
        queue.add_now(record(&log, start, 2)).unwrap();
        queue.wait_idle().await.unwrap();

        let log = log.lock().unwrap();
        let ids: Vec<u32> = log.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_at(log[0].1, 30);
        assert_at(log[1].1, 40);
        assert_at(log[2].1, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_counts_from_the_previous_advance() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        // The first action finishes 20ms after it starts.
        queue
            .add_now(|advance| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    advance.advance();
                });
            })
            .unwrap();
        queue.add(record(&log, start, 1), Duration::from_millis(10)).unwrap();
        queue.wait_idle().await.unwrap();

        assert_at(log.lock().unwrap()[0].1, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_task_waits_for_prior_advance() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();
        let (release, released) = oneshot::channel::<()>();

        queue
            .add_now(move |advance| {
                tokio::spawn(async move {
                    let _ = released.await;
                    advance.advance();
                });
            })
            .unwrap();
        queue.add_now(record(&log, start, 1)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(queue.state(), QueueState::Draining);

        release.send(()).unwrap();
        queue.wait_idle().await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_at(log.lock().unwrap()[0].1, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn appends_while_draining_run_after_queued_tasks() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        queue.add(record(&log, start, 0), Duration::from_millis(10)).unwrap();
        queue.add(record(&log, start, 1), Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        queue.add_now(record(&log, start, 2)).unwrap();
        queue.wait_idle().await.unwrap();

        let log = log.lock().unwrap();
        let ids: Vec<u32> = log.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_at(log[2].1, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_queue_times_from_the_add() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.state(), QueueState::Idle);

        queue.add(record(&log, start, 0), Duration::from_millis(10)).unwrap();
        queue.wait_idle().await.unwrap();
        assert_at(log.lock().unwrap()[0].1, 110);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_advance_stalls_the_queue() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        queue.add_now(drop).unwrap();
        queue.add_now(record(&log, start, 1)).unwrap();

        assert_eq!(queue.wait_idle().await, Err(QueueError::Stalled));
        assert_eq!(queue.state(), QueueState::Stalled);
        assert_eq!(
            queue.add_now(record(&log, start, 2)),
            Err(QueueError::Stalled)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_action_stalls_the_queue() {
        let queue = DelayQueue::new();
        queue
            .add_now(|_advance| panic!("action failed"))
            .unwrap();

        assert_eq!(queue.wait_idle().await, Err(QueueError::Stalled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_tasks_that_have_not_started() {
        let log: Log = Arc::default();
        let start = Instant::now();
        let queue = DelayQueue::new();

        queue.add(record(&log, start, 0), Duration::from_millis(10)).unwrap();
        queue.add(record(&log, start, 1), Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(queue.pending(), 1);

        queue.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let ids: Vec<u32> = log.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0]);
        assert_eq!(queue.state(), QueueState::Cancelled);
        assert_eq!(queue.pending(), 0);
        assert_eq!(
            queue.add_now(record(&log, start, 2)),
            Err(QueueError::Cancelled)
        );
        assert_eq!(queue.wait_idle().await, Err(QueueError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_keeps_draining() {
        let log: Log = Arc::default();
        let start = Instant::now();
        {
            let queue = DelayQueue::new();
            queue.add(record(&log, start, 0), Duration::from_millis(5)).unwrap();
            queue.add(record(&log, start, 1), Duration::from_millis(5)).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let ids: Vec<u32> = log.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_reports_submission_position() {
        let seen: Arc<Mutex<Vec<u64>>> = Arc::default();
        let queue = DelayQueue::new();
        for _ in 0..3 {
            let seen = seen.clone();
            queue
                .add_now(move |advance| {
                    seen.lock().unwrap().push(advance.seq());
                    advance.advance();
                })
                .unwrap();
        }
        queue.wait_idle().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
