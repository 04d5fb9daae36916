use crate::error::QueueError;
use crate::idle::IdleSignal;
use crate::state::{Admission, Handoff, QueueState, QueueStats, TaskOutcome};
use crate::task::{panic_message, QueuedTask};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, Instrument};

struct QueueInner {
  queue_name: Arc<String>,
  max_active: usize,
  tokio_handle: TokioHandle,
  state: Mutex<QueueState<QueuedTask>>,
}

/// A concurrency-limited FIFO work queue.
///
/// At most `max_active` submitted tasks run at any time. Tasks submitted while
/// every slot is busy wait in a backlog and start in submission order. A
/// worker that finishes a task takes the next backlog item itself, so the
/// queue never spawns more than `max_active` workers.
///
/// The queue is a cheap handle: clones share the same state.
#[derive(Clone)]
pub struct BoundedFifoQueue {
  inner: Arc<QueueInner>,
}

impl BoundedFifoQueue {
  /// Creates a queue that runs at most `max_active` tasks at once, spawning
  /// its workers on `tokio_handle`.
  ///
  /// # Errors
  /// Returns `QueueError::InvalidCapacity` if `max_active` is zero.
  pub fn new(max_active: usize, tokio_handle: TokioHandle, queue_name: &str) -> Result<Self, QueueError> {
    if max_active < 1 {
      return Err(QueueError::InvalidCapacity(max_active));
    }

    debug!(queue = %queue_name, max_active, "Created queue.");
    Ok(Self {
      inner: Arc::new(QueueInner {
        queue_name: Arc::new(queue_name.to_string()),
        max_active,
        tokio_handle,
        state: Mutex::new(QueueState::new(max_active)),
      }),
    })
  }

  pub fn name(&self) -> &str {
    &self.inner.queue_name
  }

  pub fn capacity(&self) -> usize {
    self.inner.max_active
  }

  /// Submits a task. Never blocks and never fails.
  ///
  /// If a slot is free the task starts right away on a new worker. Otherwise
  /// it joins the tail of the backlog. `ctx` is handed to the task unchanged
  /// when it runs; the queue itself never looks at it, so a cancelled context
  /// does not remove the task from the backlog.
  ///
  /// A task that panics is logged and counted, and its worker carries on with
  /// the backlog.
  pub fn submit<F, Fut>(&self, ctx: CancellationToken, task: F)
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let queued = QueuedTask::new(ctx, task);
    let task_id = queued.task_id;

    let admission = self.inner.state.lock().admit(queued);
    match admission {
      Admission::Queued { backlog_len } => {
        debug!(queue = %self.inner.queue_name, %task_id, backlog_len, "All slots busy. Task added to backlog.");
      }
      Admission::Start(first) => {
        debug!(queue = %self.inner.queue_name, %task_id, "Slot available. Spawning worker.");
        let inner = self.inner.clone();
        let span = info_span!("fifo_worker", queue = %self.inner.queue_name);
        self.inner.tokio_handle.spawn(Self::run_worker_loop(inner, first).instrument(span));
      }
    }
  }

  /// Returns a signal that fires once the queue is idle: no task running and
  /// the backlog empty.
  ///
  /// On an idle queue the returned signal has already fired. While the queue
  /// is busy, repeated calls return the same signal.
  pub fn idle_signal(&self) -> IdleSignal {
    self.inner.state.lock().idle_signal()
  }

  /// Returns the number of tasks waiting for a slot. Running tasks are not counted.
  pub fn backlog_len(&self) -> usize {
    self.inner.state.lock().backlog_len()
  }

  pub fn active_count(&self) -> usize {
    self.inner.state.lock().active()
  }

  pub fn is_idle(&self) -> bool {
    self.active_count() == 0
  }

  pub fn stats(&self) -> QueueStats {
    self.inner.state.lock().stats()
  }

  async fn run_worker_loop(inner: Arc<QueueInner>, first: QueuedTask) {
    let queue_name = inner.queue_name.clone();
    let mut next = first;

    loop {
      let (task_id, task_future) = next.into_future();

      let outcome = match AssertUnwindSafe(task_future)
        .catch_unwind()
        .instrument(info_span!("queued_task", %task_id))
        .await
      {
        Ok(()) => {
          trace!(queue = %*queue_name, %task_id, "Task executed successfully.");
          TaskOutcome::Completed
        }
        Err(panic_payload) => {
          let err = QueueError::TaskPanicked {
            task_id,
            message: panic_message(panic_payload.as_ref()),
          };
          error!(queue = %*queue_name, %task_id, "{}", err);
          TaskOutcome::Panicked
        }
      };

      // The guard is a temporary, so the lock is released before the next task runs.
      let handoff = inner.state.lock().finish(outcome);
      match handoff {
        Handoff::Continue(queued) => {
          trace!(queue = %*queue_name, finished = %task_id, next = %queued.task_id, "Handing off to next backlog task.");
          next = queued;
        }
        Handoff::Retire { now_idle } => {
          debug!(queue = %*queue_name, "Backlog empty. Worker retiring.");
          if now_idle {
            info!(queue = %*queue_name, "Queue is idle.");
          }
          return;
        }
      }
    }
  }
}

impl std::fmt::Debug for BoundedFifoQueue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BoundedFifoQueue")
      .field("name", &self.inner.queue_name)
      .field("stats", &self.stats())
      .finish()
  }
}
