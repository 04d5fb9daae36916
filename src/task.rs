use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio_util::sync::CancellationToken;

lazy_static::lazy_static! {
  static ref NEXT_QUEUED_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// The type of future a queued task produces once it is handed its context.
/// Tasks report nothing back to the queue, so the output is `()`.
pub type TaskToExecute = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type TaskFn = Box<dyn FnOnce(CancellationToken) -> TaskToExecute + Send + 'static>;

/// Internal representation of a task waiting in the backlog or running on a worker.
pub(crate) struct QueuedTask {
  pub(crate) task_id: u64,
  pub(crate) ctx: CancellationToken,
  run: TaskFn,
}

impl fmt::Debug for QueuedTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueuedTask")
      .field("task_id", &self.task_id)
      .field("ctx_cancelled", &self.ctx.is_cancelled())
      .finish_non_exhaustive()
  }
}

impl QueuedTask {
  pub(crate) fn new<F, Fut>(ctx: CancellationToken, task: F) -> Self
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    Self {
      task_id: NEXT_QUEUED_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      ctx,
      run: Box::new(move |ctx| Box::pin(task(ctx)) as TaskToExecute),
    }
  }

  /// Consumes the task, yielding its id and a future that invokes the closure
  /// with the submitted context when first polled. Deferring the call keeps a
  /// panic in the closure body inside the future, where the worker catches it.
  pub(crate) fn into_future(self) -> (u64, TaskToExecute) {
    let Self { task_id, ctx, run } = self;
    (task_id, Box::pin(async move { run(ctx).await }))
  }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
