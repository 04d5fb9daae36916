use thiserror::Error;

/// Errors that can occur within a `futures_fifo` queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
  #[error("Queue capacity must be at least 1 (got {0})")]
  InvalidCapacity(usize),

  /// A task panicked while running. The worker recovers from this and keeps
  /// draining the backlog, so the error is only ever logged and counted.
  #[error("Task {task_id} panicked during execution: {message}")]
  TaskPanicked { task_id: u64, message: String },
}
