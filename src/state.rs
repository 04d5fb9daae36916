//! The mutable record shared by every operation on a queue.
//!
//! `QueueState` is a plain state machine with no locking or spawning of its
//! own. The queue wraps it in a mutex and acts on the decisions it returns.
//! Keeping it free of runtime concerns lets the admission, hand-off and idle
//! rules be tested directly.

use crate::idle::IdleSignal;

use std::collections::VecDeque;

/// What `submit` must do with a newly admitted item.
#[derive(Debug)]
pub(crate) enum Admission<T> {
  /// A slot was free: the caller must start a worker for the item.
  Start(T),
  /// All slots are busy: the item was appended to the backlog.
  Queued { backlog_len: usize },
}

/// What a worker must do after finishing an item.
#[derive(Debug)]
pub(crate) enum Handoff<T> {
  /// Run the next backlog item on the same worker.
  Continue(T),
  /// The backlog is empty and the worker gave up its slot.
  Retire { now_idle: bool },
}

/// How a task finished, for bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
  Completed,
  Panicked,
}

/// A point-in-time snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
  /// Maximum number of concurrently running tasks.
  pub capacity: usize,
  /// Tasks running right now.
  pub active: usize,
  /// Tasks waiting for a free slot.
  pub backlog: usize,
  /// Tasks that ran to completion.
  pub completed: u64,
  /// Tasks that panicked and were recovered.
  pub panicked: u64,
}

#[derive(Debug)]
pub(crate) struct QueueState<T> {
  max_active: usize,
  active: usize,
  backlog: VecDeque<T>,
  idle: Option<IdleSignal>,
  next_generation: u64,
  completed: u64,
  panicked: u64,
}

impl<T> QueueState<T> {
  pub(crate) fn new(max_active: usize) -> Self {
    Self {
      max_active,
      active: 0,
      backlog: VecDeque::new(),
      idle: None,
      next_generation: 0,
      completed: 0,
      panicked: 0,
    }
  }

  /// Takes a slot for `item` or appends it to the backlog.
  pub(crate) fn admit(&mut self, item: T) -> Admission<T> {
    if self.active == self.max_active {
      self.backlog.push_back(item);
      return Admission::Queued {
        backlog_len: self.backlog.len(),
      };
    }

    if self.active == 0 {
      // Leaving idle: a fired signal must not be handed out again.
      self.idle = None;
    }
    self.active += 1;
    Admission::Start(item)
  }

  /// Records a finished item and decides the worker's next step.
  pub(crate) fn finish(&mut self, outcome: TaskOutcome) -> Handoff<T> {
    match outcome {
      TaskOutcome::Completed => self.completed += 1,
      TaskOutcome::Panicked => self.panicked += 1,
    }

    if let Some(next) = self.backlog.pop_front() {
      return Handoff::Continue(next);
    }

    self.active -= 1;
    let now_idle = self.active == 0;
    if now_idle {
      if let Some(signal) = &self.idle {
        signal.fire();
      }
    }
    Handoff::Retire { now_idle }
  }

  /// Returns the current idle signal, creating it on first request.
  pub(crate) fn idle_signal(&mut self) -> IdleSignal {
    if let Some(signal) = &self.idle {
      return signal.clone();
    }

    let signal = IdleSignal::new(self.next_generation);
    self.next_generation += 1;
    if self.active == 0 {
      signal.fire();
    }
    self.idle = Some(signal.clone());
    signal
  }

  pub(crate) fn backlog_len(&self) -> usize {
    self.backlog.len()
  }

  pub(crate) fn active(&self) -> usize {
    self.active
  }

  pub(crate) fn stats(&self) -> QueueStats {
    QueueStats {
      capacity: self.max_active,
      active: self.active,
      backlog: self.backlog.len(),
      completed: self.completed,
      panicked: self.panicked,
    }
  }
}
