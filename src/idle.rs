use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

struct IdleLatch {
  generation: u64,
  fired: CancellationToken,
}

/// A one-shot notification that a queue has become idle.
///
/// A signal fires at most once and never resets. When the queue leaves the
/// idle state it forgets the fired signal, and the next call to
/// `BoundedFifoQueue::idle_signal` hands out a new one with a higher
/// generation. Clones share the same latch, and any number of tasks may wait
/// on it concurrently.
#[derive(Clone)]
pub struct IdleSignal {
  inner: Arc<IdleLatch>,
}

impl IdleSignal {
  pub(crate) fn new(generation: u64) -> Self {
    Self {
      inner: Arc::new(IdleLatch {
        generation,
        fired: CancellationToken::new(),
      }),
    }
  }

  /// Marks the signal fired, waking every waiter. Firing twice is a no-op.
  pub(crate) fn fire(&self) {
    self.inner.fired.cancel();
  }

  /// The sequence number of this signal within its queue.
  pub fn generation(&self) -> u64 {
    self.inner.generation
  }

  /// Returns `true` once the queue has drained since this signal was created.
  pub fn is_fired(&self) -> bool {
    self.inner.fired.is_cancelled()
  }

  /// Waits until the signal fires. Returns immediately if it already has.
  pub async fn wait(&self) {
    self.inner.fired.cancelled().await;
  }

  /// Waits up to `timeout` for the signal. Returns whether it fired.
  pub async fn wait_timeout(&self, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, self.wait()).await.is_ok()
  }
}

impl PartialEq for IdleSignal {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Eq for IdleSignal {}

impl fmt::Debug for IdleSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IdleSignal")
      .field("generation", &self.generation())
      .field("fired", &self.is_fired())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_fire_wakes_all_waiters() {
    let signal = IdleSignal::new(0);
    let mut waiters = Vec::new();
    for _ in 0..4 {
      let s = signal.clone();
      waiters.push(tokio::spawn(async move { s.wait().await }));
    }

    assert!(!signal.is_fired());
    signal.fire();
    for waiter in waiters {
      tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter was not woken")
        .unwrap();
    }
    assert!(signal.is_fired());
  }

  #[tokio::test]
  async fn test_wait_timeout_reports_unfired() {
    let signal = IdleSignal::new(3);
    assert!(!signal.wait_timeout(Duration::from_millis(20)).await);
    signal.fire();
    signal.fire();
    assert!(signal.wait_timeout(Duration::from_millis(20)).await);
    assert_eq!(signal.generation(), 3);
  }

  #[test]
  fn test_equality_is_identity() {
    let a = IdleSignal::new(1);
    let b = IdleSignal::new(1);
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
  }
}
