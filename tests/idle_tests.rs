use futures_fifo::BoundedFifoQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,futures_fifo=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .finish()
      .try_init()
      .ok();
  });
}

// Submits a task that signals once running and then blocks until `gate` is cancelled.
async fn submit_blocking_task(queue: &BoundedFifoQueue, gate: CancellationToken) {
  let (started_tx, started_rx) = oneshot::channel();
  queue.submit(CancellationToken::new(), move |_| async move {
    let _ = started_tx.send(());
    gate.cancelled().await;
  });
  started_rx.await.unwrap();
}

#[tokio::test]
async fn test_fresh_queue_is_already_idle() {
  setup_tracing_for_test();
  let queue = BoundedFifoQueue::new(1, TokioHandle::current(), "test_idle_fresh").unwrap();
  let signal = queue.idle_signal();
  assert!(signal.is_fired(), "A fresh queue must report idle immediately.");
  assert!(signal.wait_timeout(Duration::from_millis(10)).await);
}

#[tokio::test]
async fn test_idle_signal_fires_when_work_finishes() {
  setup_tracing_for_test();
  let queue = BoundedFifoQueue::new(1, TokioHandle::current(), "test_idle_fires").unwrap();
  let unblock = CancellationToken::new();
  submit_blocking_task(&queue, unblock.clone()).await;

  let idle = queue.idle_signal();
  assert!(!idle.is_fired(), "Queue is marked idle while processing work.");
  assert!(!idle.wait_timeout(Duration::from_millis(20)).await);

  unblock.cancel();
  assert!(idle.wait_timeout(Duration::from_secs(2)).await);

  // A handle requested after draining is also already fired.
  assert!(queue.idle_signal().is_fired());
}

#[tokio::test]
async fn test_idle_signal_is_shared_while_busy() {
  setup_tracing_for_test();
  let queue = BoundedFifoQueue::new(2, TokioHandle::current(), "test_idle_shared").unwrap();
  let unblock = CancellationToken::new();
  submit_blocking_task(&queue, unblock.clone()).await;

  let first = queue.idle_signal();
  submit_blocking_task(&queue, unblock.clone()).await;
  let second = queue.idle_signal();
  assert_eq!(first, second);
  assert_eq!(first.generation(), second.generation());

  unblock.cancel();
  assert!(first.wait_timeout(Duration::from_secs(2)).await);
  assert!(second.is_fired());
}

#[tokio::test]
async fn test_new_busy_period_gets_new_signal() {
  setup_tracing_for_test();
  let queue = BoundedFifoQueue::new(1, TokioHandle::current(), "test_idle_new_period").unwrap();
  let previous = queue.idle_signal();
  assert!(previous.is_fired());

  let unblock = CancellationToken::new();
  submit_blocking_task(&queue, unblock.clone()).await;

  let current = queue.idle_signal();
  assert_ne!(current, previous);
  assert!(current.generation() > previous.generation());
  assert!(previous.is_fired(), "A fired signal never resets.");
  assert!(!current.is_fired());

  unblock.cancel();
  assert!(current.wait_timeout(Duration::from_secs(2)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_waiters_are_woken_once_backlog_drains() {
  setup_tracing_for_test();
  let queue = BoundedFifoQueue::new(2, TokioHandle::current(), "test_idle_many_waiters").unwrap();
  let unblock = CancellationToken::new();
  let finished = Arc::new(parking_lot::Mutex::new(0usize));

  for _ in 0..6 {
    let gate = unblock.clone();
    let finished = finished.clone();
    queue.submit(CancellationToken::new(), move |_| async move {
      gate.cancelled().await;
      *finished.lock() += 1;
    });
  }
  assert_eq!(queue.backlog_len(), 4);

  let mut waiters = Vec::new();
  for _ in 0..8 {
    let signal = queue.idle_signal();
    let finished = finished.clone();
    waiters.push(tokio::spawn(async move {
      signal.wait().await;
      // Idle must be observed only after every task's completion.
      *finished.lock()
    }));
  }

  unblock.cancel();
  for waiter in waiters {
    let seen = tokio::time::timeout(Duration::from_secs(2), waiter)
      .await
      .expect("Idle waiter was never woken.")
      .unwrap();
    assert_eq!(seen, 6);
  }
  assert_eq!(queue.backlog_len(), 0);
  assert!(queue.is_idle());
}
