use futures_fifo::BoundedFifoQueue;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn long_task_fn(id: usize, ctx: CancellationToken) {
  info!("Task {} starting (concurrency demo - should take 1s)", id);
  tokio::select! {
    _ = ctx.cancelled() => info!("Task {} saw its context cancelled, stopping early", id),
    _ = tokio::time::sleep(Duration::from_secs(1)) => info!("Task {} finished", id),
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Concurrency Limit Demo (Limit: 2) ---");

  let concurrency_limit = 2;
  let queue = match BoundedFifoQueue::new(concurrency_limit, Handle::current(), "concurrency_queue") {
    Ok(queue) => queue,
    Err(e) => {
      tracing::error!("Failed to create queue: {}", e);
      return;
    }
  };

  let num_tasks = 5;
  info!(
    "Submitting {} tasks, each takes 1 sec. With concurrency {}, this should take ~{} secs.",
    num_tasks,
    concurrency_limit,
    (num_tasks as f32 / concurrency_limit as f32).ceil()
  );

  let ctx = CancellationToken::new();
  for i in 0..num_tasks {
    queue.submit(ctx.clone(), move |ctx| long_task_fn(i, ctx));
  }
  info!("Backlog after submission: {}", queue.backlog_len());

  queue.idle_signal().wait().await;

  info!("All tasks processed. Stats: {:?}", queue.stats());
  info!("--- Concurrency Limit Demo End ---");
}
