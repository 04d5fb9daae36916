//! A Tokio-based, concurrency-limited FIFO work queue.
//!
//! At most a fixed number of submitted tasks run at once. The rest wait in a
//! backlog and are released in submission order as running tasks finish.
//! Callers can ask for an idle signal that fires once all work has drained.

mod error;
mod idle;
mod queue;
mod state;
mod task;

pub use error::QueueError;
pub use idle::IdleSignal;
pub use queue::BoundedFifoQueue;
pub use state::QueueStats;
pub use task::TaskToExecute;
