//! Request dispatch: the shared queue, the worker loop and the worker pool.

mod delivery;
mod error;
mod pool;
mod priority;
mod queue;
mod worker;

pub use delivery::{Delivery, ExecutorDelivery};
pub use error::DispatchError;
pub use pool::{DispatchPool, DispatchPoolConfig, WorkerStartHook};
pub use priority::Priority;
pub use queue::{RequestQueue, RequestQueueConfig, Take};
