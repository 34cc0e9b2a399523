//! Runtime subsystem modules.

pub(crate) mod context;
mod dispatcher;
pub(crate) mod driver;
pub(crate) mod executor;
pub(crate) mod queue;
mod waker;
pub mod yield_now;

pub use dispatcher::Dispatcher;
pub use queue::OperationQueue;
pub use yield_now::{YieldNow, yield_now};
