//! Cooperative, priority-ordered task dispatcher.
//!
//! A [`Dispatcher`] runs operations on a single owning thread while accepting work from
//! any thread. Operations are queued at a [`Priority`] and run strictly by priority,
//! FIFO within a level; a running operation is never preempted.
//!
//! # Architecture
//!
//! - **Dispatcher**: Public handle; submission, lifecycle and thread-access checks
//! - **OperationQueue**: Thread-safe priority buckets of ready operations
//! - **TimerQueue**: Thread-safe store of operations keyed by due-time
//! - **ExecutorLoop**: Single-consumer loop merging both queues, with a cancelable idle wait
//! - **Task**: Suspension-capable operation whose waker re-enqueues it on its dispatcher
//! - **YieldNow / Delay**: Suspension points for code running inside a dispatcher
//! - **DispatcherBuilder**: Fluent builder for unstarted or spawned dispatchers
//!
//! # Example
//! ```ignore
//! use dispatcher::{Dispatcher, Priority};
//!
//! let dispatcher = Dispatcher::spawn()?;
//! dispatcher.dispatch_with(Priority::Low, || println!("background"));
//! let answer = dispatcher.invoke(|| 6 * 7)?;
//! dispatcher.stop();
//! ```

mod builder;
mod error;
mod priority;
mod runtime;
mod task;
mod timer;

pub use builder::DispatcherBuilder;
pub use error::{DispatchError, Result};
pub use priority::Priority;
pub use runtime::{Dispatcher, OperationQueue, YieldNow, yield_now};
pub use task::DispatcherOperation;
pub use timer::{Delay, TimerQueue, delay};
