//! Waker implementation for suspended tasks.
//!
//! Waking a task, from any thread, re-enqueues it on its owning dispatcher at
//! [`COMPLETION_PRIORITY`] and cancels the loop's idle wait. The task itself is only
//! ever polled by that dispatcher's loop, never by the waking thread.

use crate::task::{COMPLETION_PRIORITY, Task};

use std::sync::Arc;
use std::task::Wake;

impl Wake for Task {
    fn wake(self: Arc<Self>) {
        self.schedule(COMPLETION_PRIORITY);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule(COMPLETION_PRIORITY);
    }
}
