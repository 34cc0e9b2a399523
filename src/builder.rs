//! Fluent builder for Dispatcher construction.
//!
//! Provides a builder pattern interface for creating and configuring Dispatcher
//! instances, either unstarted or running on their own thread.

use crate::error::Result;
use crate::runtime::Dispatcher;
use crate::runtime::driver;

const DEFAULT_NAME: &str = "dispatcher";

/// Builder for constructing [`Dispatcher`] instances with a fluent API.
///
/// # Example
/// ```ignore
/// let ui = DispatcherBuilder::new().name("ui").spawn()?;
/// ui.dispatch(|| println!("running on the ui thread"));
/// ```
#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    name: String,
    stack_size: Option<usize>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    /// Creates a new dispatcher builder with default settings.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            stack_size: None,
        }
    }

    /// Sets the dispatcher name, used in log fields and as the spawned thread's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the stack size of the thread created by [`spawn`](Self::spawn).
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn thread_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn thread_stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    /// Builds an unstarted dispatcher.
    ///
    /// Work may be submitted right away; it runs once some thread calls
    /// [`Dispatcher::start`] or [`Dispatcher::execute`].
    pub fn build(&self) -> Dispatcher {
        Dispatcher::with_name(self.name.clone())
    }

    /// Builds a dispatcher and starts it on a dedicated thread.
    ///
    /// Returns the handle immediately; stop the loop with [`Dispatcher::stop`].
    pub fn spawn(&self) -> Result<Dispatcher> {
        driver::spawn_worker(self.build(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let dispatcher = DispatcherBuilder::new().build();

        assert_eq!(dispatcher.name(), "dispatcher");
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_builder_name_is_used() {
        let dispatcher = DispatcherBuilder::new().name("render").build();
        assert_eq!(dispatcher.name(), "render");
    }

    #[test]
    fn test_spawned_thread_uses_name() {
        let dispatcher = DispatcherBuilder::new()
            .name("worker-7")
            .stack_size(256 * 1024)
            .spawn()
            .unwrap();

        let thread_name = dispatcher
            .invoke(|| std::thread::current().name().map(str::to_string))
            .unwrap();
        dispatcher.stop();

        assert_eq!(thread_name.as_deref(), Some("worker-7"));
    }
}
