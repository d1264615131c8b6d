//! Presentation host: the executor that owns UI-visible work.

pub mod dispatcher;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

pub use dispatcher::ThreadDispatcher;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WindowHandle(pub u64);

/// Theme change forwarded verbatim from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Style {
    pub theme: String,
}

impl Style {
    pub fn new(theme: impl Into<String>) -> Self {
        Self { theme: theme.into() }
    }
}

pub trait PresentationHost: Send + Sync {
    /// Queue `task` on the presentation thread and return immediately.
    fn post(&self, task: Task);

    /// Run `task` on the presentation thread and wait for it. Runs inline
    /// when already on that thread.
    fn invoke(&self, task: Task);

    fn window_handle(&self) -> WindowHandle;
}

/// `invoke` with a return value. `None` if the host dropped the task
/// without running it (host shut down, or the task panicked).
pub fn invoke_with<R, F>(host: &dyn PresentationHost, f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let slot = Arc::new(Mutex::new(None));
    let out = Arc::clone(&slot);
    host.invoke(Box::new(move || {
        *out.lock() = Some(f());
    }));
    let result = slot.lock().take();
    result
}
