use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::{PresentationHost, Task, WindowHandle};

static NEXT_WINDOW: AtomicU64 = AtomicU64::new(1);

/// Presentation host backed by one dedicated thread draining a FIFO task
/// queue. Tasks posted from one thread run in the order they were posted.
pub struct ThreadDispatcher {
    tx: Mutex<Option<Sender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    window: WindowHandle,
}

impl ThreadDispatcher {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run(rx, thread_name))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            thread_id: handle.thread().id(),
            thread: Mutex::new(Some(handle)),
            window: WindowHandle(NEXT_WINDOW.fetch_add(1, Ordering::Relaxed)),
        })
    }

    pub fn is_presentation_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Block until every task posted before this call has run.
    pub fn flush(&self) {
        self.invoke(Box::new(|| {}));
    }

    /// Stop accepting tasks, run what is queued, and join the thread.
    pub fn shutdown(&self) {
        self.tx.lock().take();
        if self.is_presentation_thread() {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("Presentation thread terminated abnormally");
            }
        }
    }

    fn sender(&self) -> Option<Sender<Task>> {
        self.tx.lock().clone()
    }
}

fn run(rx: Receiver<Task>, name: String) {
    info!(thread = %name, "Presentation thread started");
    while let Ok(task) = rx.recv() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(thread = %name, "Presentation task panicked");
        }
    }
    info!(thread = %name, "Presentation thread stopped");
}

impl PresentationHost for ThreadDispatcher {
    fn post(&self, task: Task) {
        match self.sender() {
            Some(tx) => {
                if tx.send(task).is_err() {
                    debug!("Presentation thread gone, dropping task");
                }
            }
            None => debug!("Dispatcher shut down, dropping task"),
        }
    }

    fn invoke(&self, task: Task) {
        if self.is_presentation_thread() {
            task();
            return;
        }

        let Some(tx) = self.sender() else {
            debug!("Dispatcher shut down, dropping invoke");
            return;
        };

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let wrapped: Task = Box::new(move || {
            task();
            let _ = done_tx.send(());
        });
        if tx.send(wrapped).is_ok() {
            // Err means the task was dropped or panicked before signalling
            let _ = done_rx.recv();
        }
    }

    fn window_handle(&self) -> WindowHandle {
        self.window
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
