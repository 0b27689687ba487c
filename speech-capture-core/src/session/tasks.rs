use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cancellation flag whose waiters wake immediately on cancel.
#[derive(Clone, Default)]
pub(crate) struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` unless cancelled first. Returns true if cancelled.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (flag, cvar) = &*self.inner;
        let mut cancelled = flag.lock();
        while !*cancelled {
            if cvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

/// Background threads sharing one cancellation token.
pub(crate) struct TaskGroup {
    token: CancelToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, name: &str, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.into()).spawn(task)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Cancel every task and hand back the handles for joining.
    pub fn cancel(self) -> Vec<JoinHandle<()>> {
        self.token.cancel();
        self.handles
    }
}

/// Join `handles`, skipping the calling thread's own handle.
pub(crate) fn join_all(handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for handle in handles {
        if handle.thread().id() == current {
            continue;
        }
        if handle.join().is_err() {
            log::error!("background task panicked");
        }
    }
}
