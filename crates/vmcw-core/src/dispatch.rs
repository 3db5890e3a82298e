//! Cross-thread dispatch with a liveness flag.
//!
//! The control channel never touches plugin lifecycle objects itself. It
//! posts closures to a [`Dispatcher`], which runs them one at a time, in
//! submission order, on a dedicated worker thread, and hands back a
//! [`Pending`] the caller can wait on with a bound.
//!
//! Liveness is checked twice: when work is submitted and again right before
//! it runs. After [`Dispatcher::shutdown`] no closure runs; every pending or
//! new dispatch resolves to the shutdown value supplied with it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Receiver, Sender};
use log::{debug, error};
use parking_lot::Mutex;

use crate::error::DispatchError;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a value produced by dispatched work.
#[must_use = "dispatched work reports its result through Pending"]
pub struct Pending<R> {
    rx: Receiver<R>,
}

impl<R> Pending<R> {
    /// Block until the value is available.
    pub fn wait(self) -> Result<R, DispatchError> {
        self.rx.recv().map_err(|_| DispatchError::Disconnected)
    }

    /// Block for at most `timeout`.
    ///
    /// A timeout does not cancel the work. If it runs later its result is
    /// discarded.
    pub fn wait_timeout(self, timeout: Duration) -> Result<R, DispatchError> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(DispatchError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(DispatchError::Disconnected),
        }
    }

    /// Return the value if it is already available.
    pub fn try_get(&self) -> Option<R> {
        self.rx.try_recv().ok()
    }
}

/// Single-worker FIFO dispatcher.
pub struct Dispatcher {
    alive: Arc<AtomicBool>,
    sender: Mutex<Option<Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the worker thread.
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = unbounded::<Task>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for task in receiver {
                    task();
                }
                debug!("Dispatch worker exiting");
            });

        let (sender, worker) = match worker {
            Ok(handle) => (Some(sender), Some(handle)),
            Err(e) => {
                error!("Failed to spawn dispatch worker: {e}");
                (None, None)
            }
        };

        Self {
            alive: Arc::new(AtomicBool::new(sender.is_some())),
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        }
    }

    /// True until [`shutdown`](Self::shutdown) is called.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Post `work` to the worker thread.
    ///
    /// Resolves to `shutdown_value` without running `work` if the dispatcher
    /// is shut down either now or by the time the worker reaches it.
    pub fn dispatch<R, F>(&self, work: F, shutdown_value: R) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = bounded(1);

        if !self.is_alive() {
            let _ = tx.send(shutdown_value);
            return Pending { rx };
        }

        let alive = Arc::clone(&self.alive);
        let task: Task = Box::new(move || {
            if !alive.load(Ordering::Acquire) {
                let _ = tx.send(shutdown_value);
                return;
            }
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(value) => {
                    let _ = tx.send(value);
                }
                // Dropping tx surfaces as Disconnected to the waiter.
                Err(_) => error!("Dispatched work panicked"),
            }
        });

        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if let Err(returned) = sender.send(task) {
                    // Worker is gone, so the liveness check inside resolves it.
                    (returned.into_inner())();
                }
            }
            None => {
                // Shut down between the first check and here.
                drop(sender);
                task();
            }
        }

        Pending { rx }
    }

    /// Post `work` that produces no value. The returned handle completes
    /// whether or not `work` ran.
    pub fn dispatch_void<F>(&self, work: F) -> Pending<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(work, ())
    }

    /// Flip the liveness flag and stop the worker.
    ///
    /// Callable from any thread, any number of times. Work already running
    /// finishes; queued work is resolved without running. When called from
    /// outside the worker this waits for the worker to exit.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        self.sender.lock().take();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Dispatch worker panicked during shutdown");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =========================================================================
// Tests
// =========================================================================
