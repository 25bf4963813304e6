//! Serialized task execution for one sensorfw backend.
//!
//! Session calls must never overlap: enable and disable for a class are
//! totally ordered, and the bus dispatch context cannot run them inline
//! without stalling on sensorfw round trips. One dedicated worker thread
//! per backend executes submitted tasks strictly in submission order;
//! callers await a completion handle to get synchronous semantics back.

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ProxyError, Result};

type Task = Box<dyn FnOnce() + Send>;

/// Handle used to wait for one enqueued task to finish.
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Wait until the task ran and yield its result.
    ///
    /// `WorkerGone` means the worker terminated before running the task.
    pub async fn wait(self) -> Result<T> {
        self.rx.await.map_err(|_| ProxyError::WorkerGone)
    }
}

/// One dedicated worker thread executing tasks in submission order.
pub struct EventLoop {
    tx: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl EventLoop {
    /// Spawn the worker thread; `name` shows up in thread listings.
    pub fn spawn(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = format!("sensorfw-{name}");
        let worker = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!("[{}] worker started", thread_name);
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                debug!("[{}] worker stopped", thread_name);
            })
            .expect("Failed to spawn sensor worker thread");

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a task; the returned handle resolves once it has run.
    pub fn enqueue<T, F>(&self, f: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let task: Task = Box::new(move || {
            // The caller may have stopped waiting; that is fine.
            let _ = done_tx.send(f());
        });

        match self.tx.lock().as_ref() {
            Some(tx) => {
                if tx.send(task).is_err() {
                    warn!("sensor worker is gone, dropping task");
                }
            }
            None => warn!("sensor worker already stopped, dropping task"),
        }
        Completion { rx: done_rx }
    }

    /// Stop accepting tasks, drain what is queued and join the worker.
    pub fn stop(&self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("sensor worker panicked during shutdown");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
