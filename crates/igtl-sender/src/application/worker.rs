//! Single sequential execution lane.
//!
//! A [`Worker`] owns one OS thread driving a current-thread Tokio runtime.
//! Commands posted with [`Worker::post`] are delivered to the lane body in
//! strict FIFO order; the body decides how to run them.  Because only one
//! task ever runs on the lane, state owned by the body needs no locking.
//!
//! # Lifetime
//!
//! ```text
//! spawn() ──► running ──close_with(last)──► closing ──body returns──► gone
//!               ▲ post() Ok                 post() Err(Unavailable)
//! ```
//!
//! Commands still queued when the body returns are dropped together with the
//! receiver.

use std::future::Future;
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Errors raised by the worker lane.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The lane has been closed or its thread has exited.
    #[error("worker lane is no longer accepting commands")]
    Unavailable,

    /// The lane runtime could not be built.
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The lane thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Handle to a dedicated FIFO lane accepting commands of type `C`.
pub struct Worker<C> {
    name: String,
    tx: mpsc::UnboundedSender<C>,
    // Held for reading across each post so no command can slip in behind the
    // final one.
    closed: RwLock<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> Worker<C> {
    /// Spawns the lane thread and starts `body` on it.
    ///
    /// `body` receives the command queue and runs until it returns.  It is
    /// polled on a current-thread runtime, so the future it returns need not
    /// be `Send`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if the thread cannot be created and
    /// [`WorkerError::Runtime`] if the lane runtime fails to build.
    pub fn spawn<F, Fut>(name: impl Into<String>, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(mpsc::UnboundedReceiver<C>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        // The runtime is built on the lane thread; the caller waits only for
        // the build result.
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => {
                        let _ = ready_tx.send(Ok(()));
                        rt
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                debug!("worker lane {thread_name} started");
                runtime.block_on(body(rx));
                debug!("worker lane {thread_name} finished");
            })
            .map_err(WorkerError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(WorkerError::Runtime(e));
            }
            Err(_) => {
                error!("worker lane {name} exited before reporting readiness");
                let _ = handle.join();
                return Err(WorkerError::Unavailable);
            }
        }

        Ok(Self {
            name,
            tx,
            closed: RwLock::new(false),
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl<C> Worker<C> {
    /// Returns the lane (and thread) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues `command` behind everything posted before it.
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Unavailable`] once the lane is closing or gone.
    pub fn post(&self, command: C) -> Result<(), WorkerError> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(WorkerError::Unavailable);
        }
        self.tx.send(command).map_err(|_| WorkerError::Unavailable)
    }

    /// Enqueues a final command and refuses every later [`post`](Self::post).
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Unavailable`] if the lane was already closed.
    pub fn close_with(&self, last: C) -> Result<(), WorkerError> {
        let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(WorkerError::Unavailable);
        }
        *closed = true;
        self.tx.send(last).map_err(|_| WorkerError::Unavailable)
    }

    /// Returns `true` while the lane accepts commands.
    pub fn is_available(&self) -> bool {
        let closed = *self.closed.read().unwrap_or_else(PoisonError::into_inner);
        !closed && !self.tx.is_closed()
    }

    /// Blocks until the lane thread exits.
    ///
    /// Does nothing when called a second time or from the lane thread itself.
    pub fn join(&self) {
        let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = guard.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Joining from the lane itself would deadlock.
            return;
        }
        drop(guard);
        if handle.join().is_err() {
            error!("worker lane {} panicked", self.name);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
