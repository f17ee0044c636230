//! Hand-off of work onto the host's primary execution context
//!
//! Background checks must not touch host state directly. They post a closure
//! through a [`MainQueueHandle`]; the host drains its [`MainQueue`] on the
//! primary thread. Every posted action runs at most once, and its outcome
//! (including a panic) is delivered to whoever awaits the [`Completion`].
//!
//! ```rust
//! use tamperguard_core::dispatch::MainQueue;
//!
//! let queue = MainQueue::new();
//! let completion = queue.handle().invoke(|| 21 * 2);
//!
//! assert_eq!(queue.run_pending(), 1);
//! assert_eq!(completion.wait().unwrap(), 42);
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a dispatched action produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The queue was dropped before the action ran
    #[error("main queue closed before the action ran")]
    Closed,

    /// The action panicked on the primary context
    #[error("dispatched action panicked: {0}")]
    Panicked(String),
}

/// Queue owned by the host's primary thread
pub struct MainQueue {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<Job>,
}

impl MainQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Handle that background contexts use to post work
    pub fn handle(&self) -> MainQueueHandle {
        MainQueueHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run every action currently queued; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one action and run it
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender side of a [`MainQueue`]
#[derive(Clone)]
pub struct MainQueueHandle {
    sender: mpsc::Sender<Job>,
}

impl MainQueueHandle {
    /// Post `action` to the primary context
    pub fn invoke<F, T>(&self, action: F) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(action))
                .map_err(|payload| DispatchError::Panicked(panic_message(payload.as_ref())));
            if let Err(ref err) = outcome {
                tracing::warn!(error = %err, "Action failed on main queue");
            }
            let _ = tx.send(outcome);
        });

        // A failed send drops the job and with it `tx`, so the completion
        // resolves to `Closed`.
        if self.sender.send(job).is_err() {
            tracing::debug!("Main queue closed, dropping dispatched action");
        }

        Completion { rx }
    }
}

/// Pending result of a dispatched action
///
/// Await it from async code or call [`Completion::wait`] from a plain thread.
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, DispatchError>>,
}

impl<T> Completion<T> {
    /// Block the current thread until the action has run.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T, DispatchError> {
        self.rx.blocking_recv().unwrap_or(Err(DispatchError::Closed))
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Closed)))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
