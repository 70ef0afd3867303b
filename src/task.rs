//! Cancellable asynchronous tasks.
//!
//! A [`CancellableTask`] wraps a future together with a cooperative
//! cancellation signal. The executor closure receives a [`CancelSignal`] and
//! is expected to inspect it at each of its suspension points; the task itself
//! resolves to `Err(TaskError::Cancelled)` as soon as the signal is set, unless
//! it has already settled.
//!
//! # Example
//!
//! ```rust
//! use formcheck::task::{CancellableTask, TaskError};
//!
//! # tokio_test::block_on(async {
//! let task = CancellableTask::new(|_signal| async { Ok::<_, TaskError>(42) });
//! assert_eq!(task.await, Ok(42));
//!
//! let task = CancellableTask::new(|_signal| async {
//!     std::future::pending::<()>().await;
//!     Ok::<_, TaskError>(0)
//! });
//! task.cancel();
//! assert_eq!(task.await, Err(TaskError::Cancelled));
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

pub use crate::error::TaskError;

/// Read side of a task's cancellation signal.
///
/// Cheap to clone; every clone observes the same signal.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    /// Whether the owning task has been cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the owning task is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Cancel-only view of a running [`CancellableTask`].
///
/// Invalidators keep one of these for their most recent run so that a newer
/// check can cancel it without owning the task's future.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    /// Set the cancellation signal. No-op if the task already settled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// An asynchronous unit of work that can be cancelled from outside.
///
/// Awaiting the task yields the executor's result, or
/// `Err(TaskError::Cancelled)` if the signal was set first.
pub struct CancellableTask<T> {
    token: CancellationToken,
    future: BoxFuture<'static, Result<T, TaskError>>,
}

impl<T: Send + 'static> CancellableTask<T> {
    /// Create a task from an executor.
    ///
    /// The executor is called immediately with the task's signal; the future
    /// it returns only makes progress once the task is polled.
    pub fn new<F, Fut>(executor: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let work = executor(CancelSignal {
            token: token.clone(),
        });
        let guard = token.clone();

        let future = async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => Err(TaskError::Cancelled),
                result = work => result,
            }
        }
        .boxed();

        Self { token, future }
    }
}

impl<T> CancellableTask<T> {
    /// Cancel the task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A handle that can cancel this task after it has been moved away.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            token: self.token.clone(),
        }
    }
}

impl<T> Future for CancellableTask<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for CancellableTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableTask")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
