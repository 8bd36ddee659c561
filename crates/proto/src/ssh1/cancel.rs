//! Cooperative cancellation and I/O deadlines.
//!
//! Every socket operation of a [`Client`](crate::ssh1::client::Client) runs
//! through an [`IoGuard`]. The guard races the operation against a
//! [`CancelToken`] and an optional per-operation deadline:
//!
//! - token fired while the guard is cancellable: [`RetroError::Cancelled`]
//! - deadline elapsed: [`RetroError::Io`] with [`std::io::ErrorKind::TimedOut`]
//!
//! The client switches cancellation off while it negotiates keys and sends
//! the user name, so a half-finished handshake is never abandoned, and back
//! on before the password goes out.
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::cancel::{CancelToken, IoGuard};
//! use retrossh_platform::RetroError;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let token = CancelToken::new();
//! let guard = IoGuard::new(token.clone(), None);
//!
//! token.cancel();
//! let result = guard.run(async { Ok::<_, RetroError>(()) }).await;
//! assert!(matches!(result, Err(RetroError::Cancelled)));
//! # }
//! ```

use retrossh_platform::{RetroError, RetroResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Once cancelled a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token and wakes every pending guarded operation.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Completes once the token has fired.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Wraps I/O futures with cancellation and a deadline.
#[derive(Debug, Clone)]
pub struct IoGuard {
    token: CancelToken,
    timeout: Option<Duration>,
    cancellable: Arc<AtomicBool>,
}

impl IoGuard {
    /// Creates a guard; cancellation starts enabled.
    pub fn new(token: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            timeout,
            cancellable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the token this guard observes.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns the per-operation deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Enables or disables cancellation for this guard and all its clones.
    pub fn set_cancellable(&self, cancellable: bool) {
        self.cancellable.store(cancellable, Ordering::SeqCst);
    }

    /// Whether a fired token currently aborts guarded operations.
    pub fn is_cancellable(&self) -> bool {
        self.cancellable.load(Ordering::SeqCst)
    }

    /// Runs `fut` under the guard.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Cancelled`] if the token fires while the guard is
    /// cancellable, a timed-out [`RetroError::Io`] if the deadline passes, or
    /// whatever `fut` itself returns.
    pub async fn run<F, T>(&self, fut: F) -> RetroResult<T>
    where
        F: Future<Output = RetroResult<T>>,
    {
        if self.is_cancellable() && self.token.is_cancelled() {
            return Err(RetroError::Cancelled);
        }

        let guarded = async {
            if self.is_cancellable() {
                tokio::select! {
                    result = fut => result,
                    _ = self.token.cancelled() => Err(RetroError::Cancelled),
                }
            } else {
                fut.await
            }
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded).await.map_err(|_| {
                RetroError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("I/O timed out after {:?}", limit),
                ))
            })?,
            None => guarded.await,
        }
    }
}
