//! Cancellation tokens.
//!
//! A [`CancelToken`] is a one-shot, idempotent signal. Tokens form a tree:
//! cancelling a token cancels every descendant, never an ancestor. The
//! signal is exposed as a channel that disconnects on cancellation, so it
//! composes with any other channel inside `crossbeam_channel::select!`.
//!
//! # Example
//!
//! ```
//! use crossbeam_channel::select;
//! use oneway::CancelToken;
//!
//! let parent = CancelToken::new();
//! let child = parent.child();
//!
//! parent.cancel();
//! select! {
//!     recv(child.done()) -> _ => assert!(child.is_cancelled()),
//! }
//! ```

use crate::error::CancelError;
use crossbeam_channel::{at, bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

struct Inner {
    state: Mutex<State>,
    done: Receiver<Infallible>,
}

struct State {
    /// Dropped on cancellation, which disconnects `done`.
    trigger: Option<Sender<Infallible>>,
    reason: Option<CancelError>,
    children: Vec<Weak<Inner>>,
}

impl Inner {
    fn new() -> Self {
        let (trigger, done) = bounded(0);
        Self {
            state: Mutex::new(State {
                trigger: Some(trigger),
                reason: None,
                children: Vec::new(),
            }),
            done,
        }
    }

    /// Returns true only for the call that performed the transition.
    fn cancel(&self, reason: CancelError) -> bool {
        let (trigger, children) = {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason);
            (state.trigger.take(), std::mem::take(&mut state.children))
        };

        drop(trigger);
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason);
        }
        true
    }
}

/// A cloneable cancellation signal shared by everyone holding a clone.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a root token that is not cancelled.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Create a token that is cancelled whenever `self` is.
    ///
    /// If `self` is already cancelled the child starts out cancelled with
    /// the same reason.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();

        let inherited = {
            let mut state = self.inner.state.lock();
            match state.reason {
                Some(reason) => Some(reason),
                None => {
                    state.children.retain(|c| c.strong_count() > 0);
                    state.children.push(Arc::downgrade(&child.inner));
                    None
                }
            }
        };

        if let Some(reason) = inherited {
            child.inner.cancel(reason);
        }
        child
    }

    /// Create a child that also cancels itself with
    /// [`CancelError::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(&self, deadline: Instant) -> CancelToken {
        let child = self.child();
        if child.is_cancelled() {
            return child;
        }

        let weak = Arc::downgrade(&child.inner);
        let done = child.inner.done.clone();
        let spawned = thread::Builder::new()
            .name("cancel-deadline".to_string())
            .spawn(move || {
                select! {
                    recv(done) -> _ => {}
                    recv(at(deadline)) -> _ => {
                        if let Some(inner) = weak.upgrade() {
                            inner.cancel(CancelError::DeadlineExceeded);
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            warn!(error = %e, "could not spawn deadline watchdog, cancelling now");
            child.inner.cancel(CancelError::DeadlineExceeded);
        }
        child
    }

    /// Shorthand for `with_deadline(Instant::now() + timeout)`.
    pub fn with_timeout(&self, timeout: Duration) -> CancelToken {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancel this token and all of its descendants.
    ///
    /// Returns true if this call cancelled the token, false if it was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        self.inner.cancel(CancelError::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().reason.is_some()
    }

    /// Why the token fired, or `None` while it is still live.
    pub fn reason(&self) -> Option<CancelError> {
        self.inner.state.lock().reason
    }

    /// Channel that becomes ready (disconnected) once the token is cancelled.
    ///
    /// Never yields a value; use it as a `recv` arm in `select!`.
    pub fn done(&self) -> &Receiver<Infallible> {
        &self.inner.done
    }

    /// Block until the token is cancelled.
    pub fn wait(&self) {
        let _ = self.inner.done.recv();
    }

    /// Block until the token is cancelled or `timeout` elapses.
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let _ = self.inner.done.recv_timeout(timeout);
        self.is_cancelled()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}
