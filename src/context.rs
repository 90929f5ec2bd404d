//! Tying promises to an external cancellation signal.
//!
//! Cancellation never reaches into a running generator. It only rejects the
//! promises derived from the token, so anything racing against them stops
//! waiting.
use parking_lot::Mutex;
use std::{fmt, sync::Arc};
use tracing::debug;

use crate::{race, Error, Promise, Resolver};

/// A clonable, thread-safe cancellation source. The first cancel wins;
/// later ones are ignored.
#[derive(Clone, Default)]
pub struct CancelToken {
    signal: Arc<Mutex<Signal>>,
}

#[derive(Default)]
struct Signal {
    reason: Option<Error>,
    listeners: Vec<Box<dyn Listener>>,
}

/// A promise waiting for the token to fire.
trait Listener: Send {
    fn fire(self: Box<Self>, reason: Error);
    fn is_abandoned(&self) -> bool;
}

impl<T: Send> Listener for Resolver<T> {
    fn fire(self: Box<Self>, reason: Error) {
        self.reject(reason);
    }

    fn is_abandoned(&self) -> bool {
        Resolver::<T>::is_abandoned(self)
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels with [`Error::Canceled`].
    pub fn cancel(&self) -> bool {
        self.cancel_with(Error::Canceled)
    }

    /// Cancels with a custom reason.
    pub fn cancel_with(&self, reason: Error) -> bool {
        let listeners = {
            let mut signal = self.signal.lock();
            if signal.reason.is_some() {
                return false;
            }
            signal.reason = Some(reason.clone());
            std::mem::take(&mut signal.listeners)
        };
        debug!(listeners = listeners.len(), "token canceled");
        for listener in listeners {
            listener.fire(reason.clone());
        }
        true
    }

    pub fn is_canceled(&self) -> bool {
        self.signal.lock().reason.is_some()
    }

    /// The reason the token was canceled with, if it has been.
    pub fn reason(&self) -> Option<Error> {
        self.signal.lock().reason.clone()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = self.signal.lock();
        f.debug_struct("CancelToken")
            .field("reason", &signal.reason)
            .field("listeners", &signal.listeners.len())
            .finish()
    }
}

/// A promise that never fulfills and rejects with the token's reason once it
/// fires, right away if it already has.
///
/// The token holds only the settling half. If every clone of the token is
/// dropped without firing, the promise stays pending and nothing is left
/// running on its behalf.
pub fn on_cancel<T>(token: &CancelToken) -> Promise<T>
where
    T: Send + 'static,
{
    let mut signal = token.signal.lock();
    if let Some(reason) = &signal.reason {
        return Promise::rejected(reason.clone());
    }
    let (resolver, promise) = Resolver::new();
    signal.listeners.retain(|listener| !listener.is_abandoned());
    signal.listeners.push(Box::new(resolver));
    promise
}

/// Races `promise` against the token. Once either side settles the race
/// stops watching the other.
///
/// ```
/// use promises::{context::{with_cancel, CancelToken}, Resolver};
/// let token = CancelToken::new();
/// let (_resolver, pending) = Resolver::<i32>::new();
/// let guarded = with_cancel(&token, pending);
/// token.cancel();
/// assert!(guarded.wait().unwrap_err().is_canceled());
/// ```
pub fn with_cancel<T>(token: &CancelToken, promise: Promise<T>) -> Promise<T>
where
    T: Clone + Send + 'static,
{
    race([promise, on_cancel(token)])
}
