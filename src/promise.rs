use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::{future::Future, task::{Context, Poll, Waker}};
use tracing::trace;

use crate::{runtime, Error, Result};

/// A settle-once promise. It can be cloned and awaited (or waited on) by many
/// consumers. Every consumer sees the same outcome.
///
/// # Examples
///
/// ```
/// use promises::{Promise, Resolver};
/// use futures::executor::block_on;
/// use std::thread;
/// let (resolver, promise) = Resolver::<String>::new();
/// let promise2 = promise.clone();
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received on task 1 {:?}",  promise.await);
/// }));
/// let task2 = thread::spawn(move || promise2.wait());
/// resolver.resolve("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// assert_eq!(task2.join().unwrap(), Ok("Hi".to_string()));
/// ```
pub struct Promise<T> {
    promise: Arc<Mutex<Inner<T>>>,
    waiter: Option<usize>,
}

/// The settling half of a promise. Clones share the same settlement right:
/// the first `resolve` or `reject` across all of them wins.
pub struct Resolver<T> {
    promise: Arc<Mutex<Inner<T>>>,
}

/// Completion signal of a promise. Resolves to `()` once the promise is
/// settled, without touching its value.
pub struct Settled<T> {
    promise: Arc<Mutex<Inner<T>>>,
    waiter: Option<usize>,
}

enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(Error),
}

struct Inner<T> {
    state: State<T>,
    next_waiter: usize,
    wakers: HashMap<usize, Waker>,
}

impl<T> Inner<T> {
    fn new(state: State<T>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Inner {
            state,
            next_waiter: 0,
            wakers: HashMap::new(),
        }))
    }

    fn is_settled(&self) -> bool {
        !matches!(self.state, State::Pending)
    }
}

/// Registers `cx` under `waiter` until the promise settles.
fn poll_settled<T>(
    promise: &Mutex<Inner<T>>,
    waiter: &mut Option<usize>,
    cx: &mut Context<'_>,
) -> Poll<()> {
    let mut inner = promise.lock();
    if inner.is_settled() {
        return Poll::Ready(());
    }
    let key = match *waiter {
        Some(key) => key,
        None => {
            let key = inner.next_waiter;
            inner.next_waiter += 1;
            *waiter = Some(key);
            key
        }
    };
    match inner.wakers.get_mut(&key) {
        Some(waker) if waker.will_wake(cx.waker()) => {}
        Some(waker) => *waker = cx.waker().clone(),
        None => {
            inner.wakers.insert(key, cx.waker().clone());
        }
    }
    Poll::Pending
}

fn forget_waiter<T>(promise: &Mutex<Inner<T>>, waiter: Option<usize>) {
    if let Some(key) = waiter {
        promise.lock().wakers.remove(&key);
    }
}

impl<T> Resolver<T> {
    /// Creates an unsettled promise together with its resolver.
    pub fn new() -> (Self, Promise<T>) {
        let inner = Inner::new(State::Pending);
        let promise = Promise::from_inner(inner.clone());
        (Self { promise: inner }, promise)
    }

    /// Fulfills the promise. Returns `false` if it was already settled, in
    /// which case `value` is dropped and nothing changes.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(State::Fulfilled(value))
    }

    /// Rejects the promise. Returns `false` if it was already settled.
    pub fn reject(&self, err: Error) -> bool {
        self.settle(State::Rejected(err))
    }

    /// Another handle to the promise this resolver settles.
    pub fn promise(&self) -> Promise<T> {
        Promise::from_inner(self.promise.clone())
    }

    /// True when no promise handle or other resolver is left to observe the
    /// outcome.
    pub(crate) fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.promise) == 1
    }

    fn settle(&self, outcome: State<T>) -> bool {
        let wakers = {
            let mut promise = self.promise.lock();
            if promise.is_settled() {
                return false;
            }
            let fulfilled = matches!(outcome, State::Fulfilled(_));
            promise.state = outcome;
            trace!(fulfilled, waiters = promise.wakers.len(), "promise settled");
            std::mem::take(&mut promise.wakers)
        };
        for (_, waker) in wakers {
            waker.wake()
        }
        true
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.promise.lock().is_settled())
            .finish()
    }
}

impl<T> Promise<T> {
    fn from_inner(promise: Arc<Mutex<Inner<T>>>) -> Self {
        Self {
            promise,
            waiter: None,
        }
    }

    /// A promise that is already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        Self::from_inner(Inner::new(State::Fulfilled(value)))
    }

    /// A promise that is already rejected with `err`.
    pub fn rejected(err: Error) -> Self {
        Self::from_inner(Inner::new(State::Rejected(err)))
    }

    pub fn is_settled(&self) -> bool {
        self.promise.lock().is_settled()
    }

    /// Number of wakers currently parked on this promise.
    pub fn waiters(&self) -> usize {
        self.promise.lock().wakers.len()
    }

    /// The completion signal. It can be combined with other futures in a
    /// `select` without consuming the outcome.
    pub fn settled(&self) -> Settled<T> {
        Settled {
            promise: self.promise.clone(),
            waiter: None,
        }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Returns an unsettled promise and the two functions that settle it.
    /// After the first call to either function, later calls do nothing.
    ///
    /// ```
    /// use promises::{Error, Promise};
    /// let (promise, resolve, reject) = Promise::<i32>::with_resolvers();
    /// resolve(42);
    /// reject(Error::msg("too late"));
    /// assert_eq!(promise.wait(), Ok(42));
    /// ```
    pub fn with_resolvers() -> (
        Self,
        impl Fn(T) + Clone + Send + Sync + 'static,
        impl Fn(Error) + Clone + Send + Sync + 'static,
    ) {
        let (resolver, promise) = Resolver::new();
        let rejecter = resolver.clone();
        (
            promise,
            move |value| {
                resolver.resolve(value);
            },
            move |err| {
                rejecter.reject(err);
            },
        )
    }

    /// Runs `gen` on its own thread and settles the promise with its result.
    /// A panic inside `gen` rejects the promise with [`Error::Panic`].
    ///
    /// ```
    /// use promises::Promise;
    /// let promise = Promise::new(|| Ok(6 * 7));
    /// assert_eq!(promise.wait(), Ok(42));
    /// ```
    pub fn new<F>(gen: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (resolver, promise) = Resolver::new();
        runtime::spawn_blocking(resolver, gen);
        promise
    }
}

impl Promise<()> {
    /// Like [`Promise::new`] for computations whose success carries no value.
    pub fn new_void<F>(gen: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Promise::new(gen)
    }
}

impl<T: Clone> Promise<T> {
    /// The outcome, if the promise is settled.
    pub fn peek(&self) -> Option<Result<T>> {
        match &self.promise.lock().state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(err) => Some(Err(err.clone())),
        }
    }

    /// Blocks the current thread until the promise settles and returns the
    /// outcome. Returns at once if the promise is already settled.
    ///
    /// Must not be called from inside an async task; `.await` the promise
    /// there instead.
    pub fn wait(&self) -> Result<T> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        futures::executor::block_on(self.clone())
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Waits for this promise and, if it fulfills, feeds the value to `f` on
    /// a separate thread. A rejection is passed through without calling `f`.
    ///
    /// ```
    /// use promises::Promise;
    /// let next = Promise::resolved(42).then(|x| Ok(x + 1));
    /// assert_eq!(next.wait(), Ok(43));
    /// ```
    pub fn then<P, F>(&self, f: F) -> Promise<P>
    where
        P: Send + 'static,
        F: FnOnce(T) -> Result<P> + Send + 'static,
    {
        let source = self.clone();
        Promise::new(move || f(source.wait()?))
    }

    /// Like [`Promise::then`], but `f` returns another promise whose outcome
    /// becomes the outcome of the returned one.
    pub fn then_promise<P, F>(&self, f: F) -> Promise<P>
    where
        P: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<P> + Send + 'static,
    {
        let source = self.clone();
        Promise::new(move || f(source.wait()?).wait())
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self::from_inner(self.promise.clone())
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        forget_waiter(&self.promise, self.waiter.take());
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.promise.lock().state {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match poll_settled(&this.promise, &mut this.waiter, cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(()) => {
                forget_waiter(&this.promise, this.waiter.take());
                match this.peek() {
                    Some(outcome) => Poll::Ready(outcome),
                    None => Poll::Pending,
                }
            }
        }
    }
}

impl<T> Clone for Settled<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            waiter: None,
        }
    }
}

impl<T> Drop for Settled<T> {
    fn drop(&mut self) {
        forget_waiter(&self.promise, self.waiter.take());
    }
}

impl<T> fmt::Debug for Settled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("settled", &self.promise.lock().is_settled())
            .finish()
    }
}

impl<T> Future for Settled<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let ready = poll_settled(&this.promise, &mut this.waiter, cx);
        if ready.is_ready() {
            forget_waiter(&this.promise, this.waiter.take());
        }
        ready
    }
}
