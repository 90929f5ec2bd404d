//! Where promise work runs.
//!
//! Blocking generators get a dedicated thread each. Async work (fan-in
//! observers and aggregations) goes to a shared `ThreadPool` that is built on
//! first use from [`Config`](crate::Config).
use futures::executor::ThreadPool;
use futures::FutureExt;
use std::{
    future::Future,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, OnceLock},
    thread,
};
use tracing::{error, warn};

use crate::{config, Error, PanicError, Promise, Resolver, Result};

static POOL: OnceLock<Result<ThreadPool, Arc<io::Error>>> = OnceLock::new();

fn pool() -> Result<&'static ThreadPool> {
    let pool = POOL.get_or_init(|| {
        let config = config::current();
        let mut builder = ThreadPool::builder();
        builder
            .pool_size(config.get_observer_threads())
            .name_prefix(format!("{}-observer-", config.get_thread_name_prefix()));
        if let Some(size) = config.get_stack_size() {
            builder.stack_size(size);
        }
        builder.create().map_err(|err| {
            error!(%err, "failed to start observer pool");
            Arc::new(err)
        })
    });
    pool.as_ref().map_err(|err| Error::Spawn(err.clone()))
}

/// Runs `gen` on a new thread and settles `resolver` with its outcome.
pub(crate) fn spawn_blocking<T, F>(resolver: Resolver<T>, gen: F)
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let config = config::current();
    let mut builder = thread::Builder::new().name(format!("{}-worker", config.get_thread_name_prefix()));
    if let Some(size) = config.get_stack_size() {
        builder = builder.stack_size(size);
    }
    let worker = resolver.clone();
    let spawned = builder.spawn(move || {
        settle(&worker, panic::catch_unwind(AssertUnwindSafe(gen)));
    });
    if let Err(err) = spawned {
        error!(%err, "failed to spawn worker thread");
        resolver.reject(Error::Spawn(Arc::new(err)));
    }
}

/// Runs `fut` on the observer pool and returns a promise of its outcome.
/// Panics while polling `fut` reject the promise.
pub(crate) fn spawn_settled<T, Fut>(fut: Fut) -> Promise<T>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let (resolver, promise) = Resolver::new();
    let task = {
        let resolver = resolver.clone();
        AssertUnwindSafe(fut)
            .catch_unwind()
            .map(move |outcome| settle(&resolver, outcome))
    };
    if let Err(err) = spawn(task) {
        resolver.reject(err);
    }
    promise
}

/// Spawns a detached task on the observer pool.
pub(crate) fn spawn<Fut>(task: Fut) -> Result<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    pool()?.spawn_ok(task);
    Ok(())
}

fn settle<T>(resolver: &Resolver<T>, outcome: thread::Result<Result<T>>) {
    match outcome {
        Ok(Ok(value)) => {
            resolver.resolve(value);
        }
        Ok(Err(err)) => {
            resolver.reject(err);
        }
        Err(payload) => {
            let err = PanicError::from_payload(payload);
            warn!(message = err.message(), "captured panic");
            resolver.reject(err.into());
        }
    }
}
