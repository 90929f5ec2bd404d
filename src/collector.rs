//! Fan-in of many promises into one stream of settlement events.
//!
//! Every input gets an observer task holding a clone of one mpsc sender. The
//! stream therefore closes exactly when the last observer has finished,
//! whether it delivered its event or was aborted.
use futures::channel::mpsc::{self, Receiver};
use futures::future::{AbortHandle, Abortable};
use futures::{FutureExt, SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::{runtime, Promise, Result};

/// Outcome of input `index`.
#[derive(Debug)]
pub(crate) struct Event<T> {
    pub(crate) index: usize,
    pub(crate) outcome: Result<T>,
}

/// Events arrive in settlement order. Dropping the collector aborts every
/// observer that is still running.
#[derive(Debug)]
pub(crate) struct Collector<T> {
    events: Receiver<Event<T>>,
    observers: Vec<AbortHandle>,
}

impl<T: Clone + Send + 'static> Collector<T> {
    pub(crate) fn observe(promises: &[Promise<T>]) -> Result<Self> {
        let (sender, events) = mpsc::channel(0);
        let mut collector = Collector {
            events,
            observers: Vec::with_capacity(promises.len()),
        };
        trace!(inputs = promises.len(), "observing promises");
        for (index, promise) in promises.iter().cloned().enumerate() {
            let (handle, registration) = AbortHandle::new_pair();
            collector.observers.push(handle);
            let mut sender = sender.clone();
            let observer = async move {
                let outcome = promise.await;
                // The receiver only goes away on abort.
                let _ = sender.send(Event { index, outcome }).await;
            };
            runtime::spawn(Abortable::new(observer, registration).map(move |finished| {
                if finished.is_err() {
                    trace!(index, "observer aborted");
                }
            }))?;
        }
        Ok(collector)
    }
}

impl<T> Collector<T> {
    /// Next event, or `None` once every observer has finished.
    pub(crate) async fn next(&mut self) -> Option<Event<T>> {
        self.events.next().await
    }

    /// Stops all observers. No event is delivered afterwards.
    pub(crate) fn abort(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        debug!(observers = self.observers.len(), "aborting fan-in");
        self.events.close();
        for handle in self.observers.drain(..) {
            handle.abort();
        }
        while self.events.try_recv().is_ok() {}
    }
}

impl<T> Drop for Collector<T> {
    fn drop(&mut self) {
        self.abort();
    }
}
