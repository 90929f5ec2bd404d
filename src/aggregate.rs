//! `all`, `any`, `race` and `all_settled` over any number of promises.
//!
//! Each combinator drains a [`Collector`] until its outcome is decided and
//! then drops it, which aborts the observers of inputs that are still
//! pending. The inputs themselves keep running.
use crate::collector::{Collector, Event};
use crate::{runtime, AggregateError, Error, Promise, Resolver, Result};

/// Fulfills with every value, in input order, once all inputs fulfill.
/// Rejects with the first rejection observed, without waiting for the rest.
/// No inputs means an already fulfilled, empty vector.
///
/// ```
/// use promises::{all, Promise};
/// let values = all([Promise::resolved(1), Promise::new(|| Ok(2))]);
/// assert_eq!(values.wait(), Ok(vec![1, 2]));
/// ```
pub fn all<T, I>(promises: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolved(Vec::new());
    }
    runtime::spawn_settled(async move {
        let mut collector = Collector::observe(&promises)?;
        let mut values: Vec<Option<T>> = promises.iter().map(|_| None).collect();
        let mut settled = 0;
        while let Some(Event { index, outcome }) = collector.next().await {
            values[index] = Some(outcome?);
            settled += 1;
            if settled == promises.len() {
                break;
            }
        }
        values.into_iter().collect::<Option<Vec<_>>>().ok_or(Error::Canceled)
    })
}

/// Fulfills with the first value any input fulfills with. Rejects with an
/// [`AggregateError`] holding every reason in input order when all inputs
/// reject, including when there are none.
pub fn any<T, I>(promises: I) -> Promise<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::rejected(AggregateError::default().into());
    }
    runtime::spawn_settled(async move {
        let mut collector = Collector::observe(&promises)?;
        let mut errors: Vec<Option<Error>> = vec![None; promises.len()];
        let mut settled = 0;
        while let Some(Event { index, outcome }) = collector.next().await {
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) => errors[index] = Some(err),
            }
            settled += 1;
            if settled == promises.len() {
                return Err(AggregateError::new(errors).into());
            }
        }
        Err(Error::Canceled)
    })
}

/// Settles like the first input to settle.
///
/// With no inputs the returned promise never settles.
pub fn race<T, I>(promises: I) -> Promise<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        let (_, never) = Resolver::new();
        return never;
    }
    runtime::spawn_settled(async move {
        let mut collector = Collector::observe(&promises)?;
        match collector.next().await {
            Some(event) => event.outcome,
            None => Err(Error::Canceled),
        }
    })
}

/// Fulfills, once every input has settled, with each outcome in input
/// order. Never rejects.
pub fn all_settled<T, I>(promises: I) -> Promise<Vec<Result<T>>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolved(Vec::new());
    }
    runtime::spawn_settled(async move {
        let mut results: Vec<Option<Result<T>>> = promises.iter().map(|_| None).collect();
        match Collector::observe(&promises) {
            Ok(mut collector) => {
                while let Some(Event { index, outcome }) = collector.next().await {
                    results[index] = Some(outcome);
                }
            }
            Err(err) => return Ok(vec![Err(err); promises.len()]),
        }
        Ok(results
            .into_iter()
            .map(|result| result.unwrap_or(Err(Error::Canceled)))
            .collect())
    })
}
