//! Settle-once promises for threads and async code alike.
//!
//! A [`Promise`] is settled exactly once, by the first call to resolve or
//! reject; everything after that is a no-op. It can be awaited as a
//! `Future` or waited on from a plain thread, by any number of consumers.
//!
//! [`all`], [`any`], [`race`] and [`all_settled`] combine many promises into
//! one. They stop watching their inputs as soon as the answer is known.
//!
//! ```
//! use promises::{all, Error, Promise};
//! let slow = Promise::new(|| Ok(1));
//! let failed = Promise::<i32>::new(|| Err(Error::msg("nope")));
//! assert_eq!(all([slow, failed]).wait().unwrap_err().to_string(), "nope");
//! ```
mod aggregate;
mod collector;
pub mod config;
pub mod context;
mod error;
mod promise;
mod runtime;

pub use aggregate::{all, all_settled, any, race};
pub use config::Config;
pub use error::{AggregateError, Error, PanicError, Reason, Result};
pub use promise::{Promise, Resolver, Settled};
