use parking_lot::Mutex;
use std::{any::Any, fmt, io, sync::Arc};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Caller supplied rejection reason.
pub type Reason = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Why a promise was rejected.
///
/// Errors are cheap to clone: every observer of a rejected promise receives
/// its own copy of the same error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A reason handed to `reject`, passed through untouched.
    #[error("{0}")]
    Rejected(Reason),
    /// A generator or aggregation panicked instead of returning.
    #[error(transparent)]
    Panic(#[from] PanicError),
    /// Every input of [`any`](crate::any) was rejected.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("operation canceled")]
    Canceled,
    #[error("failed to spawn worker: {0}")]
    Spawn(Arc<io::Error>),
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl Error {
    /// Wraps any error value as a rejection reason.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Rejected(Arc::new(err))
    }

    /// Builds a rejection reason from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Error::Rejected(Arc::new(Message(message.to_string())))
    }

    /// Returns the caller supplied reason if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Rejected(reason) => reason.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateError> {
        match self {
            Error::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panic(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}

/// Lets generators use `?` on I/O calls. The error stays a caller reason and
/// can be recovered with [`Error::downcast_ref`].
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

/// Reasons are compared by identity, so a rejection equals the error it was
/// rejected with and nothing else.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Rejected(a), Error::Rejected(b)) => Arc::ptr_eq(a, b),
            (Error::Panic(a), Error::Panic(b)) => a == b,
            (Error::Aggregate(a), Error::Aggregate(b)) => a == b,
            (Error::Canceled, Error::Canceled) => true,
            (Error::Spawn(a), Error::Spawn(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

type Payload = Arc<Mutex<Option<Box<dyn Any + Send>>>>;

/// A panic intercepted at a worker boundary.
///
/// String payloads are rendered into the message; any other payload renders
/// as `unknown panic`. The original payload is kept either way and can be
/// taken back out, once, by any clone.
#[derive(Clone, Error)]
#[error("panic: {message}")]
pub struct PanicError {
    message: String,
    payload: Payload,
}

impl PanicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self {
            message,
            payload: Arc::new(Mutex::new(Some(payload))),
        }
    }

    /// The rendered panic payload.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Takes the original payload, e.g. to `resume_unwind` with it. Returns
    /// `None` if it was already taken or the error was built from a message.
    pub fn take_payload(&self) -> Option<Box<dyn Any + Send>> {
        self.payload.lock().take()
    }
}

impl fmt::Debug for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicError")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PanicError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for PanicError {}

/// Rejection reasons of a fan-in, one slot per input, in input order.
///
/// A slot is `None` when its input fulfilled (or was never observed), so the
/// length always equals the number of inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateError {
    errors: Vec<Option<Error>>,
}

impl AggregateError {
    pub fn new(errors: Vec<Option<Error>>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The reason of input `index`, if that input was rejected.
    pub fn get(&self, index: usize) -> Option<&Error> {
        self.errors.get(index).and_then(Option::as_ref)
    }

    pub fn errors(&self) -> &[Option<Error>] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Option<Error>> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut present = self.errors.iter().flatten();
        match present.next() {
            None => f.write_str("all promises were rejected"),
            Some(first) => {
                write!(f, "{first}")?;
                for err in present {
                    write!(f, "\n{err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_rendering() {
        let err = PanicError::from_payload(Box::new("boom"));
        assert_eq!(err.to_string(), "panic: boom");

        let err = PanicError::from_payload(Box::new(String::from("bang")));
        assert_eq!(err.message(), "bang");

        let err = PanicError::from_payload(Box::new(42u8));
        assert_eq!(err.to_string(), "panic: unknown panic");
    }

    #[test]
    fn test_panic_payload_is_kept() {
        let err = PanicError::from_payload(Box::new(42u8));
        let copy = err.clone();
        let payload = copy.take_payload().expect("payload kept");
        assert_eq!(payload.downcast_ref::<u8>(), Some(&42));
        assert!(err.take_payload().is_none());
        assert!(PanicError::new("msg").take_payload().is_none());
    }

    #[test]
    fn test_aggregate_display_skips_fulfilled_slots() {
        let agg = AggregateError::new(vec![Some(Error::msg("one")), None, Some(Error::msg("three"))]);
        assert_eq!(agg.len(), 3);
        assert!(agg.get(1).is_none());
        assert_eq!(agg.to_string(), "one\nthree");
        assert_eq!(AggregateError::default().to_string(), "all promises were rejected");
    }

    #[test]
    fn test_rejection_identity() {
        let reason = Error::msg("some error");
        assert_eq!(reason, reason.clone());
        assert_ne!(reason, Error::msg("some error"));
        assert_eq!(reason.to_string(), "some error");
    }

    #[test]
    fn test_downcast_reason() {
        let err = Error::new(io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(err.downcast_ref::<io::Error>().is_some());
        assert!(Error::Canceled.downcast_ref::<io::Error>().is_none());
    }

    #[test]
    fn test_io_error_converts_to_reason() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, Error::Rejected(_)));
        assert_eq!(err.downcast_ref::<io::Error>().map(io::Error::kind), Some(io::ErrorKind::NotFound));
        assert_eq!(err.to_string(), "missing");
    }
}
