use std::{future::Future, time::Duration};

use thiserror::Error;

/// Why a single remote call did not produce a value.
///
/// Operations themselves only ever produce `Transport`, `Status` or `Decode`.
/// The remaining variants are assigned by the executor when a worker never got
/// a usable answer out of the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote answered with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("call exceeded deadline of {0:?}")]
    Timeout(Duration),
    #[error("call cancelled before it started")]
    Cancelled,
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// What one invocation of a [`RemoteOperation`] hands back: the value (or the
/// reason there is none) and how long the round trip took as measured by the
/// operation itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub value: Result<T, OperationError>,
    pub duration: Duration,
}

impl<T> Sample<T> {
    pub fn ok(value: T, duration: Duration) -> Self {
        Self {
            value: Ok(value),
            duration,
        }
    }

    pub fn failed(error: OperationError, duration: Duration) -> Self {
        Self {
            value: Err(error),
            duration,
        }
    }
}

/// A unit of work that performs exactly one network round trip for an input.
///
/// Implementations must never panic or abort on remote failures; every problem
/// is reported through [`Sample::value`]. Each call is self-contained, so an
/// implementation only needs `&self` and may be shared across all workers of a
/// batch.
///
/// # Example
/// ```rust
/// use rollcall::{RemoteOperation, Sample};
/// use std::time::Duration;
///
/// struct Echo;
///
/// impl RemoteOperation<u32> for Echo {
///     type Output = u32;
///
///     async fn call(&self, input: &u32) -> Sample<u32> {
///         Sample::ok(*input, Duration::from_millis(1))
///     }
/// }
/// ```
pub trait RemoteOperation<I>
where
    Self: Send + Sync,
    I: Send + Sync,
{
    type Output: Send + Sync + 'static;

    /// Perform the call for `input`.
    fn call(&self, input: &I) -> impl Future<Output = Sample<Self::Output>> + Send;
}
