use std::time::Duration;

use crate::operation::{OperationError, Sample};

/// A `Metric` is a single observed measurement taken by a worker.
///
/// It is the most granular level of data the crate deals with. Metrics are
/// later folded into an [`crate::Aggregate`] once every worker of a batch has
/// finished, so they never need to be shared while being produced.
pub trait Metric
where
    Self: Send + Sync,
{
    /// Time spent performing the measured action.
    fn latency(&self) -> Duration;
    /// Whether the action produced a usable value.
    fn success(&self) -> bool;
}

/// The recorded result of one worker in a batch.
///
/// `slot` is the index of the input the worker was given; it is unique within
/// a batch and lies in `0..batch_size`. An outcome is written once, by the
/// worker that owns the slot, and is never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub slot: usize,
    pub result: Result<T, OperationError>,
    pub duration: Duration,
}

impl<T> Outcome<T> {
    pub fn from_sample(slot: usize, sample: Sample<T>) -> Self {
        Self {
            slot,
            result: sample.value,
            duration: sample.duration,
        }
    }

    pub fn failed(slot: usize, error: OperationError, duration: Duration) -> Self {
        Self {
            slot,
            result: Err(error),
            duration,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// The value, absent when the call failed.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.result.as_ref().err()
    }

    pub fn into_value(self) -> Option<T> {
        self.result.ok()
    }
}

impl<T: Send + Sync> Metric for Outcome<T> {
    fn latency(&self) -> Duration {
        self.duration
    }

    fn success(&self) -> bool {
        self.succeeded()
    }
}
