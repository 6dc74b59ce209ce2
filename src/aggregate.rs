use std::time::Duration;

use crate::Metric;

/// The `Aggregate` trait defines how raw [`Metric`] values are folded into a
/// compact, mergeable summary.
///
/// Aggregates only store raw totals (counts, sums). Anything derived from them,
/// such as averages, belongs to whoever reads the aggregate.
///
/// Implementations must keep `merge` associative and commutative so that
/// partial aggregates can be combined in any order.
///
/// # Example
/// ```rust
/// use rollcall::{Aggregate, Metric};
///
/// #[derive(Default)]
/// struct Count(usize);
///
/// impl Aggregate for Count {
///     fn consume<M: Metric>(&mut self, _: &M) {
///         self.0 += 1;
///     }
///
///     fn merge(&mut self, other: Self) {
///         self.0 += other.0;
///     }
/// }
/// ```
pub trait Aggregate
where
    Self: Default,
{
    /// Fold every metric of a slice into the aggregate, in slice order.
    fn aggregate<M: Metric>(&mut self, metrics: &[M]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric.
    fn consume<M: Metric>(&mut self, metric: &M);

    /// Combine two aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Totals for one batch: how many calls ran, how many failed and how much
/// time the calls spent in sum.
///
/// `summed_duration` is the sum of every individual call duration. It is not
/// the wall-clock time of the batch, which is tracked separately by
/// [`crate::BatchResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub summed_duration: Duration,
    pub failure_count: usize,
    pub success_count: usize,
    pub count: usize,
}

impl Aggregate for BatchStats {
    fn consume<M: Metric>(&mut self, metric: &M) {
        self.summed_duration += metric.latency();
        if metric.success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.count += 1;
    }

    fn merge(&mut self, other: Self) {
        self.summed_duration += other.summed_duration;
        self.failure_count += other.failure_count;
        self.success_count += other.success_count;
        self.count += other.count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Outcome, OperationError};

    fn ok(slot: usize, ms: u64) -> Outcome<()> {
        Outcome {
            slot,
            result: Ok(()),
            duration: Duration::from_millis(ms),
        }
    }

    fn failed(slot: usize, ms: u64) -> Outcome<()> {
        Outcome::failed(
            slot,
            OperationError::Transport("refused".into()),
            Duration::from_millis(ms),
        )
    }

    #[test]
    fn consume_counts_failures_and_sums_durations() {
        let mut stats = BatchStats::default();
        stats.aggregate(&[ok(0, 10), failed(1, 5), ok(2, 20)]);

        assert_eq!(stats.summed_duration, Duration::from_millis(35));
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn merge_matches_single_pass() {
        let outcomes = [ok(0, 3), failed(1, 7), ok(2, 11), failed(3, 13)];

        let mut whole = BatchStats::default();
        whole.aggregate(&outcomes);

        let mut left = BatchStats::default();
        left.aggregate(&outcomes[..1]);
        let mut right = BatchStats::default();
        right.aggregate(&outcomes[1..]);
        right.merge(left);

        assert_eq!(whole, right);
    }
}
