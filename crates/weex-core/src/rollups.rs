//! Aggregation of raw archive values into fixed intervals

use chrono_tz::Tz;

use crate::period::start_of_interval;
use crate::types::{AggregateType, SeriesAggregate, TimeSpan, Timestamp};

/// Accumulator for calculating aggregates over multiple observations
#[derive(Debug, Clone)]
pub struct Accumulator {
    observations: Vec<f64>,
    aggregate_type: AggregateType,
}

impl Accumulator {
    pub fn new(aggregate_type: AggregateType) -> Self {
        Self {
            observations: Vec::new(),
            aggregate_type,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.observations.push(value);
    }

    pub fn result(&self) -> Option<f64> {
        if self.observations.is_empty() {
            return None;
        }

        Some(match self.aggregate_type {
            AggregateType::Min => self
                .observations
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min),
            AggregateType::Max => self
                .observations
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
            AggregateType::Sum => self.observations.iter().sum(),
            AggregateType::Avg => {
                let sum: f64 = self.observations.iter().sum();
                sum / self.observations.len() as f64
            }
            AggregateType::Last => self.observations.last().copied()?,
            AggregateType::First => self.observations.first().copied()?,
            AggregateType::Count => self.observations.len() as f64,
        })
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    fn clear(&mut self) {
        self.observations.clear();
    }
}

/// Intervals produced by [`rollup_series`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolledSeries {
    pub starts: Vec<Timestamp>,
    pub stops: Vec<Timestamp>,
    pub values: Vec<Option<f64>>,
}

/// Roll raw `(timestamp, value)` samples up into consecutive intervals.
///
/// Intervals are aligned on local time and a sample belongs to the interval
/// `(t0, t1]`. The last interval is clipped to `span.stop`. Null samples are
/// ignored; an interval without samples yields null.
pub fn rollup_series(
    samples: &[(Timestamp, Option<f64>)],
    span: TimeSpan,
    aggregate: SeriesAggregate,
    tz: &Tz,
) -> RolledSeries {
    let mut out = RolledSeries::default();
    if aggregate.interval <= 0 || !span.is_valid() {
        return out;
    }

    let mut acc = Accumulator::new(aggregate.aggregate_type);
    let mut idx = 0;
    let mut t0 = start_of_interval(span.start, aggregate.interval, tz);

    while t0 < span.stop {
        let t1 = (t0 + aggregate.interval).min(span.stop);
        while idx < samples.len() && samples[idx].0 <= t1 {
            let (ts, value) = samples[idx];
            if ts > t0 {
                if let Some(v) = value {
                    acc.add(v);
                }
            }
            idx += 1;
        }
        out.starts.push(t0);
        out.stops.push(t1);
        out.values.push(acc.result());
        acc.clear();
        t0 = t1;
    }

    out
}
