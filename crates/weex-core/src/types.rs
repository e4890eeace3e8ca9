//! Core data types for chart statistics

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::units::{Unit, UnitGroup};

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// A span of time in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Timestamp,
    pub stop: Timestamp,
}

impl TimeSpan {
    pub fn new(start: Timestamp, stop: Timestamp) -> Self {
        Self { start, stop }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.stop
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} -> {}]", self.start, self.stop)
    }
}

/// An ordered vector of values tagged with a unit and unit group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedVector<T> {
    pub values: Vec<T>,
    pub unit: Option<Unit>,
    pub group: Option<UnitGroup>,
}

/// Nullable observation values
pub type ValueVector = TaggedVector<Option<f64>>;

/// Epoch-second timestamps
pub type TimeVector = TaggedVector<Timestamp>;

impl<T> TaggedVector<T> {
    pub fn new(values: Vec<T>, unit: Option<Unit>, group: Option<UnitGroup>) -> Self {
        Self {
            values,
            unit,
            group,
        }
    }

    pub fn untagged(values: Vec<T>) -> Self {
        Self::new(values, None, None)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueVector {
    /// Largest non-null value, if any
    pub fn max_value(&self) -> Option<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }
}

impl TimeVector {
    pub fn epoch(values: Vec<Timestamp>) -> Self {
        Self::new(values, Some(Unit::UnixEpoch), Some(UnitGroup::Time))
    }

    /// Timestamps in milliseconds, as charting front-ends expect
    pub fn to_millis(&self) -> Vec<f64> {
        self.values.iter().map(|ts| *ts as f64 * 1000.0).collect()
    }
}

/// A time series as returned by a series provider
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub start: TimeVector,
    pub stop: TimeVector,
    pub data: ValueVector,
}

impl Series {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Aggregation type for series roll-ups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Min,
    Max,
    Sum,
    Avg,
    Last,
    First,
    Count,
}

impl FromStr for AggregateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(AggregateType::Min),
            "max" => Ok(AggregateType::Max),
            "sum" => Ok(AggregateType::Sum),
            "avg" => Ok(AggregateType::Avg),
            "last" => Ok(AggregateType::Last),
            "first" => Ok(AggregateType::First),
            "count" => Ok(AggregateType::Count),
            other => Err(format!("unknown aggregate type '{other}'")),
        }
    }
}

/// Request to roll a series up into fixed intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesAggregate {
    pub aggregate_type: AggregateType,
    /// Interval length in seconds
    pub interval: i64,
}

impl SeriesAggregate {
    pub fn new(aggregate_type: AggregateType, interval: i64) -> Self {
        Self {
            aggregate_type,
            interval,
        }
    }
}

/// Aggregate derivable from a day-summary record.
///
/// Names that are not recognised are kept as [`AggregateKind::Unknown`] and
/// evaluate to null for every row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKind {
    Min,
    Max,
    MinTime,
    MaxTime,
    Sum,
    Count,
    Avg,
    Rms,
    VecAvg,
    VecDir,
    GustDir,
    Unknown(String),
}

impl AggregateKind {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "min" => AggregateKind::Min,
            "max" => AggregateKind::Max,
            "mintime" => AggregateKind::MinTime,
            "maxtime" => AggregateKind::MaxTime,
            "sum" => AggregateKind::Sum,
            "count" => AggregateKind::Count,
            "avg" => AggregateKind::Avg,
            "rms" => AggregateKind::Rms,
            "vecavg" => AggregateKind::VecAvg,
            "vecdir" => AggregateKind::VecDir,
            "gustdir" => AggregateKind::GustDir,
            _ => AggregateKind::Unknown(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::MinTime => "mintime",
            AggregateKind::MaxTime => "maxtime",
            AggregateKind::Sum => "sum",
            AggregateKind::Count => "count",
            AggregateKind::Avg => "avg",
            AggregateKind::Rms => "rms",
            AggregateKind::VecAvg => "vecavg",
            AggregateKind::VecDir => "vecdir",
            AggregateKind::GustDir => "gustdir",
            AggregateKind::Unknown(name) => name,
        }
    }

    /// Kinds that need the vector columns of a day summary
    pub fn is_vector_only(&self) -> bool {
        matches!(
            self,
            AggregateKind::GustDir
                | AggregateKind::Rms
                | AggregateKind::VecAvg
                | AggregateKind::VecDir
        )
    }
}

impl FromStr for AggregateKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AggregateKind::parse(s))
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column set to fetch from a day-summary table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLayout {
    Scalar,
    Vector,
}

impl SummaryLayout {
    pub fn for_kinds(kinds: &[AggregateKind]) -> Self {
        if kinds.iter().any(AggregateKind::is_vector_only) {
            SummaryLayout::Vector
        } else {
            SummaryLayout::Scalar
        }
    }
}

/// Additional sufficient statistics kept for vector observations (wind)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSums {
    pub max_dir: Option<f64>,
    pub xsum: Option<f64>,
    pub ysum: Option<f64>,
    pub dirsumtime: Option<i64>,
    pub squaresum: Option<f64>,
    pub wsquaresum: Option<f64>,
}

/// One calendar day of pre-aggregated statistics for one observation type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummaryRecord {
    /// Start of the day (local midnight)
    pub day_start: Timestamp,
    pub min: Option<f64>,
    pub min_time: Option<Timestamp>,
    pub max: Option<f64>,
    pub max_time: Option<Timestamp>,
    pub sum: Option<f64>,
    pub count: Option<i64>,
    /// Time-weighted sum
    pub wsum: Option<f64>,
    /// Sum of the weighting times
    pub sumtime: Option<f64>,
    /// Present only when the vector layout was fetched
    pub vector: Option<VectorSums>,
}

/// A single wind observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub timestamp: Timestamp,
    pub speed: Option<f64>,
    /// Compass bearing in degrees, `None` when calm or unknown
    pub direction: Option<f64>,
}
