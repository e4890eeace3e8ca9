//! Chart statistics
//!
//! Derives per-day aggregates from day-summary records, bins wind samples
//! into a wind rose and packages both as JSON vectors for charting.

pub mod charts;
pub mod context;
pub mod day_summary;
pub mod json;
pub mod min_range;
pub mod windrose;

pub use charts::{week_bundle, year_bundle};
pub use context::ChartContext;
pub use day_summary::*;
pub use min_range::min_ranges;
pub use windrose::*;

use thiserror::Error;
use weex_core::{PeriodError, ProviderError, TimeSpan, UnitError};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("No such aggregation source: {0}")]
    NoSuchAggregationSource(String),

    #[error("Archive holds no data")]
    NoData,

    #[error("No samples to bin")]
    InsufficientData,

    #[error("No aggregates requested")]
    EmptyRequest,

    #[error("Invalid timespan {0}")]
    InvalidTimespan(TimeSpan),

    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    #[error("Period error: {0}")]
    Period(#[from] PeriodError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StatsError {
    /// Whether the error only concerns one missing observation type
    pub fn is_unknown_type(&self) -> bool {
        matches!(
            self,
            StatsError::NoSuchAggregationSource(_) | StatsError::Provider(ProviderError::UnknownType(_))
        )
    }
}

pub type StatsResult<T> = Result<T, StatsError>;
