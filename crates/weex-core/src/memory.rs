//! In-memory series provider
//!
//! Holds archive samples and day summaries in plain maps. Useful wherever a
//! database is unavailable, and as a fixture for aggregation tests.

use std::collections::HashMap;

use chrono_tz::Tz;

use crate::provider::{ProviderError, ProviderResult, SeriesProvider};
use crate::rollups::rollup_series;
use crate::types::{
    DaySummaryRecord, Series, SeriesAggregate, SummaryLayout, TimeSpan, TimeVector, Timestamp,
    ValueVector,
};
use crate::units::{standard_unit_type, UnitSystem};

const DEFAULT_INTERVAL_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct MemoryProvider {
    unit_system: Option<UnitSystem>,
    tz: Tz,
    interval_minutes: i64,
    archive: HashMap<String, Vec<(Timestamp, Option<f64>)>>,
    summaries: HashMap<String, Vec<DaySummaryRecord>>,
}

impl MemoryProvider {
    pub fn new(unit_system: UnitSystem) -> Self {
        Self {
            unit_system: Some(unit_system),
            tz: Tz::UTC,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            archive: HashMap::new(),
            summaries: HashMap::new(),
        }
    }

    /// A provider whose archive holds no records at all
    pub fn empty() -> Self {
        Self {
            unit_system: None,
            ..Self::new(UnitSystem::Us)
        }
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn with_interval_minutes(mut self, minutes: i64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Archive samples for `obs`; kept sorted by timestamp
    pub fn with_archive(
        mut self,
        obs: impl Into<String>,
        mut samples: Vec<(Timestamp, Option<f64>)>,
    ) -> Self {
        samples.sort_by_key(|(ts, _)| *ts);
        self.archive.insert(obs.into(), samples);
        self
    }

    pub fn with_day_summaries(
        mut self,
        obs: impl Into<String>,
        mut rows: Vec<DaySummaryRecord>,
    ) -> Self {
        rows.sort_by_key(|r| r.day_start);
        self.summaries.insert(obs.into(), rows);
        self
    }

    fn stamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.archive.values().flatten().map(|(ts, _)| *ts)
    }
}

#[async_trait::async_trait]
impl SeriesProvider for MemoryProvider {
    async fn unit_system(&self) -> ProviderResult<Option<UnitSystem>> {
        Ok(self.unit_system)
    }

    async fn get_series(
        &self,
        obs: &str,
        span: TimeSpan,
        aggregate: Option<SeriesAggregate>,
    ) -> ProviderResult<Series> {
        let samples = self
            .archive
            .get(obs)
            .ok_or_else(|| ProviderError::UnknownType(obs.to_string()))?;
        let (unit, group) = match self.unit_system {
            Some(system) => standard_unit_type(system, obs, None),
            None => (None, None),
        };

        let (starts, stops, values) = match aggregate {
            Some(agg) => {
                let rolled = rollup_series(samples, span, agg, &self.tz);
                (rolled.starts, rolled.stops, rolled.values)
            }
            None => {
                let interval = self.interval_minutes * 60;
                let in_span = samples
                    .iter()
                    .filter(|(ts, _)| *ts > span.start && *ts <= span.stop);
                let mut starts = Vec::new();
                let mut stops = Vec::new();
                let mut values = Vec::new();
                for (ts, value) in in_span {
                    starts.push(ts - interval);
                    stops.push(*ts);
                    values.push(*value);
                }
                (starts, stops, values)
            }
        };

        Ok(Series {
            start: TimeVector::epoch(starts),
            stop: TimeVector::epoch(stops),
            data: ValueVector::new(values, unit, group),
        })
    }

    async fn get_day_summary(
        &self,
        obs: &str,
        span: TimeSpan,
        layout: SummaryLayout,
    ) -> ProviderResult<Vec<DaySummaryRecord>> {
        let rows = self
            .summaries
            .get(obs)
            .ok_or_else(|| ProviderError::UnknownType(obs.to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.day_start >= span.start && r.day_start < span.stop)
            .map(|r| match layout {
                SummaryLayout::Vector => r.clone(),
                SummaryLayout::Scalar => DaySummaryRecord {
                    vector: None,
                    ..r.clone()
                },
            })
            .collect())
    }

    async fn first_good_stamp(&self) -> ProviderResult<Option<Timestamp>> {
        Ok(self.stamps().min())
    }

    async fn last_good_stamp(&self) -> ProviderResult<Option<Timestamp>> {
        Ok(self.stamps().max())
    }
}
