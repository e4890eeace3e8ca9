//! [`SeriesProvider`] over the WeeWX archive

use tracing::{debug, instrument};
use weex_core::{
    rollup_series, standard_unit_type, start_of_interval, DaySummaryRecord, ProviderResult, Series,
    SeriesAggregate, SeriesProvider, SummaryLayout, TimeSpan, TimeVector, Timestamp, UnitSystem,
    ValueVector,
};

use crate::DbClient;

/// Archive interval assumed when a row does not record one
const DEFAULT_INTERVAL_MINUTES: i64 = 5;

#[async_trait::async_trait]
impl SeriesProvider for DbClient {
    async fn unit_system(&self) -> ProviderResult<Option<UnitSystem>> {
        Ok(self.get_unit_system().await?)
    }

    #[instrument(skip(self))]
    async fn get_series(
        &self,
        obs: &str,
        span: TimeSpan,
        aggregate: Option<SeriesAggregate>,
    ) -> ProviderResult<Series> {
        let system = self.get_unit_system().await?;
        let (unit, group) = match system {
            Some(system) => standard_unit_type(system, obs, None),
            None => (None, None),
        };

        let series = match aggregate {
            None => {
                let rows = self.get_archive_samples(obs, span.start, span.stop).await?;
                let starts = rows
                    .iter()
                    .map(|r| r.date_time - r.interval.unwrap_or(DEFAULT_INTERVAL_MINUTES) * 60)
                    .collect();
                let stops = rows.iter().map(|r| r.date_time).collect();
                let values = rows.iter().map(|r| r.value).collect();
                Series {
                    start: TimeVector::epoch(starts),
                    stop: TimeVector::epoch(stops),
                    data: ValueVector::new(values, unit, group),
                }
            }
            Some(agg) => {
                let first = start_of_interval(span.start, agg.interval, self.timezone());
                let rows = self.get_archive_samples(obs, first, span.stop).await?;
                let samples: Vec<(Timestamp, Option<f64>)> =
                    rows.iter().map(|r| (r.date_time, r.value)).collect();
                let rolled = rollup_series(&samples, span, agg, self.timezone());
                Series {
                    start: TimeVector::epoch(rolled.starts),
                    stop: TimeVector::epoch(rolled.stops),
                    data: ValueVector::new(rolled.values, unit, group),
                }
            }
        };

        debug!("Series {} has {} points", obs, series.len());
        Ok(series)
    }

    async fn get_day_summary(
        &self,
        obs: &str,
        span: TimeSpan,
        layout: SummaryLayout,
    ) -> ProviderResult<Vec<DaySummaryRecord>> {
        Ok(self
            .get_day_summaries(obs, span.start, span.stop, layout)
            .await?)
    }

    async fn first_good_stamp(&self) -> ProviderResult<Option<Timestamp>> {
        Ok(self.first_timestamp().await?)
    }

    async fn last_good_stamp(&self) -> ProviderResult<Option<Timestamp>> {
        Ok(self.last_timestamp().await?)
    }
}
