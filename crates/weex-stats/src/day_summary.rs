//! Aggregates derived from day-summary records

use std::collections::BTreeMap;

use chrono_tz::Tz;
use tracing::{debug, instrument};
use weex_core::{
    start_of_day, standard_unit_type, AggregateKind, DaySummaryRecord, ProviderError,
    SeriesProvider, SummaryLayout, TimeSpan, TimeVector, UnitSystem, ValueVector,
};

use crate::{StatsError, StatsResult};

/// Day-start timestamps and one tagged vector per requested aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummaryVectors {
    pub time: TimeVector,
    pub aggregates: BTreeMap<AggregateKind, ValueVector>,
}

impl DaySummaryVectors {
    pub fn get(&self, kind: &AggregateKind) -> Option<&ValueVector> {
        self.aggregates.get(kind)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DailySummaryAggregator {
    tz: Tz,
}

impl DailySummaryAggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Detect the archive's unit system, then aggregate
    pub async fn compute(
        &self,
        provider: &dyn SeriesProvider,
        obs_type: &str,
        span: TimeSpan,
        kinds: &[AggregateKind],
    ) -> StatsResult<DaySummaryVectors> {
        let system = provider.unit_system().await?.ok_or(StatsError::NoData)?;
        self.compute_with_units(provider, system, obs_type, span, kinds)
            .await
    }

    /// Aggregate using an already detected unit system
    #[instrument(skip(self, provider))]
    pub async fn compute_with_units(
        &self,
        provider: &dyn SeriesProvider,
        system: UnitSystem,
        obs_type: &str,
        span: TimeSpan,
        kinds: &[AggregateKind],
    ) -> StatsResult<DaySummaryVectors> {
        if !span.is_valid() {
            return Err(StatsError::InvalidTimespan(span));
        }
        if kinds.is_empty() {
            return Err(StatsError::EmptyRequest);
        }

        let query = TimeSpan::new(start_of_day(span.start, &self.tz)?, span.stop);
        let layout = SummaryLayout::for_kinds(kinds);
        let records = match provider.get_day_summary(obs_type, query, layout).await {
            Ok(records) => records,
            Err(ProviderError::UnknownType(_)) => {
                return Err(StatsError::NoSuchAggregationSource(obs_type.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!("{} day summaries for {} over {}", records.len(), obs_type, query);

        let time = TimeVector::epoch(records.iter().map(|r| r.day_start).collect());
        let aggregates = kinds
            .iter()
            .map(|kind| {
                let values = records.iter().map(|r| aggregate_value(r, kind)).collect();
                let (unit, group) = standard_unit_type(system, obs_type, Some(kind));
                (kind.clone(), ValueVector::new(values, unit, group))
            })
            .collect();

        Ok(DaySummaryVectors { time, aggregates })
    }
}

/// One aggregate from one day's sufficient statistics
pub fn aggregate_value(record: &DaySummaryRecord, kind: &AggregateKind) -> Option<f64> {
    let has_samples = record.count.unwrap_or(0) > 0;
    let sumtime = record.sumtime.filter(|t| *t > 0.0 && has_samples);
    let vector = record.vector.as_ref();

    match kind {
        AggregateKind::Min => record.min,
        AggregateKind::Max => record.max,
        AggregateKind::Sum => record.sum,
        AggregateKind::MinTime => record.min_time.filter(|t| *t != 0).map(|t| t as f64),
        AggregateKind::MaxTime => record.max_time.filter(|t| *t != 0).map(|t| t as f64),
        AggregateKind::Count => record.count.filter(|c| *c != 0).map(|c| c as f64),
        AggregateKind::Avg => Some(record.wsum? / sumtime?),
        AggregateKind::Rms => Some((vector?.wsquaresum? / sumtime?).sqrt()),
        AggregateKind::VecAvg => {
            let v = vector?;
            let (x, y, t) = (v.xsum?, v.ysum?, sumtime?);
            Some(((x * x + y * y) / (t * t)).sqrt())
        }
        AggregateKind::VecDir => {
            let v = vector?;
            vector_direction(v.xsum?, v.ysum?)
        }
        AggregateKind::GustDir => vector?.max_dir,
        AggregateKind::Unknown(_) => None,
    }
}

/// Compass bearing of the resultant vector, in `[0, 360)`
pub fn vector_direction(xsum: f64, ysum: f64) -> Option<f64> {
    if xsum == 0.0 && ysum == 0.0 {
        return None;
    }
    let mut deg = 90.0 - ysum.atan2(xsum).to_degrees();
    if deg < 0.0 {
        deg += 360.0;
    }
    if deg >= 360.0 {
        deg = 0.0;
    }
    Some(deg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;
    use weex_core::{MemoryProvider, Unit, UnitGroup, VectorSums};

    fn row(day_start: i64) -> DaySummaryRecord {
        DaySummaryRecord {
            day_start,
            min: Some(1.5),
            min_time: Some(day_start + 3_600),
            max: Some(20.0),
            max_time: Some(0),
            sum: Some(50.0),
            count: Some(10),
            wsum: Some(500.0),
            sumtime: Some(50.0),
            vector: Some(VectorSums {
                max_dir: Some(225.0),
                xsum: Some(0.0),
                ysum: Some(3.0),
                dirsumtime: Some(50),
                squaresum: Some(90.0),
                wsquaresum: Some(800.0),
            }),
        }
    }

    #[test]
    fn test_avg_from_weighted_sums() {
        assert_eq!(aggregate_value(&row(0), &AggregateKind::Avg), Some(10.0));
    }

    #[test]
    fn test_guards_on_count_and_sumtime() {
        let empty = DaySummaryRecord {
            count: Some(0),
            ..row(0)
        };
        assert_eq!(aggregate_value(&empty, &AggregateKind::Avg), None);
        assert_eq!(aggregate_value(&empty, &AggregateKind::Rms), None);
        assert_eq!(aggregate_value(&empty, &AggregateKind::VecAvg), None);
        assert_eq!(aggregate_value(&empty, &AggregateKind::Count), None);

        let no_time = DaySummaryRecord {
            sumtime: Some(0.0),
            ..row(0)
        };
        assert_eq!(aggregate_value(&no_time, &AggregateKind::Avg), None);
    }

    #[test]
    fn test_scalar_fields_and_times() {
        let r = row(86_400);
        assert_eq!(aggregate_value(&r, &AggregateKind::Min), Some(1.5));
        assert_eq!(aggregate_value(&r, &AggregateKind::Sum), Some(50.0));
        assert_eq!(aggregate_value(&r, &AggregateKind::MinTime), Some(90_000.0));
        assert_eq!(aggregate_value(&r, &AggregateKind::MaxTime), None);
        assert_eq!(aggregate_value(&r, &AggregateKind::Count), Some(10.0));
        assert_eq!(
            aggregate_value(&r, &AggregateKind::Unknown("median".into())),
            None
        );
    }

    #[test]
    fn test_vector_aggregates() {
        let r = row(0);
        assert_eq!(aggregate_value(&r, &AggregateKind::Rms), Some(4.0));
        let vecavg = aggregate_value(&r, &AggregateKind::VecAvg).unwrap();
        assert!((vecavg - 0.06).abs() < 1e-12);
        assert_eq!(aggregate_value(&r, &AggregateKind::VecDir), Some(0.0));
        assert_eq!(aggregate_value(&r, &AggregateKind::GustDir), Some(225.0));

        let scalar_only = DaySummaryRecord {
            vector: None,
            ..row(0)
        };
        assert_eq!(aggregate_value(&scalar_only, &AggregateKind::GustDir), None);
    }

    #[test]
    fn test_vector_direction() {
        assert_eq!(vector_direction(0.0, 0.0), None);
        assert_eq!(vector_direction(1.0, 0.0), Some(90.0));
        assert_eq!(vector_direction(0.0, 1.0), Some(0.0));
        assert_eq!(vector_direction(-1.0, 0.0), Some(270.0));
        assert_eq!(vector_direction(0.0, -1.0), Some(180.0));

        for (x, y) in [(0.3, -7.0), (-1e-9, 5.0), (-2.0, -2.0), (1e-300, 1.0), (-0.0, 4.0)] {
            let d = vector_direction(x, y).unwrap();
            assert!((0.0..360.0).contains(&d), "{d} out of range for ({x}, {y})");
        }
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new(UnitSystem::Us).with_day_summaries(
            "wind",
            vec![row(0), row(86_400), row(172_800)],
        )
    }

    #[tokio::test]
    async fn test_compute_widens_to_start_of_day() {
        let agg = DailySummaryAggregator::new(UTC);
        let out = agg
            .compute(
                &provider(),
                "wind",
                TimeSpan::new(86_400 + 7_200, 172_800),
                &[AggregateKind::Max, AggregateKind::VecDir, AggregateKind::MaxTime],
            )
            .await
            .unwrap();

        assert_eq!(out.time.values, vec![86_400]);
        let max = out.get(&AggregateKind::Max).unwrap();
        assert_eq!(max.values, vec![Some(20.0)]);
        assert_eq!(max.unit, Some(Unit::MilePerHour));
        assert_eq!(
            out.get(&AggregateKind::VecDir).unwrap().group,
            Some(UnitGroup::Direction)
        );
        assert_eq!(
            out.get(&AggregateKind::MaxTime).unwrap().group,
            Some(UnitGroup::Time)
        );
    }

    #[tokio::test]
    async fn test_compute_errors() {
        let agg = DailySummaryAggregator::new(UTC);
        let span = TimeSpan::new(0, 86_400);

        let err = agg
            .compute(&provider(), "outTemp", span, &[AggregateKind::Min])
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::NoSuchAggregationSource(ref obs) if obs == "outTemp"));
        assert!(err.is_unknown_type());

        let err = agg
            .compute(&MemoryProvider::empty(), "wind", span, &[AggregateKind::Min])
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::NoData));

        let err = agg
            .compute(&provider(), "wind", TimeSpan::new(10, 5), &[AggregateKind::Min])
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::InvalidTimespan(_)));
    }
}
