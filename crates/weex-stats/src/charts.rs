//! Week and year chart bundles
//!
//! A bundle is a flat JSON object of chart series keyed the way the chart
//! templates expect. An observation the archive does not hold becomes
//! `null`; a binding that is not configured fails the whole bundle.

use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use weex_core::{
    utc_offset_minutes, week_span, year_span, AggregateKind, AggregateType, ProviderError,
    SeriesAggregate, SeriesProvider, TimeVector, Timestamp, UnitConverter, UnitSystem,
    ValueVector, DEFAULT_BINDING,
};

use crate::context::ChartContext;
use crate::day_summary::DailySummaryAggregator;
use crate::json::{pairs, zip_vectors};
use crate::{StatsError, StatsResult};

const HOUR_MS: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Default,
    AppTemp,
    Insolation,
}

impl ChartContext {
    fn binding_name(&self, binding: Binding) -> &str {
        match binding {
            Binding::Default => DEFAULT_BINDING,
            Binding::AppTemp => &self.apptemp_binding,
            Binding::Insolation => &self.insolation_binding,
        }
    }
}

struct WeekChart {
    key: &'static str,
    obs: &'static str,
    binding: Binding,
    hourly_sum: bool,
}

const fn week(key: &'static str, obs: &'static str) -> WeekChart {
    WeekChart {
        key,
        obs,
        binding: Binding::Default,
        hourly_sum: false,
    }
}

const WEEK_CHARTS: &[WeekChart] = &[
    week("outTempWeekjson", "outTemp"),
    week("dewpointWeekjson", "dewpoint"),
    WeekChart {
        binding: Binding::AppTemp,
        ..week("appTempWeekjson", "appTemp")
    },
    week("windchillWeekjson", "windchill"),
    week("heatindexWeekjson", "heatindex"),
    week("outHumidityWeekjson", "outHumidity"),
    week("barometerWeekjson", "barometer"),
    week("windSpeedWeekjson", "windSpeed"),
    week("windGustWeekjson", "windGust"),
    week("windDirWeekjson", "windDir"),
    WeekChart {
        hourly_sum: true,
        ..week("rainWeekjson", "rain")
    },
    week("radiationWeekjson", "radiation"),
    WeekChart {
        binding: Binding::Insolation,
        ..week("insolationWeekjson", "maxSolarRad")
    },
    week("uvWeekjson", "UV"),
];

struct YearChart {
    name: &'static str,
    obs: &'static str,
    binding: Binding,
    kinds: &'static [&'static str],
    /// Replaces `<name>_<kind>_json` for single-kind charts
    key: Option<&'static str>,
}

const MIN_MAX_AVG: &[&str] = &["min", "max", "avg"];
const MAX_AVG: &[&str] = &["max", "avg"];

const fn year(name: &'static str, obs: &'static str, kinds: &'static [&'static str]) -> YearChart {
    YearChart {
        name,
        obs,
        binding: Binding::Default,
        kinds,
        key: None,
    }
}

const YEAR_CHARTS: &[YearChart] = &[
    year("outtemp", "outTemp", MIN_MAX_AVG),
    YearChart {
        binding: Binding::AppTemp,
        ..year("app_temp", "appTemp", MIN_MAX_AVG)
    },
    year("windchill", "windchill", &["avg"]),
    year("heatindex", "heatindex", &["avg"]),
    year("outhumidity", "outHumidity", MIN_MAX_AVG),
    year("barometer", "barometer", MIN_MAX_AVG),
    year("wind", "wind", MAX_AVG),
    year("windspeed", "windSpeed", MAX_AVG),
    YearChart {
        key: Some("winddir_json"),
        ..year("winddir", "wind", &["vecdir"])
    },
    year("rain", "rain", &["sum"]),
    year("radiation", "radiation", MIN_MAX_AVG),
    year("uv", "UV", MIN_MAX_AVG),
];

impl YearChart {
    fn kind_key(&self, kind: &str) -> String {
        match self.key {
            Some(key) => key.to_string(),
            None => format!("{}_{}_json", self.name, kind),
        }
    }

    fn has_min_max(&self) -> bool {
        self.kinds.contains(&"min") && self.kinds.contains(&"max")
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.kinds.iter().map(|k| self.kind_key(k)).collect();
        if self.has_min_max() {
            keys.push(format!("{}_min_max_json", self.name));
        }
        keys
    }
}

/// Convert to display units and round to the display precision
fn display_values(ctx: &ChartContext, vector: &ValueVector) -> StatsResult<Vec<Option<f64>>> {
    let converted = ctx.converter.convert(vector)?;
    Ok(ctx.formatter.round_vector(&converted))
}

async fn archive_system(provider: &dyn SeriesProvider) -> StatsResult<UnitSystem> {
    provider.unit_system().await?.ok_or(StatsError::NoData)
}

/// Raw series for the seven days up to `stop`, starting at local midnight
#[instrument(skip(ctx))]
pub async fn week_bundle(ctx: &ChartContext, stop: Timestamp) -> StatsResult<Map<String, Value>> {
    let started = Instant::now();
    let span = week_span(stop, &ctx.tz)?;
    archive_system(ctx.registry.default_provider()?.as_ref()).await?;

    let mut bundle = Map::new();
    for chart in WEEK_CHARTS {
        let provider = ctx.registry.lookup(ctx.binding_name(chart.binding))?;
        let aggregate = chart
            .hourly_sum
            .then(|| SeriesAggregate::new(AggregateType::Sum, 3_600));

        let value = match provider.get_series(chart.obs, span, aggregate).await {
            Ok(series) => {
                let values = display_values(ctx, &series.data)?;
                let mut time_ms = series.stop.to_millis();
                if chart.hourly_sum {
                    extend_partial_hour(&mut time_ms);
                }
                pairs(&time_ms, &values)
            }
            Err(ProviderError::UnknownType(obs)) => {
                warn!("Unknown type '{}', omitting {}", obs, chart.key);
                Value::Null
            }
            Err(e) => return Err(e.into()),
        };
        bundle.insert(chart.key.to_string(), value);
    }

    bundle.insert("utcOffset".into(), json!(utc_offset_minutes(stop, &ctx.tz)));
    bundle.insert("weekPlotStart".into(), json!(span.start * 1000));
    bundle.insert("weekPlotEnd".into(), json!(stop * 1000));

    info!(
        "Week bundle built in {:.3}s",
        started.elapsed().as_secs_f64()
    );
    Ok(bundle)
}

/// Widen a trailing partial hour to a full one so the last column renders
fn extend_partial_hour(time_ms: &mut [f64]) {
    if let [.., prev, last] = time_ms {
        if *last < *prev + HOUR_MS {
            *last = *prev + HOUR_MS;
        }
    }
}

/// Per-day aggregates for the year up to `stop`
#[instrument(skip(ctx))]
pub async fn year_bundle(ctx: &ChartContext, stop: Timestamp) -> StatsResult<Map<String, Value>> {
    let started = Instant::now();
    let span = year_span(stop, &ctx.tz)?;
    let aggregator = DailySummaryAggregator::new(ctx.tz);
    let default_system = archive_system(ctx.registry.default_provider()?.as_ref()).await?;

    let mut bundle = Map::new();
    for chart in YEAR_CHARTS {
        let binding = ctx.binding_name(chart.binding);
        let provider = ctx.registry.lookup(binding)?;
        let system = if binding == DEFAULT_BINDING {
            Some(default_system)
        } else {
            provider.unit_system().await?
        };
        let kinds: Vec<AggregateKind> = chart.kinds.iter().map(|k| AggregateKind::parse(k)).collect();

        let result = match system {
            Some(system) => {
                aggregator
                    .compute_with_units(provider.as_ref(), system, chart.obs, span, &kinds)
                    .await
            }
            None => Err(StatsError::NoData),
        };
        let vectors = match result {
            Ok(vectors) => vectors,
            Err(e) if e.is_unknown_type() || matches!(e, StatsError::NoData) => {
                warn!("No {} data for {}: {}", chart.obs, chart.name, e);
                for key in chart.keys() {
                    bundle.insert(key, Value::Null);
                }
                continue;
            }
            Err(e) => return Err(e),
        };

        insert_year_chart(ctx, &mut bundle, chart, &vectors.time, |kind| {
            vectors.get(kind)
        })?;
    }

    bundle.insert("utcOffset".into(), json!(utc_offset_minutes(stop, &ctx.tz)));
    bundle.insert("yearPlotStart".into(), json!(span.start * 1000));
    bundle.insert("yearPlotEnd".into(), json!(stop * 1000));

    info!(
        "Year bundle built in {:.3}s",
        started.elapsed().as_secs_f64()
    );
    Ok(bundle)
}

fn insert_year_chart<'a>(
    ctx: &ChartContext,
    bundle: &mut Map<String, Value>,
    chart: &YearChart,
    time: &TimeVector,
    vector_for: impl Fn(&AggregateKind) -> Option<&'a ValueVector>,
) -> StatsResult<()> {
    let time_ms = time.to_millis();
    let mut min = Vec::new();
    let mut max = Vec::new();

    for name in chart.kinds {
        let kind = AggregateKind::parse(name);
        let values = match vector_for(&kind) {
            Some(vector) => display_values(ctx, vector)?,
            None => vec![None; time_ms.len()],
        };
        bundle.insert(chart.kind_key(name), pairs(&time_ms, &values));
        match kind {
            AggregateKind::Min => min = values,
            AggregateKind::Max => max = values,
            _ => {}
        }
    }

    if chart.has_min_max() {
        bundle.insert(
            format!("{}_min_max_json", chart.name),
            zip_vectors(&time_ms, &[&min, &max]),
        );
    }
    Ok(())
}
