//! Wind rose binning
//!
//! Wind samples are sorted into compass sectors and seven speed bands. Band
//! 0 is calm; bands 1 to 6 are bounded by fractions of the observed maximum
//! speed rounded up to a multiple of ten. Counts become percentages of the
//! total sample count, ready for a stacked polar column chart.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono_tz::Tz;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use weewx_config::Setting;
use weex_core::{
    period_label, resolve_period, round_to, AggregateKind, AggregateType, Formatter, Period,
    SeriesAggregate, SeriesProvider, TimeSpan, UnitConverter, WindSample,
    SECONDS_PER_NOMINAL_MONTH, SECONDS_PER_WEEK,
};

use crate::day_summary::DailySummaryAggregator;
use crate::{StatsError, StatsResult};

pub const BANDS: usize = 7;
pub const DEFAULT_SPEED_FACTORS: [f64; BANDS] = [0.0, 0.1, 0.2, 0.3, 0.5, 0.7, 1.0];
pub const DEFAULT_PETAL_COLOURS: [&str; BANDS] = [
    "lightblue",
    "blue",
    "midnightblue",
    "forestgreen",
    "limegreen",
    "green",
    "greenyellow",
];
const DEFAULT_PETALS: usize = 8;
/// Maximum speed assumed when no speed sample is present
const DEFAULT_MAX_SPEED: f64 = 10.0;
/// Sector width used by `legacy_sectors`, whatever the petal count
const LEGACY_SECTOR_WIDTH: f64 = 22.5;

const DIRECTIONS_16: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];
const DIRECTIONS_8: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
const DIRECTIONS_4: [&str; 4] = ["N", "E", "S", "W"];

/// Which wind observation the rose is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindSource {
    Speed,
    Gust,
}

impl WindSource {
    pub fn speed_obs(&self) -> &'static str {
        match self {
            WindSource::Speed => "windSpeed",
            WindSource::Gust => "windGust",
        }
    }

    pub fn direction_obs(&self) -> &'static str {
        match self {
            WindSource::Speed => "windDir",
            WindSource::Gust => "windGustDir",
        }
    }

    fn legend_name(&self) -> &'static str {
        match self {
            WindSource::Speed => "Wind Speed",
            WindSource::Gust => "Wind Gust",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindRoseConfig {
    pub title: String,
    pub source: WindSource,
    pub aggregate_type: Option<AggregateType>,
    /// Seconds
    pub aggregate_interval: Option<i64>,
    pub speed_factors: [f64; BANDS],
    pub petal_colours: Vec<String>,
    pub petals: usize,
    pub show_legend_title: bool,
    pub show_band_percent: bool,
    pub precision: usize,
    /// Bullseye size as a percentage of the y axis range
    pub bullseye_size: f64,
    pub bullseye_colour: String,
    /// Speeds at or below this (display units) count as calm
    pub calm_limit: f64,
    pub periods: Vec<String>,
    /// Use a fixed 22.5 degree sector width instead of 360 / petals
    pub legacy_sectors: bool,
}

impl Default for WindRoseConfig {
    fn default() -> Self {
        Self {
            title: "Wind Rose".to_string(),
            source: WindSource::Speed,
            aggregate_type: None,
            aggregate_interval: None,
            speed_factors: DEFAULT_SPEED_FACTORS,
            petal_colours: DEFAULT_PETAL_COLOURS.iter().map(|c| c.to_string()).collect(),
            petals: DEFAULT_PETALS,
            show_legend_title: true,
            show_band_percent: true,
            precision: 1,
            bullseye_size: 3.0,
            bullseye_colour: "white".to_string(),
            calm_limit: 0.1,
            periods: vec!["day".to_string()],
            legacy_sectors: false,
        }
    }
}

fn hex_colour(colour: &str) -> String {
    match colour.strip_prefix("0x") {
        Some(hex) => format!("#{hex}"),
        None => colour.to_string(),
    }
}

impl WindRoseConfig {
    /// Build from a loosely typed section, replacing bad values with defaults
    pub fn from_section(section: &BTreeMap<String, Setting>) -> Self {
        let mut cfg = Self::default();

        if let Some(title) = section.get("title").and_then(Setting::as_str) {
            cfg.title = title.trim().to_string();
        }

        if let Some(source) = section.get("source") {
            match source.as_str().map(str::trim) {
                Some("windSpeed") => cfg.source = WindSource::Speed,
                Some("windGust") => cfg.source = WindSource::Gust,
                _ => warn!("Unknown wind rose source {:?}, using windSpeed", source),
            }
        }

        cfg.aggregate_type = section
            .get("aggregate_type")
            .and_then(Setting::as_str)
            .and_then(|s| s.parse::<AggregateType>().ok())
            .filter(|t| matches!(t, AggregateType::Avg | AggregateType::Max | AggregateType::Min));

        cfg.aggregate_interval = section
            .get("aggregate_interval")
            .and_then(Setting::as_int)
            .filter(|i| *i > 0);

        if let Some(setting) = section.get("speedfactor") {
            match parse_speed_factors(setting) {
                Some(factors) => cfg.speed_factors = factors,
                None => warn!("Invalid speedfactor {:?}, using defaults", setting),
            }
        }

        if let Some(setting) = section.get("petal_colors") {
            let items = setting.as_list();
            if items.len() == BANDS {
                cfg.petal_colours = items
                    .iter()
                    .zip(DEFAULT_PETAL_COLOURS)
                    .map(|(item, default)| match item.as_str().map(str::trim) {
                        Some(c) if !c.is_empty() => hex_colour(c),
                        _ => default.to_string(),
                    })
                    .collect();
            } else {
                warn!("petal_colors needs {} entries, using defaults", BANDS);
            }
        }

        if let Some(setting) = section.get("petals") {
            match setting.as_int() {
                Some(p @ (4 | 8 | 16)) => cfg.petals = p as usize,
                _ => warn!("Invalid petal count {:?}, using {}", setting, DEFAULT_PETALS),
            }
        }

        if let Some(b) = section
            .get("show_legend_title")
            .or_else(|| section.get("legend_title"))
            .and_then(Setting::as_bool)
        {
            cfg.show_legend_title = b;
        }
        if let Some(b) = section
            .get("show_band_percent")
            .or_else(|| section.get("band_percent"))
            .and_then(Setting::as_bool)
        {
            cfg.show_band_percent = b;
        }

        if let Some(p) = section
            .get("precision")
            .and_then(Setting::as_int)
            .filter(|p| (0..=10).contains(p))
        {
            cfg.precision = p as usize;
        }
        if let Some(size) = section
            .get("bullseye_size")
            .and_then(Setting::as_float)
            .filter(|s| *s >= 0.0)
        {
            cfg.bullseye_size = size;
        }
        if let Some(colour) = section.get("bullseye_color").and_then(Setting::as_str) {
            cfg.bullseye_colour = hex_colour(colour.trim());
        }
        if let Some(limit) = section.get("calm_limit").and_then(Setting::as_float) {
            cfg.calm_limit = limit;
        }

        if let Some(setting) = section.get("period") {
            let periods: Vec<String> = setting
                .as_list()
                .iter()
                .filter_map(|p| match p {
                    Setting::Str(s) => Some(s.trim().to_string()),
                    Setting::Int(i) => Some(i.to_string()),
                    _ => None,
                })
                .filter(|p| !p.is_empty())
                .collect();
            if !periods.is_empty() {
                cfg.periods = periods;
            }
        }

        if let Some(b) = section.get("legacy_sectors").and_then(Setting::as_bool) {
            cfg.legacy_sectors = b;
        }

        cfg
    }

    /// Compass point names, one per sector
    pub fn directions(&self) -> &'static [&'static str] {
        match self.petals {
            16 => &DIRECTIONS_16,
            4 => &DIRECTIONS_4,
            _ => &DIRECTIONS_8,
        }
    }

    pub fn sector_width(&self) -> f64 {
        if self.legacy_sectors {
            LEGACY_SECTOR_WIDTH
        } else {
            360.0 / self.petals as f64
        }
    }

    /// Sector index for a bearing; sector 0 is centred on north
    pub fn sector_for(&self, direction: f64) -> usize {
        let w = self.sector_width();
        (((direction + w / 2.0) / w).floor() as i64).rem_euclid(self.petals as i64) as usize
    }

    /// Series aggregation to use for a period of the given length
    pub fn aggregation_for(&self, period_seconds: i64) -> Option<SeriesAggregate> {
        let (mut agg_type, mut interval) = (self.aggregate_type, self.aggregate_interval);
        if period_seconds >= SECONDS_PER_NOMINAL_MONTH {
            agg_type = agg_type.or(Some(AggregateType::Avg));
            interval = interval.or(Some(86_400));
        } else if period_seconds >= SECONDS_PER_WEEK {
            interval = interval.or(Some(3_600));
        }
        Some(SeriesAggregate::new(agg_type?, interval?))
    }
}

fn parse_speed_factors(setting: &Setting) -> Option<[f64; BANDS]> {
    let values: Vec<f64> = setting
        .as_list()
        .iter()
        .map(Setting::as_float)
        .collect::<Option<_>>()?;
    let factors: [f64; BANDS] = values.try_into().ok()?;
    let in_range = factors.iter().all(|f| (0.0..=1.0).contains(f));
    let ordered = factors.windows(2).all(|w| w[0] <= w[1]);
    (in_range && ordered).then_some(factors)
}

/// A binned wind rose
#[derive(Debug, Clone, PartialEq)]
pub struct WindRoseResult {
    /// Percentages per band (rows) and sector (columns). Row 0 stays empty
    /// because calm samples are drawn as the bullseye.
    pub table: Vec<Vec<f64>>,
    /// Share of each band across all sectors; entry 0 includes every calm sample
    pub band_percent: [f64; BANDS],
    /// Calm samples without a sector, drawn as the bullseye
    pub calm_percent: f64,
    /// Lower speed bound of each band
    pub speed_bounds: [f64; BANDS],
    pub max_speed_range: f64,
    pub max_y_axis: f64,
    pub bullseye_radius: f64,
    pub legend_labels: Vec<String>,
    pub legend_no_labels: Vec<String>,
    pub categories: Vec<String>,
    pub colours: Vec<String>,
    pub title: String,
    pub legend_title: Option<String>,
    pub legend_title_no_label: Option<String>,
    pub bullseye_colour: String,
    pub bullseye_text: String,
    pub samples: usize,
}

impl WindRoseResult {
    /// Chart-ready JSON object, bands ordered highest speed first
    pub fn to_json(&self) -> Value {
        let series = |labels: &[String]| -> Vec<Value> {
            (1..BANDS)
                .rev()
                .map(|band| json!({"name": labels[band], "data": self.table[band]}))
                .collect()
        };
        json!({
            "windrose": series(&self.legend_labels),
            "windroseNoLabel": series(&self.legend_no_labels),
            "categories": self.categories,
            "yAxis": {"max": self.max_y_axis, "min": -self.bullseye_radius},
            "colors": self.colours,
            "title": [self.title],
            "legendTitle": [self.legend_title],
            "legendTitleNoLabel": [self.legend_title_no_label],
            "bullseye": {
                "radius": self.bullseye_radius,
                "color": self.bullseye_colour,
                "text": self.bullseye_text,
            },
        })
    }
}

/// Bin wind samples. `max_speed` is the largest speed among them (display
/// units); `units` labels the speed bands.
pub fn bin_samples(
    config: &WindRoseConfig,
    wind: &[WindSample],
    max_speed: Option<f64>,
    units: &str,
) -> StatsResult<WindRoseResult> {
    let samples = wind.len();
    if samples == 0 {
        return Err(StatsError::InsufficientData);
    }
    let petals = config.petals;
    let precision = config.precision;
    let pct = |count: usize| round_to(count as f64 * 100.0 / samples as f64, precision);

    let mut max_speed_range = (max_speed.unwrap_or(DEFAULT_MAX_SPEED) / 10.0).ceil() * 10.0;
    if max_speed_range <= 0.0 {
        max_speed_range = DEFAULT_MAX_SPEED;
    }
    let mut speed_bounds = config.speed_factors.map(|f| f * max_speed_range);
    // Anything above the calm limit is at least band 1
    speed_bounds[0] = 0.0;

    let mut counts = vec![vec![0usize; petals]; BANDS];
    let mut calm = 0usize;
    for sample in wind {
        let (Some(speed), Some(direction)) = (sample.speed, sample.direction) else {
            calm += 1;
            continue;
        };
        if speed <= config.calm_limit {
            calm += 1;
            continue;
        }
        let sector = config.sector_for(direction);
        let band = (1..BANDS - 1)
            .rev()
            .find(|b| speed > speed_bounds[*b])
            .map_or(1, |b| b + 1);
        counts[band][sector] += 1;
    }

    let table: Vec<Vec<f64>> = counts
        .iter()
        .map(|row| row.iter().map(|c| pct(*c)).collect())
        .collect();

    let sector_max = (0..petals)
        .map(|s| counts.iter().map(|row| row[s]).sum::<usize>())
        .max()
        .unwrap_or(0);
    let max_y_axis = ((pct(sector_max) / 10.0).ceil() * 10.0).max(10.0);
    let bullseye_radius = max_y_axis * config.bullseye_size / 100.0;

    let mut band_percent = [0.0; BANDS];
    for (band, row) in counts.iter().enumerate() {
        let calm_share = if band == 0 { calm } else { 0 };
        band_percent[band] = pct(row.iter().sum::<usize>() + calm_share);
    }
    let calm_percent = pct(calm);

    let fmt_pct = |p: f64| format!("{:.*}", precision, p);
    let mut legend_labels = Vec::with_capacity(BANDS);
    let mut legend_no_labels = Vec::with_capacity(BANDS);
    let calm_label = if config.show_band_percent {
        format!("Calm ({}%)", fmt_pct(band_percent[0]))
    } else {
        "Calm".to_string()
    };
    legend_labels.push(calm_label.clone());
    legend_no_labels.push(calm_label);
    for band in 1..BANDS {
        let lo = speed_bounds[band - 1].round() as i64;
        let hi = speed_bounds[band].round() as i64;
        if config.show_band_percent {
            let p = fmt_pct(band_percent[band]);
            legend_labels.push(format!("{lo}-{hi}{units} ({p}%)"));
            legend_no_labels.push(format!("{lo}-{hi} ({p}%)"));
        } else {
            legend_labels.push(format!("{lo}-{hi}{units}"));
            legend_no_labels.push(format!("{lo}-{hi}"));
        }
    }

    let (legend_title, legend_title_no_label) = if config.show_legend_title {
        let name = config.source.legend_name();
        (Some(name.to_string()), Some(format!("{name}<br>({units})")))
    } else {
        (None, None)
    };

    Ok(WindRoseResult {
        table,
        band_percent,
        calm_percent,
        speed_bounds,
        max_speed_range,
        max_y_axis,
        bullseye_radius,
        legend_labels,
        legend_no_labels,
        categories: config.directions().iter().map(|d| d.to_string()).collect(),
        colours: config.petal_colours.clone(),
        title: config.title.clone(),
        legend_title,
        legend_title_no_label,
        bullseye_colour: config.bullseye_colour.clone(),
        bullseye_text: format!("{}%", fmt_pct(calm_percent)),
        samples,
    })
}

/// Computes wind roses from a series provider
#[derive(Clone)]
pub struct WindRoseBinner {
    config: WindRoseConfig,
    converter: Arc<dyn UnitConverter>,
    formatter: Formatter,
    tz: Tz,
}

impl WindRoseBinner {
    pub fn new(
        config: WindRoseConfig,
        converter: Arc<dyn UnitConverter>,
        formatter: Formatter,
        tz: Tz,
    ) -> Self {
        Self {
            config,
            converter,
            formatter,
            tz,
        }
    }

    pub fn config(&self) -> &WindRoseConfig {
        &self.config
    }

    /// Wind rose for the `period_seconds` ending at `timespan.stop`.
    ///
    /// Up to a week uses archive samples; longer periods use daily average
    /// speed and resultant direction from the `wind` day summary.
    #[instrument(skip(self, provider))]
    pub async fn compute(
        &self,
        provider: &dyn SeriesProvider,
        timespan: TimeSpan,
        period_seconds: i64,
    ) -> StatsResult<WindRoseResult> {
        let started = Instant::now();
        let stop = timespan.stop;
        let source = self.config.source;

        // Providers exclude the start stamp, so raw samples cover [stop - period + 1, stop]
        let span = TimeSpan::new(stop - period_seconds, stop);

        let (times, speed, directions) = if period_seconds <= SECONDS_PER_WEEK {
            let agg = self.config.aggregation_for(period_seconds);
            // Averaging bearings is meaningless, keep the last one per interval
            let dir_agg = agg.map(|a| SeriesAggregate::new(AggregateType::Last, a.interval));
            let speed = provider.get_series(source.speed_obs(), span, agg).await?;
            let direction = provider
                .get_series(source.direction_obs(), span, dir_agg)
                .await?;
            (speed.stop.values, speed.data, direction.data.values)
        } else {
            let mut out = DailySummaryAggregator::new(self.tz)
                .compute(
                    provider,
                    "wind",
                    span,
                    &[AggregateKind::Avg, AggregateKind::VecDir],
                )
                .await?;
            let speed = out
                .aggregates
                .remove(&AggregateKind::Avg)
                .ok_or(StatsError::NoData)?;
            let direction = out
                .aggregates
                .remove(&AggregateKind::VecDir)
                .ok_or(StatsError::NoData)?;
            (out.time.values, speed, direction.values)
        };

        let speed = self.converter.convert(&speed)?;
        let units = self.formatter.label(speed.unit).trim().to_string();
        debug!("Binning {} samples in {}", speed.len(), units);
        let wind: Vec<WindSample> = times
            .iter()
            .zip(&speed.values)
            .enumerate()
            .map(|(i, (timestamp, speed))| WindSample {
                timestamp: *timestamp,
                speed: *speed,
                direction: directions.get(i).copied().flatten(),
            })
            .collect();
        let result = bin_samples(&self.config, &wind, speed.max_value(), &units)?;

        info!(
            period_seconds,
            samples = result.samples,
            "Wind rose computed in {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(result)
    }

    /// Wind roses for every configured period, keyed `wr<period>`
    pub async fn compute_periods(
        &self,
        provider: &dyn SeriesProvider,
        stop: i64,
    ) -> StatsResult<BTreeMap<String, WindRoseResult>> {
        let mut roses = BTreeMap::new();
        let mut first_good = None;
        for raw in &self.config.periods {
            let period = Period::parse(raw);
            if period == Period::AllTime && first_good.is_none() {
                first_good = provider.first_good_stamp().await?;
            }
            let resolved = resolve_period(period, stop, &self.tz, first_good)?;
            let rose = self
                .compute(provider, TimeSpan::new(resolved.start, stop), resolved.seconds)
                .await?;
            roses.insert(format!("wr{}", period_label(raw, resolved.seconds)), rose);
        }
        Ok(roses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;
    use weex_core::{
        Converter, DaySummaryRecord, MemoryProvider, UnitSystem, ValueVector, VectorSums,
    };

    fn section(entries: &[(&str, Setting)]) -> BTreeMap<String, Setting> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn s(v: &str) -> Setting {
        Setting::Str(v.to_string())
    }

    #[test]
    fn test_config_defaults() {
        let cfg = WindRoseConfig::from_section(&BTreeMap::new());
        assert_eq!(cfg, WindRoseConfig::default());
        assert_eq!(cfg.petals, 8);
        assert_eq!(cfg.directions().len(), 8);
        assert_eq!(cfg.source.direction_obs(), "windDir");
    }

    #[test]
    fn test_config_malformed_values_fall_back() {
        let cfg = WindRoseConfig::from_section(&section(&[
            ("petals", Setting::Int(12)),
            ("speedfactor", Setting::List(vec![Setting::Float(0.5); 3])),
            ("source", s("rain")),
            ("aggregate_type", s("sum")),
            ("calm_limit", s("calm")),
            ("precision", s("x")),
        ]));
        assert_eq!(cfg.petals, 8);
        assert_eq!(cfg.speed_factors, DEFAULT_SPEED_FACTORS);
        assert_eq!(cfg.source, WindSource::Speed);
        assert_eq!(cfg.aggregate_type, None);
        assert_eq!(cfg.calm_limit, 0.1);
        assert_eq!(cfg.precision, 1);

        let decreasing: Vec<Setting> = [0.0, 0.2, 0.1, 0.3, 0.5, 0.7, 1.0]
            .into_iter()
            .map(Setting::Float)
            .collect();
        let cfg = WindRoseConfig::from_section(&section(&[("speedfactor", Setting::List(decreasing))]));
        assert_eq!(cfg.speed_factors, DEFAULT_SPEED_FACTORS);
    }

    #[test]
    fn test_config_parsed_values() {
        let colours = vec![
            s("0xff0000"),
            s("blue"),
            Setting::Int(3),
            s("red"),
            s("red"),
            s("red"),
            s("0x00ff00"),
        ];
        let cfg = WindRoseConfig::from_section(&section(&[
            ("petals", s("16")),
            ("source", s("windGust")),
            ("petal_colors", Setting::List(colours)),
            ("bullseye_color", s("0x123456")),
            ("aggregate_type", s("max")),
            ("aggregate_interval", Setting::Int(600)),
            ("period", s("week")),
            ("legend_title", s("false")),
        ]));
        assert_eq!(cfg.petals, 16);
        assert_eq!(cfg.source.direction_obs(), "windGustDir");
        assert_eq!(cfg.petal_colours[0], "#ff0000");
        assert_eq!(cfg.petal_colours[2], "midnightblue");
        assert_eq!(cfg.petal_colours[6], "#00ff00");
        assert_eq!(cfg.bullseye_colour, "#123456");
        assert_eq!(cfg.periods, vec!["week"]);
        assert!(!cfg.show_legend_title);
        assert_eq!(
            cfg.aggregation_for(3_600),
            Some(SeriesAggregate::new(AggregateType::Max, 600))
        );
    }

    #[test]
    fn test_aggregation_defaults_per_period() {
        let cfg = WindRoseConfig::default();
        assert_eq!(cfg.aggregation_for(86_400), None);
        assert_eq!(cfg.aggregation_for(SECONDS_PER_WEEK), None);
        assert_eq!(
            cfg.aggregation_for(SECONDS_PER_NOMINAL_MONTH),
            Some(SeriesAggregate::new(AggregateType::Avg, 86_400))
        );

        let with_type = WindRoseConfig {
            aggregate_type: Some(AggregateType::Max),
            ..WindRoseConfig::default()
        };
        assert_eq!(
            with_type.aggregation_for(SECONDS_PER_WEEK),
            Some(SeriesAggregate::new(AggregateType::Max, 3_600))
        );
        // the defaults never leak between periods
        assert_eq!(with_type.aggregation_for(86_400), None);
    }

    #[test]
    fn test_sector_width_interpretations() {
        let scaled = WindRoseConfig::default();
        let legacy = WindRoseConfig {
            legacy_sectors: true,
            ..WindRoseConfig::default()
        };
        assert_eq!(scaled.sector_for(45.0), 1);
        assert_eq!(legacy.sector_for(45.0), 2);
        assert_eq!(scaled.sector_for(350.0), 0);
        assert_eq!(scaled.sector_for(22.4), 0);
        assert_eq!(scaled.sector_for(22.5), 1);

        let sixteen = WindRoseConfig {
            petals: 16,
            ..WindRoseConfig::default()
        };
        let sixteen_legacy = WindRoseConfig {
            legacy_sectors: true,
            ..sixteen.clone()
        };
        for dir in [0.0, 11.25, 100.0, 348.75, 359.9] {
            assert_eq!(sixteen.sector_for(dir), sixteen_legacy.sector_for(dir));
        }
    }

    fn bin(
        cfg: &WindRoseConfig,
        speeds: &[Option<f64>],
        dirs: &[Option<f64>],
        units: &str,
    ) -> StatsResult<WindRoseResult> {
        let wind: Vec<WindSample> = speeds
            .iter()
            .zip(dirs)
            .enumerate()
            .map(|(i, (speed, direction))| WindSample {
                timestamp: i as i64 * 300,
                speed: *speed,
                direction: *direction,
            })
            .collect();
        let max_speed = ValueVector::untagged(speeds.to_vec()).max_value();
        bin_samples(cfg, &wind, max_speed, units)
    }

    fn scenario() -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let mut speeds = vec![Some(5.0); 50];
        let mut dirs = vec![Some(0.0); 50];
        speeds.extend(vec![Some(0.0); 50]);
        dirs.extend(vec![None; 50]);
        (speeds, dirs)
    }

    #[test]
    fn test_scenario_band_and_scaling() {
        let cfg = WindRoseConfig::default();
        let (speeds, dirs) = scenario();
        let rose = bin(&cfg, &speeds, &dirs, "km/h").unwrap();

        assert_eq!(rose.max_speed_range, 10.0);
        assert_eq!(rose.speed_bounds, [0.0, 1.0, 2.0, 3.0, 5.0, 7.0, 10.0]);
        // 5 is not above the 5 boundary, so it lands in band 4
        assert_eq!(rose.table[4][0], 50.0);
        assert_eq!(rose.table[5][0], 0.0);
        assert_eq!(rose.calm_percent, 50.0);
        assert_eq!(rose.max_y_axis, 50.0);
        assert_eq!(rose.bullseye_radius, 1.5);
        assert_eq!(rose.bullseye_text, "50.0%");

        insta::assert_snapshot!(
            rose.legend_labels.join(" | "),
            @"Calm (50.0%) | 0-1km/h (0.0%) | 1-2km/h (0.0%) | 2-3km/h (0.0%) | 3-5km/h (50.0%) | 5-7km/h (0.0%) | 7-10km/h (0.0%)"
        );
        insta::assert_snapshot!(
            rose.legend_no_labels[4].as_str(),
            @"3-5 (50.0%)"
        );
    }

    #[test]
    fn test_calm_limit_is_inclusive() {
        let cfg = WindRoseConfig {
            calm_limit: 2.0,
            ..WindRoseConfig::default()
        };
        let rose = bin(
            &cfg,
            &[Some(2.0), Some(2.01), Some(10.0)],
            &[Some(90.0), Some(90.0), Some(90.0)],
            "mph",
        )
        .unwrap();
        let calm = round_to(100.0 / 3.0, 1);
        assert_eq!(rose.calm_percent, calm);
        // 2.01 is above 2.0 (factor 0.2 of 10) so it goes to band 3
        assert_eq!(rose.table[3][2], calm);
        assert_eq!(rose.table[6][2], calm);
    }

    #[test]
    fn test_percentage_law() {
        let cfg = WindRoseConfig {
            petals: 16,
            precision: 2,
            ..WindRoseConfig::default()
        };
        let speeds: Vec<Option<f64>> = (0..97)
            .map(|i| if i % 11 == 0 { None } else { Some((i % 23) as f64 * 1.37) })
            .collect();
        let dirs: Vec<Option<f64>> = (0..97)
            .map(|i| if i % 13 == 0 { None } else { Some((i * 37 % 360) as f64) })
            .collect();
        let rose = bin(&cfg, &speeds, &dirs, "m/s").unwrap();

        let table_total: f64 = rose.table.iter().flatten().sum();
        let tolerance = (16 * BANDS) as f64 * 10f64.powi(-2);
        assert!((table_total + rose.calm_percent - 100.0).abs() <= tolerance);

        let bands_total: f64 = rose.band_percent.iter().sum();
        assert!((bands_total - 100.0).abs() <= 0.07);
    }

    #[test]
    fn test_nonzero_first_factor_keeps_band_one_from_zero() {
        let cfg = WindRoseConfig {
            speed_factors: [0.1, 0.2, 0.3, 0.4, 0.5, 0.7, 1.0],
            ..WindRoseConfig::default()
        };
        let rose = bin(
            &cfg,
            &[Some(0.5), Some(10.0)],
            &[Some(0.0), Some(0.0)],
            "m/s",
        )
        .unwrap();

        assert_eq!(rose.speed_bounds[0], 0.0);
        assert!(rose.table[0].iter().all(|p| *p == 0.0));
        assert_eq!(rose.table[1][0], 50.0);
        assert_eq!(rose.table[6][0], 50.0);
        let charted: f64 = rose.table[1..].iter().flatten().sum();
        assert_eq!(charted + rose.calm_percent, 100.0);
        assert_eq!(rose.legend_labels[1], "0-2m/s (50.0%)");
    }

    #[test]
    fn test_zero_and_null_samples() {
        let cfg = WindRoseConfig::default();
        assert!(matches!(
            bin(&cfg, &[], &[], "m/s"),
            Err(StatsError::InsufficientData)
        ));

        let rose = bin(&cfg, &[None, None], &[Some(10.0), None], "m/s").unwrap();
        assert_eq!(rose.max_speed_range, 10.0);
        assert_eq!(rose.calm_percent, 100.0);
        assert_eq!(rose.max_y_axis, 10.0);
    }

    #[test]
    fn test_json_shape() {
        let cfg = WindRoseConfig::default();
        let (speeds, dirs) = scenario();
        let json = bin(&cfg, &speeds, &dirs, "km/h").unwrap().to_json();

        let bands = json["windrose"].as_array().unwrap();
        assert_eq!(bands.len(), 6);
        assert_eq!(bands[0]["name"], "7-10km/h (0.0%)");
        assert_eq!(bands[2]["data"][0], 50.0);
        assert_eq!(json["windroseNoLabel"][5]["name"], "0-1 (0.0%)");
        assert_eq!(json["categories"].as_array().unwrap().len(), 8);
        assert_eq!(json["yAxis"]["max"], 50.0);
        assert_eq!(json["yAxis"]["min"], -1.5);
        assert_eq!(json["legendTitle"][0], "Wind Speed");
        assert_eq!(json["legendTitleNoLabel"][0], "Wind Speed<br>(km/h)");
        assert_eq!(json["bullseye"]["color"], "white");
    }

    fn binner(config: WindRoseConfig) -> WindRoseBinner {
        WindRoseBinner::new(
            config,
            Arc::new(Converter::for_system(UnitSystem::Us)),
            Formatter::new(),
            UTC,
        )
    }

    const STOP: i64 = 1_700_006_400;

    fn archive_provider() -> MemoryProvider {
        let stamps: Vec<i64> = (0..288).map(|i| STOP - i * 300).collect();
        let speeds = stamps
            .iter()
            .enumerate()
            .map(|(i, ts)| (*ts, Some((i % 15) as f64)))
            .collect();
        let dirs = stamps
            .iter()
            .enumerate()
            .map(|(i, ts)| (*ts, if i % 15 == 0 { None } else { Some(180.0) }))
            .collect();
        MemoryProvider::new(UnitSystem::Us)
            .with_archive("windSpeed", speeds)
            .with_archive("windDir", dirs)
    }

    #[tokio::test]
    async fn test_compute_from_archive() {
        let rose = binner(WindRoseConfig::default())
            .compute(&archive_provider(), TimeSpan::new(STOP - 86_400, STOP), 86_400)
            .await
            .unwrap();
        assert_eq!(rose.samples, 288);
        assert_eq!(rose.max_speed_range, 20.0);
        assert!(rose.legend_labels[1].contains("mph"));
        // everything with a bearing blows from the south
        for band in 1..BANDS {
            for sector in [0, 1, 2, 3, 5, 6, 7] {
                assert_eq!(rose.table[band][sector], 0.0);
            }
        }
    }

    #[tokio::test]
    async fn test_compute_from_day_summaries() {
        let day = |day_start: i64, wsum: f64, xsum: f64, ysum: f64| DaySummaryRecord {
            day_start,
            count: Some(10),
            wsum: Some(wsum),
            sumtime: Some(50.0),
            vector: Some(VectorSums {
                xsum: Some(xsum),
                ysum: Some(ysum),
                ..Default::default()
            }),
            ..Default::default()
        };
        let provider = MemoryProvider::new(UnitSystem::Us).with_day_summaries(
            "wind",
            vec![
                day(STOP - 5 * 86_400, 500.0, 0.0, 3.0),
                day(STOP - 4 * 86_400, 1_000.0, 5.0, 0.0),
            ],
        );
        let rose = binner(WindRoseConfig::default())
            .compute(&provider, TimeSpan::new(STOP - 2_592_000, STOP), 2_592_000)
            .await
            .unwrap();

        assert_eq!(rose.samples, 2);
        assert_eq!(rose.max_speed_range, 20.0);
        assert_eq!(rose.table[4][0], 50.0);
        assert_eq!(rose.table[6][2], 50.0);
    }

    #[tokio::test]
    async fn test_compute_periods_keys() {
        let cfg = WindRoseConfig {
            periods: vec!["day".into(), "3600".into(), "fortnight".into()],
            ..WindRoseConfig::default()
        };
        let roses = binner(cfg)
            .compute_periods(&archive_provider(), STOP)
            .await
            .unwrap();
        let keys: Vec<&str> = roses.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["wr3600", "wr86400", "wrday"]);
        assert_eq!(roses["wr3600"].samples, 12);
    }

    #[tokio::test]
    async fn test_compute_from_gusts() {
        let stamps: Vec<i64> = (0..12).map(|i| STOP - i * 300).collect();
        let provider = MemoryProvider::new(UnitSystem::Us)
            .with_archive("windGust", stamps.iter().map(|ts| (*ts, Some(25.0))).collect())
            .with_archive(
                "windGustDir",
                stamps.iter().map(|ts| (*ts, Some(270.0))).collect(),
            );
        let cfg = WindRoseConfig {
            source: WindSource::Gust,
            ..WindRoseConfig::default()
        };
        let rose = binner(cfg)
            .compute(&provider, TimeSpan::new(STOP - 3600, STOP), 3600)
            .await
            .unwrap();

        assert_eq!(rose.samples, 12);
        assert_eq!(rose.max_speed_range, 30.0);
        assert_eq!(rose.table[6][6], 100.0);
        assert_eq!(rose.legend_title.as_deref(), Some("Wind Gust"));
    }

    #[tokio::test]
    async fn test_compute_includes_first_second_of_period() {
        let provider = MemoryProvider::new(UnitSystem::Us)
            .with_archive(
                "windSpeed",
                vec![(STOP - 3600, Some(4.0)), (STOP - 3599, Some(4.0)), (STOP, Some(4.0))],
            )
            .with_archive(
                "windDir",
                vec![(STOP - 3600, Some(90.0)), (STOP - 3599, Some(90.0)), (STOP, Some(90.0))],
            );
        let rose = binner(WindRoseConfig::default())
            .compute(&provider, TimeSpan::new(STOP - 3600, STOP), 3600)
            .await
            .unwrap();
        assert_eq!(rose.samples, 2);
    }

    #[tokio::test]
    async fn test_compute_without_samples() {
        let err = binner(WindRoseConfig::default())
            .compute(&archive_provider(), TimeSpan::new(0, 100_000), 86_400)
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::InsufficientData));
    }
}
