//! Unit conversion utilities
//!
//! Maintains parity with the WeeWX unit system tables: every observation
//! type belongs to a unit group, every unit system picks one unit per group,
//! and a [`Converter`] maps stored values into the display unit of each group.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{AggregateKind, ValueVector};

/// Unit conversion error
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown unit system: {0}")]
    UnknownUnitSystem(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unknown unit group: {0}")]
    UnknownGroup(String),

    #[error("Cannot convert {from} to {to}")]
    ConversionNotSupported { from: Unit, to: Unit },
}

/// Unit system codes as stored in the `usUnits` column
pub mod unit_systems {
    pub const US: i32 = 1;
    pub const METRIC: i32 = 16;
    pub const METRICWX: i32 = 17;
}

/// Unit system of stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Us,
    Metric,
    MetricWx,
}

impl UnitSystem {
    pub fn from_code(code: i32) -> Result<Self, UnitError> {
        match code {
            unit_systems::US => Ok(UnitSystem::Us),
            unit_systems::METRIC => Ok(UnitSystem::Metric),
            unit_systems::METRICWX => Ok(UnitSystem::MetricWx),
            other => Err(UnitError::UnknownUnitSystem(other.to_string())),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            UnitSystem::Us => unit_systems::US,
            UnitSystem::Metric => unit_systems::METRIC,
            UnitSystem::MetricWx => unit_systems::METRICWX,
        }
    }

    /// The unit this system uses for a group
    pub fn unit_for(&self, group: UnitGroup) -> Unit {
        match (self, group) {
            (UnitSystem::Us, UnitGroup::Temperature) => Unit::DegreeF,
            (_, UnitGroup::Temperature) => Unit::DegreeC,
            (UnitSystem::Us, UnitGroup::Pressure) => Unit::InHg,
            (_, UnitGroup::Pressure) => Unit::Mbar,
            (UnitSystem::Us, UnitGroup::Rain) => Unit::Inch,
            (UnitSystem::Metric, UnitGroup::Rain) => Unit::Cm,
            (UnitSystem::MetricWx, UnitGroup::Rain) => Unit::Mm,
            (UnitSystem::Us, UnitGroup::RainRate) => Unit::InchPerHour,
            (UnitSystem::Metric, UnitGroup::RainRate) => Unit::CmPerHour,
            (UnitSystem::MetricWx, UnitGroup::RainRate) => Unit::MmPerHour,
            (UnitSystem::Us, UnitGroup::Speed) => Unit::MilePerHour,
            (UnitSystem::Metric, UnitGroup::Speed) => Unit::KmPerHour,
            (UnitSystem::MetricWx, UnitGroup::Speed) => Unit::MeterPerSecond,
            (_, UnitGroup::Direction) => Unit::DegreeCompass,
            (_, UnitGroup::Percent) => Unit::Percent,
            (_, UnitGroup::Radiation) => Unit::WattPerMeterSquared,
            (_, UnitGroup::Uv) => Unit::UvIndex,
            (_, UnitGroup::Time) => Unit::UnixEpoch,
            (_, UnitGroup::Count) => Unit::Count,
        }
    }
}

impl FromStr for UnitSystem {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(UnitSystem::Us),
            "metric" => Ok(UnitSystem::Metric),
            "metricwx" => Ok(UnitSystem::MetricWx),
            other => other
                .parse::<i32>()
                .map_err(|_| UnitError::UnknownUnitSystem(other.to_string()))
                .and_then(UnitSystem::from_code),
        }
    }
}

/// Unit group for observation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitGroup {
    Temperature,
    Pressure,
    Rain,
    RainRate,
    Speed,
    Direction,
    Percent,
    Radiation,
    Uv,
    Time,
    Count,
}

impl UnitGroup {
    pub const ALL: [UnitGroup; 11] = [
        UnitGroup::Temperature,
        UnitGroup::Pressure,
        UnitGroup::Rain,
        UnitGroup::RainRate,
        UnitGroup::Speed,
        UnitGroup::Direction,
        UnitGroup::Percent,
        UnitGroup::Radiation,
        UnitGroup::Uv,
        UnitGroup::Time,
        UnitGroup::Count,
    ];

    /// WeeWX group name, e.g. `group_speed`
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitGroup::Temperature => "group_temperature",
            UnitGroup::Pressure => "group_pressure",
            UnitGroup::Rain => "group_rain",
            UnitGroup::RainRate => "group_rainrate",
            UnitGroup::Speed => "group_speed",
            UnitGroup::Direction => "group_direction",
            UnitGroup::Percent => "group_percent",
            UnitGroup::Radiation => "group_radiation",
            UnitGroup::Uv => "group_uv",
            UnitGroup::Time => "group_time",
            UnitGroup::Count => "group_count",
        }
    }
}

impl FromStr for UnitGroup {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        UnitGroup::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == name)
            .ok_or_else(|| UnitError::UnknownGroup(name.to_string()))
    }
}

/// Measurement unit, named as WeeWX names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "degree_F")]
    DegreeF,
    #[serde(rename = "degree_C")]
    DegreeC,
    #[serde(rename = "inHg")]
    InHg,
    #[serde(rename = "mbar")]
    Mbar,
    #[serde(rename = "hPa")]
    HPa,
    #[serde(rename = "inch")]
    Inch,
    #[serde(rename = "cm")]
    Cm,
    #[serde(rename = "mm")]
    Mm,
    #[serde(rename = "inch_per_hour")]
    InchPerHour,
    #[serde(rename = "cm_per_hour")]
    CmPerHour,
    #[serde(rename = "mm_per_hour")]
    MmPerHour,
    #[serde(rename = "mile_per_hour")]
    MilePerHour,
    #[serde(rename = "km_per_hour")]
    KmPerHour,
    #[serde(rename = "meter_per_second")]
    MeterPerSecond,
    #[serde(rename = "knot")]
    Knot,
    #[serde(rename = "degree_compass")]
    DegreeCompass,
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "watt_per_meter_squared")]
    WattPerMeterSquared,
    #[serde(rename = "uv_index")]
    UvIndex,
    #[serde(rename = "unix_epoch")]
    UnixEpoch,
    #[serde(rename = "count")]
    Count,
}

impl Unit {
    const ALL: [Unit; 21] = [
        Unit::DegreeF,
        Unit::DegreeC,
        Unit::InHg,
        Unit::Mbar,
        Unit::HPa,
        Unit::Inch,
        Unit::Cm,
        Unit::Mm,
        Unit::InchPerHour,
        Unit::CmPerHour,
        Unit::MmPerHour,
        Unit::MilePerHour,
        Unit::KmPerHour,
        Unit::MeterPerSecond,
        Unit::Knot,
        Unit::DegreeCompass,
        Unit::Percent,
        Unit::WattPerMeterSquared,
        Unit::UvIndex,
        Unit::UnixEpoch,
        Unit::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::DegreeF => "degree_F",
            Unit::DegreeC => "degree_C",
            Unit::InHg => "inHg",
            Unit::Mbar => "mbar",
            Unit::HPa => "hPa",
            Unit::Inch => "inch",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::InchPerHour => "inch_per_hour",
            Unit::CmPerHour => "cm_per_hour",
            Unit::MmPerHour => "mm_per_hour",
            Unit::MilePerHour => "mile_per_hour",
            Unit::KmPerHour => "km_per_hour",
            Unit::MeterPerSecond => "meter_per_second",
            Unit::Knot => "knot",
            Unit::DegreeCompass => "degree_compass",
            Unit::Percent => "percent",
            Unit::WattPerMeterSquared => "watt_per_meter_squared",
            Unit::UvIndex => "uv_index",
            Unit::UnixEpoch => "unix_epoch",
            Unit::Count => "count",
        }
    }

    pub fn group(&self) -> UnitGroup {
        match self {
            Unit::DegreeF | Unit::DegreeC => UnitGroup::Temperature,
            Unit::InHg | Unit::Mbar | Unit::HPa => UnitGroup::Pressure,
            Unit::Inch | Unit::Cm | Unit::Mm => UnitGroup::Rain,
            Unit::InchPerHour | Unit::CmPerHour | Unit::MmPerHour => UnitGroup::RainRate,
            Unit::MilePerHour | Unit::KmPerHour | Unit::MeterPerSecond | Unit::Knot => {
                UnitGroup::Speed
            }
            Unit::DegreeCompass => UnitGroup::Direction,
            Unit::Percent => UnitGroup::Percent,
            Unit::WattPerMeterSquared => UnitGroup::Radiation,
            Unit::UvIndex => UnitGroup::Uv,
            Unit::UnixEpoch => UnitGroup::Time,
            Unit::Count => UnitGroup::Count,
        }
    }

    /// Express a value in the base unit of its group
    fn to_base(self, value: f64) -> f64 {
        match self {
            Unit::DegreeF => (value - 32.0) * 5.0 / 9.0,
            Unit::InHg => value * 33.8639,
            Unit::Inch | Unit::InchPerHour => value * 25.4,
            Unit::Cm | Unit::CmPerHour => value * 10.0,
            Unit::MilePerHour => value * 0.44704,
            Unit::KmPerHour => value / 3.6,
            Unit::Knot => value * 0.514444,
            _ => value,
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Unit::DegreeF => value * 9.0 / 5.0 + 32.0,
            Unit::InHg => value / 33.8639,
            Unit::Inch | Unit::InchPerHour => value / 25.4,
            Unit::Cm | Unit::CmPerHour => value / 10.0,
            Unit::MilePerHour => value / 0.44704,
            Unit::KmPerHour => value * 3.6,
            Unit::Knot => value / 0.514444,
            _ => value,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Unit::ALL
            .iter()
            .copied()
            .find(|u| u.as_str() == name)
            .ok_or_else(|| UnitError::UnknownUnit(name.to_string()))
    }
}

/// Get unit group for an observation type
pub fn get_unit_group(obs_type: &str) -> Option<UnitGroup> {
    match obs_type {
        "outTemp" | "inTemp" | "dewpoint" | "heatindex" | "windchill" | "appTemp"
        | "extraTemp1" | "extraTemp2" | "extraTemp3" => Some(UnitGroup::Temperature),
        "barometer" | "pressure" | "altimeter" => Some(UnitGroup::Pressure),
        "rain" | "ET" | "hail" => Some(UnitGroup::Rain),
        "rainRate" | "hailRate" => Some(UnitGroup::RainRate),
        "wind" | "windSpeed" | "windGust" => Some(UnitGroup::Speed),
        "windDir" | "windGustDir" => Some(UnitGroup::Direction),
        "outHumidity" | "inHumidity" | "extraHumid1" | "rxCheckPercent" => {
            Some(UnitGroup::Percent)
        }
        "radiation" | "maxSolarRad" => Some(UnitGroup::Radiation),
        "UV" => Some(UnitGroup::Uv),
        "dateTime" => Some(UnitGroup::Time),
        _ => None,
    }
}

/// Unit and group of an aggregate of `obs_type` stored in `system`.
///
/// Time-of-extreme aggregates are times, counts are counts and the
/// direction aggregates of a vector observation are directions; everything
/// else carries the unit of the observation itself.
pub fn standard_unit_type(
    system: UnitSystem,
    obs_type: &str,
    kind: Option<&AggregateKind>,
) -> (Option<Unit>, Option<UnitGroup>) {
    let group = match kind {
        Some(AggregateKind::MinTime | AggregateKind::MaxTime) => Some(UnitGroup::Time),
        Some(AggregateKind::Count) => Some(UnitGroup::Count),
        Some(AggregateKind::VecDir | AggregateKind::GustDir) => Some(UnitGroup::Direction),
        _ => get_unit_group(obs_type),
    };
    (group.map(|g| system.unit_for(g)), group)
}

/// Convert a value between two units of the same group
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, UnitError> {
    if from == to {
        return Ok(value);
    }
    if from.group() != to.group() {
        return Err(UnitError::ConversionNotSupported { from, to });
    }
    Ok(to.from_base(from.to_base(value)))
}

/// Converts tagged vectors into a display unit
pub trait UnitConverter: Send + Sync {
    /// Convert a whole vector into the display unit of its group
    fn convert(&self, vector: &ValueVector) -> Result<ValueVector, UnitError>;

    /// Display unit for a group, if one is configured
    fn target_unit(&self, group: UnitGroup) -> Option<Unit>;

    /// Unit and group used to tag an aggregate of `obs_type`
    fn unit_group_for(
        &self,
        system: UnitSystem,
        obs_type: &str,
        kind: Option<&AggregateKind>,
    ) -> (Option<Unit>, Option<UnitGroup>) {
        standard_unit_type(system, obs_type, kind)
    }
}

/// Group to display-unit mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    targets: HashMap<UnitGroup, Unit>,
}

impl Converter {
    /// Display everything in the units of `system`
    pub fn for_system(system: UnitSystem) -> Self {
        let targets = UnitGroup::ALL
            .iter()
            .map(|g| (*g, system.unit_for(*g)))
            .collect();
        Self { targets }
    }

    /// Display `group` in `unit` instead of the system default
    pub fn with_override(mut self, group: UnitGroup, unit: Unit) -> Result<Self, UnitError> {
        if unit.group() != group {
            return Err(UnitError::UnknownUnit(format!(
                "{} is not a {} unit",
                unit,
                group.as_str()
            )));
        }
        self.targets.insert(group, unit);
        Ok(self)
    }

    /// Convert a single value, returning it with its display unit
    pub fn convert_value(&self, value: f64, unit: Unit) -> Result<(f64, Unit), UnitError> {
        let target = self.targets.get(&unit.group()).copied().unwrap_or(unit);
        Ok((convert(value, unit, target)?, target))
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::for_system(UnitSystem::Metric)
    }
}

impl UnitConverter for Converter {
    fn convert(&self, vector: &ValueVector) -> Result<ValueVector, UnitError> {
        let Some(unit) = vector.unit else {
            return Ok(vector.clone());
        };
        let group = vector.group.unwrap_or_else(|| unit.group());
        let target = self.targets.get(&group).copied().unwrap_or(unit);
        let values = vector
            .values
            .iter()
            .map(|v| v.map(|x| convert(x, unit, target)).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValueVector::new(values, Some(target), Some(group)))
    }

    fn target_unit(&self, group: UnitGroup) -> Option<Unit> {
        self.targets.get(&group).copied()
    }
}
