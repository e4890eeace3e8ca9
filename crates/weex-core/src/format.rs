//! Display precision and unit labels

use std::collections::HashMap;

use crate::types::ValueVector;
use crate::units::Unit;

/// Decimal places used when a unit has no configured string format
const FALLBACK_PLACES: usize = 1;

/// Round to a number of decimal places
pub fn round_to(value: f64, places: usize) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Round a nullable value
pub fn round_none(value: Option<f64>, places: usize) -> Option<f64> {
    value.map(|v| round_to(v, places))
}

/// Decimal places from a printf style format such as `%.2f`
pub fn parse_string_format(format: &str) -> Option<usize> {
    let format = format.trim();
    let digits = format.strip_prefix("%.")?.strip_suffix('f')?;
    digits.parse().ok()
}

fn default_places(unit: Unit) -> usize {
    match unit {
        Unit::InHg => 3,
        Unit::Inch | Unit::InchPerHour | Unit::Cm | Unit::CmPerHour => 2,
        Unit::DegreeF
        | Unit::DegreeC
        | Unit::Mbar
        | Unit::HPa
        | Unit::Mm
        | Unit::MmPerHour
        | Unit::MeterPerSecond
        | Unit::UvIndex => 1,
        Unit::MilePerHour
        | Unit::KmPerHour
        | Unit::Knot
        | Unit::DegreeCompass
        | Unit::Percent
        | Unit::WattPerMeterSquared
        | Unit::UnixEpoch
        | Unit::Count => 0,
    }
}

fn default_label(unit: Unit) -> &'static str {
    match unit {
        Unit::DegreeF => "°F",
        Unit::DegreeC => "°C",
        Unit::InHg => " inHg",
        Unit::Mbar => " mbar",
        Unit::HPa => " hPa",
        Unit::Inch => " in",
        Unit::Cm => " cm",
        Unit::Mm => " mm",
        Unit::InchPerHour => " in/h",
        Unit::CmPerHour => " cm/h",
        Unit::MmPerHour => " mm/h",
        Unit::MilePerHour => " mph",
        Unit::KmPerHour => " km/h",
        Unit::MeterPerSecond => " m/s",
        Unit::Knot => " knots",
        Unit::DegreeCompass => "°",
        Unit::Percent => "%",
        Unit::WattPerMeterSquared => " W/m²",
        Unit::UvIndex | Unit::UnixEpoch | Unit::Count => "",
    }
}

/// Per-unit precision and label lookup with overrides
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    places: HashMap<Unit, usize>,
    labels: HashMap<Unit, String>,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_places(mut self, unit: Unit, places: usize) -> Self {
        self.places.insert(unit, places);
        self
    }

    pub fn with_label(mut self, unit: Unit, label: impl Into<String>) -> Self {
        self.labels.insert(unit, label.into());
        self
    }

    /// Decimal places for a unit
    pub fn places(&self, unit: Option<Unit>) -> usize {
        match unit {
            Some(u) => self.places.get(&u).copied().unwrap_or_else(|| default_places(u)),
            None => FALLBACK_PLACES,
        }
    }

    /// Label for a unit, untrimmed
    pub fn label(&self, unit: Option<Unit>) -> &str {
        match unit {
            Some(u) => self
                .labels
                .get(&u)
                .map(String::as_str)
                .unwrap_or_else(|| default_label(u)),
            None => "",
        }
    }

    /// Round every value of a vector to the precision of its unit
    pub fn round_vector(&self, vector: &ValueVector) -> Vec<Option<f64>> {
        let places = self.places(vector.unit);
        vector.values.iter().map(|v| round_none(*v, places)).collect()
    }
}
