//! Everything a chart request needs, assembled once from configuration

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::warn;
use weewx_config::{AppConfig, Setting};
use weex_core::{
    parse_string_format, Converter, Formatter, ProviderRegistry, Unit, UnitGroup, UnitSystem,
};

use crate::windrose::{WindRoseBinner, WindRoseConfig};
use crate::{StatsError, StatsResult};

#[derive(Debug, Clone)]
pub struct ChartContext {
    pub registry: ProviderRegistry,
    pub converter: Converter,
    pub formatter: Formatter,
    pub tz: Tz,
    pub apptemp_binding: String,
    pub insolation_binding: String,
    pub windrose: WindRoseConfig,
    pub min_range: BTreeMap<String, Setting>,
}

impl ChartContext {
    /// Build from configuration. A bad time zone or unit system is fatal;
    /// bad per-group overrides are skipped.
    pub fn from_config(config: &AppConfig, registry: ProviderRegistry) -> StatsResult<Self> {
        let tz: Tz = config
            .timezone()
            .parse()
            .map_err(|e| StatsError::Config(format!("timezone: {e}")))?;

        let units = config.units();
        let system = match units.unit_system.as_deref() {
            Some(name) => name.parse::<UnitSystem>()?,
            None => UnitSystem::Metric,
        };

        let mut converter = Converter::for_system(system);
        for (group, unit) in &units.groups {
            let parsed = group
                .parse::<UnitGroup>()
                .and_then(|g| Ok((g, unit.parse::<Unit>()?)));
            converter = match parsed {
                Ok((g, u)) => match converter.clone().with_override(g, u) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Ignoring unit override {} = {}: {}", group, unit, e);
                        converter
                    }
                },
                Err(e) => {
                    warn!("Ignoring unit override {} = {}: {}", group, unit, e);
                    converter
                }
            };
        }

        let mut formatter = Formatter::new();
        for (unit, format) in &units.string_formats {
            match (unit.parse::<Unit>(), parse_string_format(format)) {
                (Ok(u), Some(places)) => formatter = formatter.with_places(u, places),
                _ => warn!("Ignoring string format {} = {}", unit, format),
            }
        }
        for (unit, label) in &units.labels {
            match unit.parse::<Unit>() {
                Ok(u) => formatter = formatter.with_label(u, label.clone()),
                Err(e) => warn!("Ignoring label for {}: {}", unit, e),
            }
        }

        let extras = config.extras();
        Ok(Self {
            registry,
            converter,
            formatter,
            tz,
            apptemp_binding: config.apptemp_binding(),
            insolation_binding: config.insolation_binding(),
            windrose: WindRoseConfig::from_section(&extras.windrose),
            min_range: extras.min_range,
        })
    }

    pub fn windrose_binner(&self) -> WindRoseBinner {
        WindRoseBinner::new(
            self.windrose.clone(),
            Arc::new(self.converter.clone()),
            self.formatter.clone(),
            self.tz,
        )
    }
}
