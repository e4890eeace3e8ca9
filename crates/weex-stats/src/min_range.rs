//! Minimum y-axis ranges per observation

use std::collections::BTreeMap;

use tracing::warn;
use weewx_config::Setting;
use weex_core::{get_unit_group, Converter, Unit};

/// `<obs>_min_range` values from a `min_range` section.
///
/// `obs = 20` is used as is; `obs = [10, "degree_C"]` is converted to the
/// display unit of the observation's group. Anything else is skipped.
pub fn min_ranges(
    section: &BTreeMap<String, Setting>,
    converter: &Converter,
) -> BTreeMap<String, f64> {
    section
        .iter()
        .filter_map(|(obs, setting)| {
            let range = match setting.as_list() {
                [value, unit, ..] => {
                    let value = value.as_float()?;
                    let unit: Unit = unit.as_str()?.trim().parse().ok()?;
                    if get_unit_group(obs) != Some(unit.group()) {
                        warn!("Minimum range unit {} does not suit {}", unit, obs);
                        return None;
                    }
                    converter.convert_value(value, unit).ok()?.0
                }
                [value] => value.as_float()?,
                [] => return None,
            };
            Some((format!("{obs}_min_range"), range))
        })
        .collect()
}
