use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_BINDING: &str = "wx_binding";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationConfig {
    pub id: Option<String>,
    /// IANA zone name, e.g. `Europe/London`
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Database behind the default binding
    pub url: Option<String>,
    /// Additional named bindings
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnitsConfig {
    /// `us`, `metric` or `metricwx`
    pub unit_system: Option<String>,
    /// Display unit per unit group, e.g. `group_speed = "km_per_hour"`
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
    /// printf style format per unit, e.g. `km_per_hour = "%.1f"`
    #[serde(default)]
    pub string_formats: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtrasConfig {
    pub apptemp_binding: Option<String>,
    pub insolation_binding: Option<String>,
    #[serde(default)]
    pub windrose: BTreeMap<String, Setting>,
    #[serde(default)]
    pub min_range: BTreeMap<String, Setting>,
}

/// A loosely typed option value.
///
/// Sections that are validated field by field hold these so that a malformed
/// value can be replaced by its default instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Setting>),
}

impl Setting {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Setting::Int(i) => Some(*i),
            Setting::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Setting::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Setting::Int(i) => Some(*i as f64),
            Setting::Float(f) => Some(*f),
            Setting::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Setting::Bool(b) => Some(*b),
            Setting::Int(i) => Some(*i != 0),
            Setting::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Setting::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Items of a list; a scalar is a one-element list
    pub fn as_list(&self) -> &[Setting] {
        match self {
            Setting::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub station: Option<StationConfig>,
    pub database: Option<DatabaseConfig>,
    pub http: Option<HttpConfig>,
    pub units: Option<UnitsConfig>,
    pub extras: Option<ExtrasConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Load configuration from WEEWX_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var("WEEWX_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        if Path::new(&path).exists() {
            Self::load_from(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str::<AppConfig>(s)?)
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.http
            .as_ref()
            .and_then(|h| h.bind.clone())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
    }

    /// Station time zone name (default UTC)
    pub fn timezone(&self) -> &str {
        self.station
            .as_ref()
            .and_then(|s| s.timezone.as_deref())
            .unwrap_or("UTC")
    }

    /// Database URL of every binding, the default one included
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let db = self.database.clone().unwrap_or_default();
        let mut bindings = db.bindings;
        bindings.insert(
            DEFAULT_BINDING.to_string(),
            db.url.unwrap_or_else(|| "sqlite://weewx.sdb".to_string()),
        );
        bindings
    }

    pub fn units(&self) -> UnitsConfig {
        self.units.clone().unwrap_or_default()
    }

    pub fn extras(&self) -> ExtrasConfig {
        self.extras.clone().unwrap_or_default()
    }

    pub fn apptemp_binding(&self) -> String {
        self.extras
            .as_ref()
            .and_then(|e| e.apptemp_binding.clone())
            .unwrap_or_else(|| DEFAULT_BINDING.to_string())
    }

    pub fn insolation_binding(&self) -> String {
        self.extras
            .as_ref()
            .and_then(|e| e.insolation_binding.clone())
            .unwrap_or_else(|| DEFAULT_BINDING.to_string())
    }
}
