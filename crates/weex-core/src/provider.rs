use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{DaySummaryRecord, Series, SeriesAggregate, SummaryLayout, TimeSpan, Timestamp};
use crate::units::UnitSystem;

/// Binding used when a caller does not name one
pub const DEFAULT_BINDING: &str = "wx_binding";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Unknown observation type: {0}")]
    UnknownType(String),

    #[error("Unknown data binding: {0}")]
    UnknownBinding(String),

    #[error("Query failed: {0}")]
    Query(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Read access to an archive and its day summaries
#[async_trait::async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Unit system of the stored data; `None` when the archive is empty
    async fn unit_system(&self) -> ProviderResult<Option<UnitSystem>>;

    /// Raw or aggregated series for `obs` over `span`.
    ///
    /// Raw records are those with `span.start < dateTime <= span.stop`.
    async fn get_series(
        &self,
        obs: &str,
        span: TimeSpan,
        aggregate: Option<SeriesAggregate>,
    ) -> ProviderResult<Series>;

    /// Day-summary rows with `span.start <= day_start < span.stop`, ascending
    async fn get_day_summary(
        &self,
        obs: &str,
        span: TimeSpan,
        layout: SummaryLayout,
    ) -> ProviderResult<Vec<DaySummaryRecord>>;

    async fn first_good_stamp(&self) -> ProviderResult<Option<Timestamp>>;

    async fn last_good_stamp(&self) -> ProviderResult<Option<Timestamp>>;
}

/// Named data bindings
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SeriesProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn SeriesProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn lookup(&self, name: &str) -> ProviderResult<Arc<dyn SeriesProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownBinding(name.to_string()))
    }

    pub fn default_provider(&self) -> ProviderResult<Arc<dyn SeriesProvider>> {
        self.lookup(DEFAULT_BINDING)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("bindings", &names)
            .finish()
    }
}
