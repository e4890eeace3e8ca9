use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info,weewx=debug,weex_stats=debug";

/// Filter from RUST_LOG, falling back to [`DEFAULT_FILTER`] when unset or unparsable
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize JSON logging for a service.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Observability initialized");
    }
}
