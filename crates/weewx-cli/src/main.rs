use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use weewx_config::AppConfig;
use weex_core::ProviderRegistry;
use weex_stats::ChartContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Observability
    weewx_obs::init("weewx-rs");

    // Config
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            AppConfig::default()
        }
    };
    let http_bind = cfg.http_bind();

    // Chart context and database bindings
    let mut charts = ChartContext::from_config(&cfg, ProviderRegistry::new())?;
    charts.registry = weewx_cli::open_bindings(&cfg, charts.tz).await?;

    let (app, state) = weewx_cli::build_app(charts)?;

    // Start HTTP server
    let addr: SocketAddr = http_bind
        .parse()
        .with_context(|| format!("invalid HTTP bind address {http_bind}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    // Mark ready just before serving
    weewx_cli::set_ready(&state, true);

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
