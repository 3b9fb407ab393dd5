//! PreQual Screener — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prequal_screener::api::{self, AppState};
use prequal_screener::assistant;
use prequal_screener::config::ScreenerConfig;
use prequal_screener::metrics::Metrics;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - SCREENER_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("SCREENER_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("api=info,session=info,poller=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments. This enables
    // ASSISTANT_API_KEY / SCREENER_* overrides from .env.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let cfg = ScreenerConfig::load();
    let metrics = Metrics::init(cfg.poll.interval_ms);

    let client = assistant::build_client(&cfg.assistant);
    let state = AppState::new(client, cfg.poll_interval());

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
