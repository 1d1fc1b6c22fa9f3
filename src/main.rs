//! Listing seeker: binary entrypoint.
//! Boots stores, transports, the pipeline and its scheduler, then serves the
//! admin router on the Shuttle runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slothus_seeker::config::RegistryDefaults;
use slothus_seeker::metrics::Metrics;
use slothus_seeker::notify::{DiscordNotifier, SlackNotifier};
use slothus_seeker::{
    api, AppState, ConfigRegistry, DedupStore, FanOut, GithubListingsClient, Pipeline, ReadyGate,
    Scheduler, Settings, TransportMux,
};

/// `LOG_FORMAT=json` switches to the JSON formatter; anything else is compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("slothus_seeker=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // try_init: the host may already have installed a subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load().context("loading settings")?;

    let registry = Arc::new(ConfigRegistry::with_defaults(
        &settings.config_file,
        RegistryDefaults {
            interval_hours: settings.scrape_interval_hours,
            start_window_days: settings.default_start_window_days,
        },
    ));
    let dedup = Arc::new(DedupStore::new(&settings.last_scrape_file));
    // Create both files up front so a bad path fails the boot, not the first tick.
    let global = registry.global().await.context("initializing config file")?;
    dedup.load().await.context("initializing dedup file")?;

    let source = GithubListingsClient::new(settings.feed_url.clone())
        .with_token(settings.github_token.clone())
        .with_timeout(settings.fetch_timeout_secs);
    let transport = TransportMux::new(
        DiscordNotifier::new().with_retries(2),
        SlackNotifier::new(),
    );
    let fanout = FanOut::new(
        Arc::new(transport),
        Duration::from_millis(settings.delivery_min_spacing_ms),
    );

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(source),
        registry.clone(),
        dedup,
        fanout,
    ));

    let ready = ReadyGate::new();
    let scheduler = Arc::new(
        Scheduler::new(pipeline.clone(), ready.clone()).with_run_on_start(settings.scrape_on_start),
    );
    scheduler
        .start(global.scrape_interval_hours)
        .context("starting scheduler")?;

    let metrics = Metrics::init(global.scrape_interval_hours)?;

    let state = AppState {
        registry,
        pipeline,
        scheduler,
        admin_token: settings.admin_token.clone().map(Arc::from),
    };
    let router = api::router(state).merge(metrics.router());

    tracing::info!(
        feed = %settings.feed_url,
        interval_hours = global.scrape_interval_hours,
        start_timestamp = global.scrape_start_timestamp,
        "seeker ready"
    );
    ready.open();

    Ok(router.into())
}
