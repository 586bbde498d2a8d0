use std::net::SocketAddr;
use std::sync::Arc;

use internship_allocation::{
    allocation::{OfferPolicy, PgAllocationStore},
    config::init_config,
    database::pool::{create_pool, run_migrations},
    routes::{self, RateLimits},
    services::expiry_scheduler::start_expiry_sweep,
    utils::time::SystemClock,
    AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(
        Arc::new(PgAllocationStore::new(pool)),
        Arc::new(SystemClock),
        OfferPolicy {
            default_days: config.offer_validity_days,
            max_days: config.max_offer_days,
        },
        config.expiry_sweep_batch,
    );

    let _scheduler = start_expiry_sweep(
        app_state.coordinator.clone(),
        &config.expiry_sweep_cron,
        config.expiry_sweep_batch,
    )
    .await?;

    let app = routes::router(
        app_state,
        RateLimits {
            public_rps: config.public_rps,
            integration_rps: config.integration_rps,
        },
    )
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
