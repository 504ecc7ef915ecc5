use anyhow::Context;
use tracing::{info, warn};

use shopdocs_api::config::{DEV_JWT_SECRET, Settings};
use shopdocs_infra::workers::SweepWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let settings = Settings::load().context("failed to load configuration")?;
    shopdocs_observability::init(&settings.log);

    if settings.jwt_secret == DEV_JWT_SECRET {
        warn!("SHOPDOCS_JWT_SECRET not set; using insecure dev default");
    }

    let service = shopdocs_api::app::build_service(&settings)
        .await
        .context("failed to initialize document store")?;

    let sweeper = settings
        .sweep_interval()
        .map(|interval| SweepWorker::spawn(service.clone(), interval));

    let app = shopdocs_api::app::build_app(service, &settings.jwt_secret);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("server error")?;

    if let Some(handle) = sweeper {
        handle.shutdown().await;
    }
    Ok(())
}
