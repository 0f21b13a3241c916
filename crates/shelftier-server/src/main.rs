mod api;
mod middleware;
mod provider;

use std::sync::Arc;

use shelftier_core::TiersConfigStore;
use shelftier_engine::{Aggregator, SizeClassifier};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AdminGate,
    provider::SalesProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(shelftier_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, source = %config.source, "starting shelftier-server");

    let classifier = SizeClassifier::from_patterns(
        config.size30_pattern.as_deref(),
        config.size100_pattern.as_deref(),
    );
    let aggregator = Aggregator::new(classifier, config.pos_app_names.iter().cloned());
    let store = TiersConfigStore::new(&config.tiers_config_path);
    let tiers = store.read()?;
    tracing::info!(
        path = %store.path().display(),
        version = tiers.config_version,
        "loaded tiers config"
    );

    let provider = SalesProvider::from_config(&config)?;
    let admin = AdminGate::new(config.admin_token.as_deref());
    let state = AppState {
        config: Arc::clone(&config),
        store: Arc::new(store),
        aggregator: Arc::new(aggregator),
        provider,
    };
    let app = build_app(state, admin);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
