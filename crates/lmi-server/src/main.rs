mod api;
mod middleware;
mod store;

use std::sync::Arc;

use lmi_core::OutputSink as _;
use lmi_pipeline::{ModuleProgress, ModuleRegistry, Orchestrator};
use lmi_sheets::SheetsSink;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    store::RunStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(lmi_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let registry = ModuleRegistry::from_config(&config)?;
    for module in registry.available_modules() {
        if !module.available {
            tracing::warn!(
                module = module.name,
                reason = module.unavailability_reason.as_deref().unwrap_or("-"),
                "module unavailable"
            );
        }
    }

    let sink = SheetsSink::from_config(&config)?;
    if !sink.is_available() {
        tracing::warn!("Google credentials not configured; runs will not produce a spreadsheet");
    }

    let runs = RunStore::default();
    let listener_runs = runs.clone();
    let orchestrator = Orchestrator::new(registry.clone(), Arc::new(sink))
        .with_notify(config.notify_on_share)
        .with_progress(Arc::new(move |run_id: &str, progress: &ModuleProgress| {
            listener_runs.update_module(run_id, progress);
        }));

    let auth = AuthState::from_env(config.is_development())?;
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        registry,
        runs,
        config: Arc::clone(&config),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    tracing::info!(addr = %config.bind_addr, env = %config.env, "lmi-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
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
