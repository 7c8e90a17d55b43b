use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use garment_classifier_service::{
    AppConfig, InferencePipeline, ModelRegistry, build_router,
    model::tch_backend::TorchScriptLoader,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(model_path = %config.model_path.display(), device = ?config.device, "starting classifier service");

    let registry = Arc::new(ModelRegistry::new(TorchScriptLoader::new(
        config.model_path.clone(),
        config.device,
    )));
    if config.preload_model {
        if let Err(err) = registry.get().await {
            tracing::warn!(error = %err, "model preload failed, will load on first request");
        }
    }

    let pipeline = Arc::new(InferencePipeline::new(registry, config.request_timeout));
    let router = build_router(config.clone(), pipeline);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
