mod args;
mod handlers;
mod metrics;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use rerank_core::invoke::{InvokerConfig, ProcessInvoker};
use rerank_core::pool::InvocationPool;
use rerank_core::profile::PromptProfile;
use rerank_core::validate::IndexPolicy;
use rerank_core::Reranker;

use crate::args::Args;
use crate::handlers::{healthz, rerank};
use crate::metrics::{metrics_handler, track_requests};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let otel_provider = rerank_common::telemetry::init_tracing(
        "rerank-proxy",
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
        &args.log_format,
    );

    let index_policy = IndexPolicy::parse(&args.index_policy).unwrap_or_else(|e| {
        tracing::error!(error=%e, "invalid index policy");
        std::process::exit(1);
    });

    let profile = match args.prompt_profile.as_deref() {
        Some(path) => PromptProfile::load(path)?,
        None => PromptProfile::v1(),
    };

    let invoker = ProcessInvoker::new(InvokerConfig::ollama(
        args.ollama_bin.clone(),
        args.model.clone(),
        Duration::from_secs(args.invoke_timeout_secs),
    ));

    let reranker = Reranker::new(
        profile,
        Arc::new(invoker),
        InvocationPool::new(args.max_concurrent, args.max_queued),
        index_policy,
    );

    let st = AppState {
        reranker: Arc::new(reranker),
        metrics: Arc::new(metrics::Metrics::default()),
    };

    let app = build_app(st, args.static_dir.as_deref());

    tracing::info!(listen_addr=%args.listen_addr, static_dir=?args.static_dir, "rerank proxy starting");
    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = otel_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error=%e, "failed to flush traces");
        }
    }
    Ok(())
}

pub(crate) fn build_app(st: AppState, static_dir: Option<&str>) -> Router {
    let mut app = Router::new()
        .route("/api/rerank", post(rerank))
        .route("/healthz", get(healthz))
        .route("/health", get(healthz))
        .route("/metrics", get(metrics_handler));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .layer(CorsLayer::permissive())
        .with_state(st)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error=%e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
