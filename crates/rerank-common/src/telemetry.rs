use opentelemetry::trace::TracerProvider as TracerProviderTrait;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with optional OTLP export.
///
/// - `service_name`: identifies this component (e.g. "rerank-proxy")
/// - `otlp_endpoint`: if `Some`, spans are exported via OTLP/HTTP to this base URL.
///   The exporter appends `/v1/traces`.
/// - `otlp_token`: bearer token sent with every export
/// - `log_format`: `"json"` for one JSON object per line, anything else for text
///
/// Returns the `TracerProvider` when OTLP export is active; the caller keeps it
/// alive and calls `shutdown()` on it before exit.
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    otlp_token: Option<&str>,
    log_format: &str,
) -> Option<TracerProvider> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = log_format.eq_ignore_ascii_case("json");
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer());
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());

    let provider = otlp_endpoint.and_then(|endpoint| build_provider(service_name, endpoint, otlp_token));
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string())));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .init();

    if let Some(endpoint) = otlp_endpoint.filter(|_| provider.is_some()) {
        tracing::info!(endpoint, service_name, "OTLP tracing enabled");
    }
    provider
}

fn build_provider(
    service_name: &str,
    endpoint: &str,
    otlp_token: Option<&str>,
) -> Option<TracerProvider> {
    let mut headers = std::collections::HashMap::new();
    if let Some(token) = otlp_token {
        if !token.is_empty() {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()
    {
        Ok(e) => e,
        Err(err) => {
            // The subscriber is not installed yet.
            eprintln!("failed to create OTLP exporter: {err}, falling back to stdout only");
            return None;
        }
    };

    Some(
        TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new([KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]))
            .build(),
    )
}
