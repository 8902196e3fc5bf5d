use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use rerank_common::{FailureReason, RerankOutcome};

use crate::state::AppState;

#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub ranked_total: AtomicU64,
    pub no_preference_total: AtomicU64,
    pub failed_total: AtomicU64,
    pub overloaded_total: AtomicU64,
    pub timeout_total: AtomicU64,
    pub malformed_total: AtomicU64,
    pub rerank_latency_ms_sum: AtomicU64,
}

impl Metrics {
    pub fn record_outcome(&self, outcome: &RerankOutcome, elapsed: Duration) {
        self.rerank_latency_ms_sum
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        match outcome {
            RerankOutcome::Ranked(_) => {
                self.ranked_total.fetch_add(1, Ordering::Relaxed);
            }
            RerankOutcome::NoPreference => {
                self.no_preference_total.fetch_add(1, Ordering::Relaxed);
            }
            RerankOutcome::Failed(reason) => {
                self.failed_total.fetch_add(1, Ordering::Relaxed);
                match reason {
                    FailureReason::Overloaded => {
                        self.overloaded_total.fetch_add(1, Ordering::Relaxed);
                    }
                    FailureReason::Timeout(_) => {
                        self.timeout_total.fetch_add(1, Ordering::Relaxed);
                    }
                    FailureReason::MalformedRequest(_) => {
                        self.malformed_total.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        }
    }
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let m = &st.metrics;
    let pool = st.reranker.pool();
    let body = format!(
        "rerank_requests_total {}\nrerank_requests_inflight {}\nrerank_outcome_ranked_total {}\nrerank_outcome_no_preference_total {}\nrerank_outcome_failed_total {}\nrerank_failed_overloaded_total {}\nrerank_failed_timeout_total {}\nrerank_failed_malformed_request_total {}\nrerank_latency_ms_sum {}\nrerank_pool_in_flight {}\nrerank_pool_queued {}\n",
        m.requests_total.load(Ordering::Relaxed),
        m.requests_inflight.load(Ordering::Relaxed),
        m.ranked_total.load(Ordering::Relaxed),
        m.no_preference_total.load(Ordering::Relaxed),
        m.failed_total.load(Ordering::Relaxed),
        m.overloaded_total.load(Ordering::Relaxed),
        m.timeout_total.load(Ordering::Relaxed),
        m.malformed_total.load(Ordering::Relaxed),
        m.rerank_latency_ms_sum.load(Ordering::Relaxed),
        pool.in_flight(),
        pool.queued(),
    );
    (axum::http::StatusCode::OK, body)
}

struct InflightGuard<'a>(&'a AtomicU64);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub async fn track_requests(
    State(st): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible> {
    st.metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    // Released even when the client goes away and this future is dropped.
    let _inflight = InflightGuard(&st.metrics.requests_inflight);
    let resp = next.run(req).await;
    st.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    Ok(resp)
}
