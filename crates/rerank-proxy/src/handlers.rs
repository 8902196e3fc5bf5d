use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tracing::Instrument;

use rerank_common::{FailureReason, RerankOutcome, RerankRequest};

use crate::state::AppState;

/// Carries the outcome tag that the JSON body collapses away.
pub const OUTCOME_HEADER: &str = "x-rerank-outcome";

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// `POST /api/rerank`. Always 200; every non-ranking outcome becomes `[]`.
pub async fn rerank(State(st): State<AppState>, body: Bytes) -> Response {
    let request_id = format!("rr_{}", uuid::Uuid::new_v4());
    let span = tracing::info_span!("rerank", %request_id);
    let start = std::time::Instant::now();

    let outcome = match serde_json::from_slice::<RerankRequest>(&body) {
        Ok(req) => {
            let candidates = req.candidates.len();
            let outcome = st.reranker.rerank(&req).instrument(span.clone()).await;
            span.in_scope(|| {
                tracing::info!(
                    candidates,
                    outcome = %outcome.tag(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "rerank finished"
                )
            });
            outcome
        }
        Err(e) => {
            span.in_scope(|| tracing::warn!(error = %e, "undecodable rerank request"));
            RerankOutcome::Failed(FailureReason::MalformedRequest(e.to_string()))
        }
    };

    st.metrics.record_outcome(&outcome, start.elapsed());

    let tag = outcome.tag();
    let mut resp = (StatusCode::OK, Json(outcome.into_ranking())).into_response();
    if let Ok(v) = HeaderValue::from_str(&tag) {
        resp.headers_mut().insert(OUTCOME_HEADER, v);
    }
    resp
}
