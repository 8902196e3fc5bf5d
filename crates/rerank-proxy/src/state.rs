use std::sync::Arc;

use rerank_core::Reranker;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub reranker: Arc<Reranker>,
    pub metrics: Arc<Metrics>,
}
