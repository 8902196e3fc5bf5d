use std::sync::Arc;

use rerank_common::{FailureReason, RerankOutcome, RerankRequest};

pub mod invoke;
pub mod pool;
pub mod profile;
pub mod prompt;
pub mod validate;

use invoke::ModelInvoker;
use pool::InvocationPool;
use profile::PromptProfile;
use validate::IndexPolicy;

/// Encoder → admission → invoker → validator, for one request at a time.
pub struct Reranker {
    profile: Arc<PromptProfile>,
    invoker: Arc<dyn ModelInvoker>,
    pool: InvocationPool,
    index_policy: IndexPolicy,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("profile", &self.profile.version)
            .field("invoker", &self.invoker.name())
            .field("index_policy", &self.index_policy)
            .finish()
    }
}

impl Reranker {
    pub fn new(
        profile: PromptProfile,
        invoker: Arc<dyn ModelInvoker>,
        pool: InvocationPool,
        index_policy: IndexPolicy,
    ) -> Self {
        tracing::info!(
            profile = %profile.version,
            invoker = %invoker.name(),
            max_concurrent = pool.max_concurrent(),
            max_queued = pool.max_queued(),
            index_policy = index_policy.name(),
            "reranker initialized"
        );
        Self {
            profile: Arc::new(profile),
            invoker,
            pool,
            index_policy,
        }
    }

    pub fn pool(&self) -> &InvocationPool {
        &self.pool
    }

    pub async fn rerank(&self, req: &RerankRequest) -> RerankOutcome {
        let prompt = prompt::encode(&self.profile, &req.ctx, &req.candidates);

        // Under the strict policy any non-empty answer would be rejected anyway.
        if req.candidates.is_empty() && self.index_policy == IndexPolicy::Strict {
            tracing::debug!("empty candidates list, skipping model invocation");
            return RerankOutcome::NoPreference;
        }

        let _slot = match self.pool.acquire().await {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    in_flight = self.pool.in_flight(),
                    queued = self.pool.queued(),
                    "rejecting rerank request"
                );
                return RerankOutcome::Failed(FailureReason::Overloaded);
            }
        };

        tracing::debug!(
            candidates = req.candidates.len(),
            prompt_bytes = prompt.len(),
            "invoking model"
        );

        let raw = match self.invoker.invoke(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, invoker = %self.invoker.name(), "model invocation failed");
                return RerankOutcome::Failed(e.into());
            }
        };

        if !raw.success {
            tracing::warn!(
                exit_code = ?raw.exit_code,
                stderr = %raw.stderr.trim(),
                "model process exited unsuccessfully"
            );
            return RerankOutcome::Failed(FailureReason::NonZeroExit {
                code: raw.exit_code,
            });
        }

        let outcome = validate::interpret(&raw.stdout, &req.candidates, self.index_policy);
        match &outcome {
            RerankOutcome::Failed(reason) => tracing::warn!(
                error = %reason,
                elapsed_ms = raw.elapsed.as_millis() as u64,
                output = %raw.stdout.trim(),
                "model output rejected"
            ),
            _ => tracing::debug!(
                outcome = %outcome.tag(),
                elapsed_ms = raw.elapsed.as_millis() as u64,
                "model output accepted"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use invoke::{StubInvoker, StubReply};
    use rerank_common::{Candidate, Context};
    use serde_json::json;

    fn request(indices: &[i64]) -> RerankRequest {
        RerankRequest {
            ctx: Context::default(),
            candidates: indices
                .iter()
                .map(|&index| Candidate {
                    index,
                    pred_ms: 50.0,
                    steps: Some(json!([["wait"]])),
                })
                .collect(),
        }
    }

    fn reranker(stub: Arc<StubInvoker>, policy: IndexPolicy) -> Reranker {
        Reranker::new(PromptProfile::v1(), stub, InvocationPool::new(2, 2), policy)
    }

    #[tokio::test]
    async fn test_ranked() {
        let stub = Arc::new(StubInvoker::stdout("```json\n[2,0,1]\n```"));
        let r = reranker(stub.clone(), IndexPolicy::Strict);
        assert_eq!(
            r.rerank(&request(&[0, 1, 2])).await,
            RerankOutcome::Ranked(vec![2, 0, 1])
        );
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_preference() {
        let stub = Arc::new(StubInvoker::stdout("[]"));
        let r = reranker(stub, IndexPolicy::Strict);
        assert_eq!(r.rerank(&request(&[0])).await, RerankOutcome::NoPreference);
    }

    #[tokio::test]
    async fn test_default_policy_returns_model_list_unchanged() {
        let stub = Arc::new(StubInvoker::stdout("[1, 1, 7]"));
        let r = reranker(stub, IndexPolicy::default());
        let outcome = r.rerank(&request(&[0, 1])).await;
        assert_eq!(outcome, RerankOutcome::Ranked(vec![1, 1, 7]));
        assert_eq!(outcome.into_ranking(), vec![1, 1, 7]);
    }

    #[tokio::test]
    async fn test_empty_candidates_still_invoke_under_passthrough() {
        let stub = Arc::new(StubInvoker::stdout("[3,1,2]"));
        let r = reranker(stub.clone(), IndexPolicy::PassThrough);
        assert_eq!(r.rerank(&request(&[])).await, RerankOutcome::Ranked(vec![3, 1, 2]));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_invocation_when_strict() {
        let stub = Arc::new(StubInvoker::stdout("[1]"));
        let r = reranker(stub.clone(), IndexPolicy::Strict);
        assert_eq!(r.rerank(&request(&[])).await, RerankOutcome::NoPreference);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_single_attempt() {
        let cases = [
            (StubReply::Timeout, "failed:timeout"),
            (StubReply::LaunchFailure, "failed:launch"),
            (
                StubReply::Output {
                    stdout: "[0]".into(),
                    exit_code: 1,
                },
                "failed:non_zero_exit",
            ),
            (
                StubReply::Output {
                    stdout: "I think [0] is best".into(),
                    exit_code: 0,
                },
                "failed:not_json",
            ),
        ];
        for (reply, tag) in cases {
            let stub = Arc::new(StubInvoker::new(reply));
            let r = reranker(stub.clone(), IndexPolicy::Strict);
            let outcome = r.rerank(&request(&[0, 1])).await;
            assert_eq!(outcome.tag(), tag);
            assert_eq!(stub.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_index_policy() {
        let stub = Arc::new(StubInvoker::stdout("[1, 5]"));
        let strict = reranker(stub.clone(), IndexPolicy::Strict);
        assert_eq!(
            strict.rerank(&request(&[0, 1])).await.tag(),
            "failed:invalid_indices"
        );
        let loose = reranker(stub, IndexPolicy::PassThrough);
        assert_eq!(
            loose.rerank(&request(&[0, 1])).await,
            RerankOutcome::Ranked(vec![1, 5])
        );
    }

    #[tokio::test]
    async fn test_overloaded() {
        let stub = Arc::new(StubInvoker::stdout("[0]").with_delay(Duration::from_millis(300)));
        let r = Arc::new(Reranker::new(
            PromptProfile::v1(),
            stub.clone(),
            InvocationPool::new(1, 0),
            IndexPolicy::Strict,
        ));

        let busy = {
            let r = r.clone();
            tokio::spawn(async move { r.rerank(&request(&[0])).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            r.rerank(&request(&[0])).await,
            RerankOutcome::Failed(FailureReason::Overloaded)
        );
        assert_eq!(busy.await.unwrap(), RerankOutcome::Ranked(vec![0]));
        assert_eq!(stub.calls(), 1);
    }
}
