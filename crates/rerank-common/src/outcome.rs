/// Result of one rerank pass, before the HTTP boundary collapses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerankOutcome {
    /// Preferred candidate indices, best first.
    Ranked(Vec<i64>),
    /// The model answered with an empty list, or there was nothing to rank.
    NoPreference,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("invocation pool is at capacity")]
    Overloaded,

    #[error("model process could not be launched: {0}")]
    Launch(String),

    #[error("model process timed out after {0}ms")]
    Timeout(u64),

    #[error("model process i/o error: {0}")]
    Io(String),

    #[error("model process exited with {}", exit_label(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("model output is not JSON: {0}")]
    NotJson(String),

    #[error("model output is not a list of integers")]
    WrongShape,

    #[error("model output has invalid indices: {0}")]
    InvalidIndices(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (killed by signal)".to_string(),
    }
}

impl FailureReason {
    /// Stable short name, used in metrics and the outcome header.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::MalformedRequest(_) => "malformed_request",
            FailureReason::Overloaded => "overloaded",
            FailureReason::Launch(_) => "launch",
            FailureReason::Timeout(_) => "timeout",
            FailureReason::Io(_) => "io",
            FailureReason::NonZeroExit { .. } => "non_zero_exit",
            FailureReason::NotJson(_) => "not_json",
            FailureReason::WrongShape => "wrong_shape",
            FailureReason::InvalidIndices(_) => "invalid_indices",
        }
    }
}

impl RerankOutcome {
    /// Legacy wire form: the ranking, or an empty list for every other case.
    pub fn into_ranking(self) -> Vec<i64> {
        match self {
            RerankOutcome::Ranked(indices) => indices,
            RerankOutcome::NoPreference | RerankOutcome::Failed(_) => Vec::new(),
        }
    }

    pub fn tag(&self) -> String {
        match self {
            RerankOutcome::Ranked(_) => "ranked".to_string(),
            RerankOutcome::NoPreference => "no_preference".to_string(),
            RerankOutcome::Failed(reason) => format!("failed:{}", reason.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_to_legacy_ranking() {
        assert_eq!(RerankOutcome::Ranked(vec![2, 0, 1]).into_ranking(), vec![2, 0, 1]);
        assert!(RerankOutcome::NoPreference.into_ranking().is_empty());
        assert!(RerankOutcome::Failed(FailureReason::WrongShape)
            .into_ranking()
            .is_empty());
    }

    #[test]
    fn test_tags() {
        assert_eq!(RerankOutcome::Ranked(vec![1]).tag(), "ranked");
        assert_eq!(RerankOutcome::NoPreference.tag(), "no_preference");
        assert_eq!(
            RerankOutcome::Failed(FailureReason::Timeout(15_000)).tag(),
            "failed:timeout"
        );
    }

    #[test]
    fn test_exit_display() {
        let e = FailureReason::NonZeroExit { code: Some(2) };
        assert_eq!(e.to_string(), "model process exited with status 2");
        let e = FailureReason::NonZeroExit { code: None };
        assert!(e.to_string().contains("signal"));
    }
}
