use std::collections::HashSet;

use rerank_common::{Candidate, FailureReason, RerankOutcome};
use serde_json::Value;

/// What to do with indices the model returns that do not belong to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexPolicy {
    /// Every index must be one of the request's candidate indices, each at
    /// most once. Anything else is a failure.
    Strict,
    /// Return whatever integers the model produced, as-is.
    #[default]
    PassThrough,
}

impl IndexPolicy {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "strict" => Ok(IndexPolicy::Strict),
            "passthrough" | "pass_through" => Ok(IndexPolicy::PassThrough),
            other => Err(format!(
                "unknown index policy '{}', available: strict, passthrough",
                other
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexPolicy::Strict => "strict",
            IndexPolicy::PassThrough => "passthrough",
        }
    }
}

/// Remove a surrounding markdown code fence and its language tag line.
pub fn strip_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = text.trim_matches('`').trim();
    match inner.split_once('\n') {
        Some((_tag, rest)) => rest.trim(),
        None => inner,
    }
}

/// Parse model output as a JSON list of integers.
///
/// Floats, numeric strings and booleans are rejected; so are integers that do
/// not fit in an `i64`. Order and duplicates are preserved.
pub fn parse_ranking(raw: &str) -> Result<Vec<i64>, FailureReason> {
    let text = strip_fence(raw);
    let value: Value =
        serde_json::from_str(text).map_err(|e| FailureReason::NotJson(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(FailureReason::WrongShape);
    };
    items
        .iter()
        .map(|v| v.as_i64().ok_or(FailureReason::WrongShape))
        .collect()
}

/// Every index must name a candidate and appear at most once.
pub fn check_indices(ranking: &[i64], candidates: &[Candidate]) -> Result<(), FailureReason> {
    let known: HashSet<i64> = candidates.iter().map(|c| c.index).collect();
    let mut seen = HashSet::with_capacity(ranking.len());
    for &index in ranking {
        if !known.contains(&index) {
            return Err(FailureReason::InvalidIndices(format!(
                "{index} is not a candidate index"
            )));
        }
        if !seen.insert(index) {
            return Err(FailureReason::InvalidIndices(format!(
                "{index} appears more than once"
            )));
        }
    }
    Ok(())
}

/// Turn raw model output into an outcome for the given request candidates.
pub fn interpret(raw: &str, candidates: &[Candidate], policy: IndexPolicy) -> RerankOutcome {
    let ranking = match parse_ranking(raw) {
        Ok(r) => r,
        Err(reason) => return RerankOutcome::Failed(reason),
    };
    if ranking.is_empty() {
        return RerankOutcome::NoPreference;
    }
    if policy == IndexPolicy::Strict {
        if let Err(reason) = check_indices(&ranking, candidates) {
            return RerankOutcome::Failed(reason);
        }
    }
    RerankOutcome::Ranked(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands(indices: &[i64]) -> Vec<Candidate> {
        indices
            .iter()
            .map(|&index| Candidate {
                index,
                pred_ms: 100.0,
                steps: None,
            })
            .collect()
    }

    #[test]
    fn test_fence_with_language_tag() {
        assert_eq!(strip_fence("```json\n[2,0,1]\n```"), "[2,0,1]");
        assert_eq!(parse_ranking("```json\n[2,0,1]\n```").unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_fence_variants() {
        assert_eq!(strip_fence("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_fence("```[3]```"), "[3]");
        assert_eq!(strip_fence("  \n[0]\n "), "[0]");
        // Only a leading fence is recognised.
        assert_eq!(strip_fence("[0] ```"), "[0] ```");
    }

    #[test]
    fn test_plain_list() {
        assert_eq!(parse_ranking("  [3, 1, 2]\n").unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_ranking("[1, 1, -4]").unwrap(), vec![1, 1, -4]);
        assert_eq!(parse_ranking("[]").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_non_integer_element_rejects_whole_list() {
        assert_eq!(parse_ranking("[1, 2.5, 3]"), Err(FailureReason::WrongShape));
        assert_eq!(parse_ranking("[1, \"2\"]"), Err(FailureReason::WrongShape));
        assert_eq!(parse_ranking("[true]"), Err(FailureReason::WrongShape));
        assert_eq!(parse_ranking("[2.0]"), Err(FailureReason::WrongShape));
        assert_eq!(
            parse_ranking("[18446744073709551615]"),
            Err(FailureReason::WrongShape)
        );
    }

    #[test]
    fn test_wrong_shape_and_prose() {
        assert_eq!(parse_ranking("{\"order\": [1]}"), Err(FailureReason::WrongShape));
        assert_eq!(parse_ranking("3"), Err(FailureReason::WrongShape));
        assert!(matches!(
            parse_ranking("Sure! Here is the order: [1, 0]"),
            Err(FailureReason::NotJson(_))
        ));
        assert!(matches!(parse_ranking(""), Err(FailureReason::NotJson(_))));
    }

    #[test]
    fn test_check_indices() {
        let c = cands(&[0, 1, 2]);
        assert!(check_indices(&[2, 0], &c).is_ok());
        assert!(matches!(
            check_indices(&[0, 7], &c),
            Err(FailureReason::InvalidIndices(_))
        ));
        assert!(matches!(
            check_indices(&[1, 1], &c),
            Err(FailureReason::InvalidIndices(_))
        ));
    }

    #[test]
    fn test_interpret_policies() {
        let c = cands(&[0, 1, 2]);
        assert_eq!(
            interpret("[2,0,1]", &c, IndexPolicy::Strict),
            RerankOutcome::Ranked(vec![2, 0, 1])
        );
        assert_eq!(interpret("[]", &c, IndexPolicy::Strict), RerankOutcome::NoPreference);
        assert_eq!(
            interpret("[9,9]", &c, IndexPolicy::Strict).tag(),
            "failed:invalid_indices"
        );
        assert_eq!(
            interpret("[9,9]", &c, IndexPolicy::PassThrough),
            RerankOutcome::Ranked(vec![9, 9])
        );
        assert_eq!(
            interpret("[1, 2.5, 3]", &c, IndexPolicy::PassThrough),
            RerankOutcome::Failed(FailureReason::WrongShape)
        );
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(IndexPolicy::parse("strict"), Ok(IndexPolicy::Strict));
        assert_eq!(IndexPolicy::parse("passthrough"), Ok(IndexPolicy::PassThrough));
        assert!(IndexPolicy::parse("loose").is_err());
        assert_eq!(IndexPolicy::default(), IndexPolicy::PassThrough);
        assert_eq!(IndexPolicy::default().name(), "passthrough");
    }
}
