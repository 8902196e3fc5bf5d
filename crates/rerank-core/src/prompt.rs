//! Deterministic prompt construction.
//!
//! The prompt is line oriented:
//!
//! ```text
//! CTX: <size>,<clutter>,<heat>,<gas>,<noise>
//! <goal>
//! <json-only instruction>
//! CANDIDATES:
//! <index>:<pred_ms>,<signature>
//! ```

use rerank_common::{Candidate, Context};
use serde_json::Value;

use crate::profile::PromptProfile;

pub fn encode(profile: &PromptProfile, ctx: &Context, candidates: &[Candidate]) -> String {
    let mut lines = Vec::with_capacity(candidates.len() + 4);
    lines.push(context_line(ctx));
    lines.push(profile.goal.clone());
    lines.push(profile.json_only.clone());
    lines.push(profile.header.clone());
    lines.extend(candidates.iter().map(|c| candidate_line(profile, c)));
    lines.join("\n")
}

/// Absent numeric fields render as zero at the same precision.
pub fn context_line(ctx: &Context) -> String {
    format!(
        "CTX: {:.1},{:.2},{},{},{}",
        ctx.size.unwrap_or(0.0),
        ctx.clutter.unwrap_or(0.0),
        u8::from(ctx.heat),
        u8::from(ctx.gas),
        u8::from(ctx.noise),
    )
}

pub fn candidate_line(profile: &PromptProfile, candidate: &Candidate) -> String {
    format!(
        "{}:{},{}",
        candidate.index,
        truncate_ms(candidate.pred_ms),
        signature(profile, candidate.steps.as_ref())
    )
}

/// Truncates toward zero. Non-finite values saturate the way `as` casts do.
fn truncate_ms(pred_ms: f64) -> i64 {
    pred_ms.trunc() as i64
}

/// Compact encoding of a plan: stages are flattened one level, cut to the
/// profile's token limit, and each token is mapped to a single code.
pub fn signature(profile: &PromptProfile, steps: Option<&Value>) -> String {
    let Some(Value::Array(stages)) = steps else {
        return String::new();
    };

    stages
        .iter()
        .filter_map(Value::as_array)
        .flatten()
        .take(profile.max_signature_tokens)
        .map(|token| abbreviate(profile, token))
        .collect()
}

/// Known tokens map through the table; anything else contributes its first
/// character uppercased, which may be empty.
pub fn abbreviate(profile: &PromptProfile, token: &Value) -> String {
    let text = match token {
        Value::String(s) => {
            if let Some(code) = profile.abbreviation(s) {
                return code.to_string();
            }
            s.clone()
        }
        other => other.to_string(),
    };
    text.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}
