use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const V1_GOAL: &str = "GOAL: pick best tradeoff of speed vs hazard. Prefer lower pred_ms unless heat/gas imply sensing first. Avoid redundant waits.";
pub const V1_JSON_ONLY: &str = "Return ONLY a JSON list (e.g., [3,1,2]). No prose.";
pub const V1_HEADER: &str = "CANDIDATES:";
pub const V1_MAX_SIGNATURE_TOKENS: usize = 8;

/// Fixed prompt wording plus the token abbreviation table.
///
/// The prompt text is part of the contract with the model, so it is versioned
/// as a unit. A profile loaded from disk fully replaces the built-in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptProfile {
    pub version: String,
    pub goal: String,
    pub json_only: String,
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_max_signature_tokens")]
    pub max_signature_tokens: usize,
    /// Action token → one-character code.
    pub abbreviations: BTreeMap<String, char>,
}

fn default_header() -> String {
    V1_HEADER.to_string()
}

fn default_max_signature_tokens() -> usize {
    V1_MAX_SIGNATURE_TOKENS
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read prompt profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse prompt profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid prompt profile: {0}")]
    Invalid(String),
}

impl PromptProfile {
    pub fn v1() -> Self {
        let abbreviations = [
            ("lidar_scan", 'L'),
            ("thermal_snap", 'T'),
            ("gas_sniff", 'G'),
            ("audio_probe", 'A'),
            ("wait", 'W'),
        ]
        .into_iter()
        .map(|(token, code)| (token.to_string(), code))
        .collect();

        Self {
            version: "v1".to_string(),
            goal: V1_GOAL.to_string(),
            json_only: V1_JSON_ONLY.to_string(),
            header: V1_HEADER.to_string(),
            max_signature_tokens: V1_MAX_SIGNATURE_TOKENS,
            abbreviations,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ProfileError> {
        let profile: PromptProfile = serde_json::from_str(s)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Lines of the prompt are newline-joined, so none of the fixed strings
    /// may contain one.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.version.trim().is_empty() {
            return Err(ProfileError::Invalid("version must not be empty".into()));
        }
        for (name, line) in [
            ("goal", &self.goal),
            ("json_only", &self.json_only),
            ("header", &self.header),
        ] {
            if line.contains('\n') {
                return Err(ProfileError::Invalid(format!(
                    "{name} must be a single line"
                )));
            }
        }
        Ok(())
    }

    pub fn abbreviation(&self, token: &str) -> Option<char> {
        self.abbreviations.get(token).copied()
    }
}

impl Default for PromptProfile {
    fn default() -> Self {
        Self::v1()
    }
}
