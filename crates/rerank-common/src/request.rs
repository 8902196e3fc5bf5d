use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sensed situational state that conditions a ranking decision.
///
/// Every field is optional on the wire. Numeric fields that are missing or
/// not numbers decode as `None`; hazard flags decode by JSON truthiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Physical scale of the scene.
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,

    /// Obstacle density in [0, 1].
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub clutter: Option<f64>,

    #[serde(default, deserialize_with = "truthy")]
    pub heat: bool,

    #[serde(default, deserialize_with = "truthy")]
    pub gas: bool,

    #[serde(default, deserialize_with = "truthy")]
    pub noise: bool,
}

/// One proposed action plan with its predicted execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Caller-assigned identity. Not required to be unique or in range.
    pub index: i64,

    pub pred_ms: f64,

    /// Plan as a list of stages, each a list of action tokens. Kept as raw
    /// JSON because callers send it in whatever shape they have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankRequest {
    #[serde(default, deserialize_with = "lenient_context")]
    pub ctx: Context,

    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// JSON truthiness: `null`, `false`, zero, and empty strings, arrays and
/// objects are falsy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(v.as_f64())
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(is_truthy(&v))
}

// A `ctx` that is not an object still yields a usable (empty) context.
fn lenient_context<'de, D>(deserializer: D) -> Result<Context, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    if v.is_object() {
        Ok(serde_json::from_value(v).unwrap_or_default())
    } else {
        Ok(Context::default())
    }
}
