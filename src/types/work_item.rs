//! Work item received from a poll response

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One unit of work the engine asks this client to execute.
///
/// `step_execution_id` uniquely identifies one attempt; `(step_namespace,
/// step_name)` must resolve to a registered handler. Unknown fields in the
/// poll response are ignored, and the engine's loose encodings of `polled`
/// (boolean, 0/1, or their string forms) are all accepted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkItem {
    pub step_id: i64,
    pub process_id: i64,
    pub step_execution_id: i64,
    pub run_count: i32,
    pub step_name: String,
    pub step_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_ref: Option<String>,
    pub input_param: Map<String, Value>,
    pub is_optional: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub polled: bool,
    pub started: i64,
    pub scheduled: i64,
    pub updated: i64,
    pub priority: i32,
}

/// Accepts `true`/`false`, numeric 0/non-zero, and the string forms of either.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("false") || s.is_empty() {
                Ok(false)
            } else if let Ok(n) = s.parse::<f64>() {
                Ok(n != 0.0)
            } else {
                Err(serde::de::Error::custom(format!(
                    "cannot interpret {s:?} as a boolean"
                )))
            }
        }
        other => Err(serde::de::Error::custom(format!(
            "cannot interpret {other} as a boolean"
        ))),
    }
}
