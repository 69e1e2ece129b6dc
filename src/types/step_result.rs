//! Step results and the normalization of handler return values

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal disposition of one work item attempt, as reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Completed,
    Failed,
    Running,
}

/// Result a handler returns when it wants control over status or rescheduling.
///
/// Handlers that only produce data can return a plain [`HandlerOutput::Value`]
/// instead; the dispatcher defaults those to [`StepStatus::Completed`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StepResult {
    pub status: StepStatus,
    pub output: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_after_seconds: Option<i64>,
}

impl StepResult {
    pub fn completed(output: Map<String, Value>) -> Self {
        Self {
            status: StepStatus::Completed,
            output,
            reschedule_after_seconds: None,
        }
    }

    pub fn failed(output: Map<String, Value>) -> Self {
        Self {
            status: StepStatus::Failed,
            output,
            reschedule_after_seconds: None,
        }
    }

    /// Keep the step running and ask the engine to schedule another attempt
    /// after `seconds`.
    pub fn running_after(seconds: i64, output: Map<String, Value>) -> Self {
        Self {
            status: StepStatus::Running,
            output,
            reschedule_after_seconds: Some(seconds),
        }
    }

    /// Effective status: an explicit positive reschedule keeps the step running.
    pub fn effective_status(&self) -> StepStatus {
        if self.status == StepStatus::Running || self.reschedule_after_seconds.unwrap_or(0) > 0 {
            StepStatus::Running
        } else {
            self.status
        }
    }
}

/// What a handler hands back to the dispatcher.
///
/// `Value` covers the common case of "here is my data"; `Result` is for
/// handlers that need to fail explicitly, stay running, or reschedule.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    Result(StepResult),
    Value(Value),
}

impl HandlerOutput {
    /// Normalize into a [`StepResult`]:
    /// an explicit result is adopted as-is, a JSON object becomes the output
    /// map, and any other value is wrapped under a `"result"` key. Status
    /// defaults to completed for plain values.
    pub fn into_step_result(self) -> StepResult {
        match self {
            HandlerOutput::Result(result) => result,
            HandlerOutput::Value(Value::Object(map)) => StepResult::completed(map),
            HandlerOutput::Value(other) => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                StepResult::completed(map)
            }
        }
    }
}

impl From<StepResult> for HandlerOutput {
    fn from(result: StepResult) -> Self {
        HandlerOutput::Result(result)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Value(value)
    }
}

impl From<Map<String, Value>> for HandlerOutput {
    fn from(map: Map<String, Value>) -> Self {
        HandlerOutput::Value(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&StepStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(
            serde_json::to_string(&StepStatus::Running).unwrap(),
            "\"RUNNING\""
        );
    }

    #[test]
    fn object_value_becomes_output_map() {
        let output: HandlerOutput = json!({"echo": "hi", "count": 3}).into();
        let result = output.into_step_result();
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(result.output["echo"], "hi");
        assert_eq!(result.output["count"], 3);
    }

    #[test]
    fn scalar_values_are_wrapped() {
        for value in [json!(42), json!("text"), json!(true), json!([1, 2, 3]), json!(null)] {
            let result = HandlerOutput::from(value.clone()).into_step_result();
            assert_eq!(result.status, StepStatus::Completed);
            assert_eq!(result.output["result"], value);
        }
    }

    #[test]
    fn explicit_result_is_adopted() {
        let mut output = Map::new();
        output.insert("attempt".to_string(), json!(1));
        let result = HandlerOutput::from(StepResult::running_after(5, output)).into_step_result();
        assert_eq!(result.effective_status(), StepStatus::Running);
        assert_eq!(result.reschedule_after_seconds, Some(5));
    }

    #[test]
    fn positive_reschedule_forces_running() {
        let result = StepResult {
            status: StepStatus::Completed,
            output: Map::new(),
            reschedule_after_seconds: Some(10),
        };
        assert_eq!(result.effective_status(), StepStatus::Running);
    }
}
