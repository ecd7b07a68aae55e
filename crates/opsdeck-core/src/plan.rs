// Plan domain types
//
// A Plan is an immutable, named, ordered list of steps. Step payloads are
// arbitrary JSON mappings whose string leaves may carry `{{param}}` tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binder::{bind, bind_str, Params};
use crate::error::{EngineError, Result};

/// One named unit of work in a plan, before dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier (e.g. "fetch_tasks", "notify")
    pub step: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

impl Step {
    pub fn new(step: impl Into<String>, description: impl Into<String>, payload: Value) -> Self {
        Self {
            step: step.into(),
            description: description.into(),
            payload,
        }
    }
}

/// Named ordered list of workflow steps with templated payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Check the plan is dispatchable: every step has an identifier and
    /// every payload is a mapping.
    pub fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            if step.step.trim().is_empty() {
                return Err(EngineError::invalid_plan(format!(
                    "{}: step {} has an empty identifier",
                    self.name, index
                )));
            }
            if !step.payload.is_object() {
                return Err(EngineError::invalid_plan(format!(
                    "{}: payload of step '{}' must be a mapping",
                    self.name, step.step
                )));
            }
        }
        Ok(())
    }

    /// Substitute params into every string of the plan.
    ///
    /// The result is structurally isomorphic to `self`: same steps, same
    /// payload keys in the same order.
    pub fn bind(&self, params: &Params) -> Plan {
        Plan {
            name: bind_str(&self.name, params),
            steps: self
                .steps
                .iter()
                .map(|step| Step {
                    step: bind_str(&step.step, params),
                    description: bind_str(&step.description, params),
                    payload: bind(&step.payload, params),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_empty_plan() {
        let plan = Plan::new("empty", vec![]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_step() {
        let plan = Plan::new("bad", vec![Step::new(" ", "", json!({}))]);
        let err = plan.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[test]
    fn test_validate_rejects_non_mapping_payload() {
        let plan = Plan::new("bad", vec![Step::new("notify", "", json!(["x"]))]);
        assert!(matches!(
            plan.validate().unwrap_err(),
            EngineError::InvalidPlan(_)
        ));
    }

    #[test]
    fn test_bind_keeps_structure() {
        let plan = Plan::new(
            "review",
            vec![
                Step::new("fetch_tasks", "Collect", json!({})),
                Step::new(
                    "notify",
                    "Send to {{channel}}",
                    json!({"channel": "{{channel}}", "nested": {"list": ["{{channel}}", 1]}}),
                ),
            ],
        );
        let params = Params::from([("channel".to_string(), "#ops".to_string())]);

        let bound = plan.bind(&params);

        assert_eq!(bound.steps.len(), 2);
        assert_eq!(bound.steps[1].description, "Send to #ops");
        assert_eq!(
            bound.steps[1].payload,
            json!({"channel": "#ops", "nested": {"list": ["#ops", 1]}})
        );
        assert_eq!(bound.steps[0], plan.steps[0]);
    }

    #[test]
    fn test_step_deserializes_without_payload() {
        let step: Step = serde_json::from_value(json!({"step": "summarize"})).unwrap();
        assert_eq!(step.payload, json!({}));
        assert_eq!(step.description, "");
    }
}
