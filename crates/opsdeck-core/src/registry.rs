// Plan registry
//
// Maps workflow names to plan-template generators. The registry is fixed
// once built; adding a workflow means adding a template function.

use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::plan::{Plan, Step};

/// Generator producing a fresh plan template
pub type PlanTemplate = Arc<dyn Fn() -> Plan + Send + Sync>;

/// Registry of workflow templates in registration order
#[derive(Clone, Default)]
pub struct PlanRegistry {
    templates: Vec<(String, PlanTemplate)>,
}

impl fmt::Debug for PlanRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanRegistry")
            .field("workflows", &self.list_workflows())
            .finish()
    }
}

impl PlanRegistry {
    /// Start building a registry
    pub fn builder() -> PlanRegistryBuilder {
        PlanRegistryBuilder::default()
    }

    /// Registry with the built-in workflows
    pub fn builtin() -> Self {
        Self::builder()
            .template("weekly_review", weekly_review_plan)
            .template("weekly_review_cross_tool", weekly_review_cross_tool_plan)
            .build()
    }

    /// Registered workflow names, in registration order
    pub fn list_workflows(&self) -> Vec<String> {
        self.templates.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Produce the plan template for `name`
    pub fn load_plan(&self, name: &str) -> Result<Plan> {
        let (_, template) = self
            .templates
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| EngineError::unknown_workflow(name))?;
        let plan = template();
        tracing::debug!(workflow = %name, steps = plan.steps.len(), "Loaded plan");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Builder for PlanRegistry
#[derive(Default)]
pub struct PlanRegistryBuilder {
    templates: Vec<(String, PlanTemplate)>,
}

impl PlanRegistryBuilder {
    /// Register a template. A later registration under the same name
    /// replaces the earlier one in place.
    pub fn template<F>(mut self, name: impl Into<String>, template: F) -> Self
    where
        F: Fn() -> Plan + Send + Sync + 'static,
    {
        let name = name.into();
        let template: PlanTemplate = Arc::new(template);
        match self.templates.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = template,
            None => self.templates.push((name, template)),
        }
        self
    }

    pub fn build(self) -> PlanRegistry {
        PlanRegistry {
            templates: self.templates,
        }
    }
}

/// Weekly review: collect tasks, summarize, notify the team and manager
pub fn weekly_review_plan() -> Plan {
    Plan::new(
        "weekly_review",
        vec![
            Step::new(
                "fetch_tasks",
                "Collect open tasks from Notion, Gmail, Slack",
                json!({}),
            ),
            Step::new(
                "summarize",
                "Generate AI summary of current tasks",
                json!({"model": "gpt-4"}),
            ),
            Step::new(
                "notify",
                "Send summary to Slack and email manager",
                json!({"channel": "{{channel}}", "manager": "{{manager_email}}"}),
            ),
        ],
    )
}

/// Cross-tool weekly review: starred mail -> Slack status -> Notion page
pub fn weekly_review_cross_tool_plan() -> Plan {
    Plan::new(
        "weekly_review_cross_tool",
        vec![
            Step::new(
                "fetch_emails",
                "Collect starred/unread emails from Gmail",
                json!({"label": "STARRED"}),
            ),
            Step::new(
                "notify",
                "Send status summary to Slack",
                json!({"channel": "{{channel}}"}),
            ),
            Step::new(
                "persist_summary",
                "Create Notion summary page",
                json!({"database_id": "{{database_id}}"}),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_is_stable() {
        let registry = PlanRegistry::builtin();
        assert_eq!(
            registry.list_workflows(),
            vec!["weekly_review", "weekly_review_cross_tool"]
        );
    }

    #[test]
    fn test_load_unknown_workflow() {
        let registry = PlanRegistry::builtin();
        let err = registry.load_plan("nope").unwrap_err();
        assert!(matches!(err, EngineError::UnknownWorkflow(name) if name == "nope"));
    }

    #[test]
    fn test_load_weekly_review() {
        let plan = PlanRegistry::builtin().load_plan("weekly_review").unwrap();
        let names: Vec<_> = plan.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(names, vec!["fetch_tasks", "summarize", "notify"]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_builder_replaces_duplicate_name() {
        let registry = PlanRegistry::builder()
            .template("a", || Plan::new("a", vec![]))
            .template("b", || Plan::new("b", vec![]))
            .template("a", || Plan::new("a2", vec![]))
            .build();

        assert_eq!(registry.list_workflows(), vec!["a", "b"]);
        assert_eq!(registry.load_plan("a").unwrap().name, "a2");
    }

    #[test]
    fn test_templates_are_fresh_each_load() {
        let registry = PlanRegistry::builtin();
        let first = registry.load_plan("weekly_review_cross_tool").unwrap();
        let second = registry.load_plan("weekly_review_cross_tool").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 2);
    }
}
