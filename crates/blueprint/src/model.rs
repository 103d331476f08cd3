//! Blueprint data model: an ordered list of routed steps.

use std::collections::HashSet;

use clipflow_core::{Metadata, Params};
use serde::{Deserialize, Serialize};

use crate::BlueprintError;
use crate::condition::Predicate;

/// Blueprint name used when the source does not declare one.
pub const DEFAULT_NAME: &str = "untitled";

/// A declarative multi-step plan.
///
/// Step order is execution order. Later steps may route on the outcome of
/// earlier ones through `step.<name>` conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,

    /// Header lines (`⫻...`) preserved verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,

    /// Unknown top-level keys.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One routed step of a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 0-based position in the blueprint.
    pub index: usize,

    /// Unique within the blueprint.
    pub name: String,

    #[serde(default = "always")]
    pub condition: Predicate,

    pub target_role: String,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub parameters: Params,

    /// Unknown step keys.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

fn always() -> Predicate {
    Predicate::Always
}

impl Default for Blueprint {
    fn default() -> Self {
        Self::new(DEFAULT_NAME)
    }
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: Vec::new(),
            metadata: Metadata::new(),
            steps: Vec::new(),
        }
    }

    /// Append a step, assigning its index.
    pub fn push(&mut self, mut step: Step) {
        step.index = self.steps.len();
        self.steps.push(step);
    }

    /// Builder form of [`Blueprint::push`].
    pub fn with_step(mut self, step: Step) -> Self {
        self.push(step);
        self
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Role names referenced by the steps, deduplicated, in step order.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !roles.contains(&step.target_role.as_str()) {
                roles.push(&step.target_role);
            }
        }
        roles
    }

    /// Check structural invariants of a blueprint built in code.
    ///
    /// Parsed blueprints always pass; this guards values assembled by hand
    /// or deserialized from JSON.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        let invalid = |message: String| Err(BlueprintError::Invalid { message });

        if self.name.trim().is_empty() {
            return invalid("blueprint name is empty".into());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (position, step) in self.steps.iter().enumerate() {
            if step.index != position {
                return invalid(format!(
                    "step '{}' has index {} but is at position {position}",
                    step.name, step.index
                ));
            }
            if step.name.trim().is_empty() {
                return invalid(format!("step at position {position} has no name"));
            }
            if step.target_role.trim().is_empty() {
                return invalid(format!("step '{}' has no target role", step.name));
            }
            for dep in step.condition.step_refs() {
                if !seen.contains(dep) {
                    return invalid(format!(
                        "step '{}' depends on step '{dep}', which does not run before it",
                        step.name
                    ));
                }
            }
            if !seen.insert(&step.name) {
                return invalid(format!("duplicate step name '{}'", step.name));
            }
        }
        Ok(())
    }
}

impl Step {
    /// A step that always applies.
    pub fn new(name: impl Into<String>, target_role: impl Into<String>) -> Self {
        Self {
            index: 0,
            name: name.into(),
            condition: Predicate::Always,
            target_role: target_role.into(),
            parameters: Params::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn when(mut self, condition: Predicate) -> Self {
        self.condition = condition;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parse_condition;
    use clipflow_core::Category;

    fn two_step() -> Blueprint {
        Blueprint::new("triage")
            .with_step(Step::new("sql", "sql_reviewer").when(Predicate::category(Category::Sql)))
            .with_step(Step::new("code", "code_analyst").when(Predicate::category(Category::Code)))
    }

    #[test]
    fn push_assigns_indices() {
        let bp = two_step();
        assert_eq!(bp.steps[0].index, 0);
        assert_eq!(bp.steps[1].index, 1);
        assert!(bp.validate().is_ok());
        assert_eq!(bp.roles(), vec!["sql_reviewer", "code_analyst"]);
    }

    #[test]
    fn validate_rejects_out_of_order_index() {
        let mut bp = two_step();
        bp.steps[1].index = 5;
        assert!(matches!(bp.validate(), Err(BlueprintError::Invalid { .. })));
    }

    #[test]
    fn validate_rejects_duplicates_and_blank_roles() {
        let bp = Blueprint::new("x")
            .with_step(Step::new("a", "r"))
            .with_step(Step::new("a", "r"));
        assert!(bp.validate().unwrap_err().to_string().contains("duplicate"));

        let bp = Blueprint::new("x").with_step(Step::new("a", " "));
        assert!(bp.validate().unwrap_err().to_string().contains("no target role"));
    }

    #[test]
    fn validate_rejects_forward_step_reference() {
        let bp = Blueprint::new("x")
            .with_step(Step::new("a", "r").when(parse_condition("step.b == succeeded").unwrap()))
            .with_step(Step::new("b", "r"));
        assert!(bp.validate().unwrap_err().to_string().contains("'b'"));

        let bp = Blueprint::new("x")
            .with_step(Step::new("a", "r"))
            .with_step(Step::new("b", "r").when(parse_condition("step.a == failed").unwrap()));
        assert!(bp.validate().is_ok());
    }

    #[test]
    fn blueprint_serializes_to_json() {
        let bp = two_step().with_step(Step::new("links", "link_collector").param("limit", 3));
        let json = serde_json::to_value(&bp).unwrap();
        assert_eq!(json["steps"][0]["condition"], "category == sql");
        assert_eq!(json["steps"][2]["condition"], "ALWAYS");
        assert_eq!(json["steps"][2]["parameters"]["limit"], 3);

        let back: Blueprint = serde_json::from_value(json).unwrap();
        assert_eq!(back, bp);
    }
}
