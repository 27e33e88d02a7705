// 🎯 Goal Entity - a savings or payoff target with a deadline
//
// "Save 5000 USD by December", "Pay off 3 credit cards by June".
// The unit is free text: a currency code or a count of things.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub target_value: f64,
    pub unit: String,
    pub deadline: NaiveDate,

    /// Progress so far (0 for a fresh goal)
    #[serde(default)]
    pub current_value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Goal {
    pub fn new(name: &str, target_value: f64, unit: &str, deadline: NaiveDate) -> Self {
        Goal {
            name: name.to_string(),
            target_value,
            unit: unit.to_string(),
            deadline,
            current_value: 0.0,
            description: None,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.target_value <= 0.0 {
            return 0.0;
        }
        (self.current_value / self.target_value).min(1.0)
    }

    pub fn is_achieved(&self) -> bool {
        self.current_value >= self.target_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Goal {
    type Patch = GoalPatch;

    const KIND: EntityKind = EntityKind::Goal;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("name", &self.name)
            .positive("target_value", self.target_value)
            .non_empty("unit", &self.unit)
            .non_negative("current_value", self.current_value)
            .finish()
    }

    fn validate_patch(patch: &GoalPatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(name) = &patch.name {
            checks.non_empty("name", name);
        }
        if let Some(target) = patch.target_value {
            checks.positive("target_value", target);
        }
        if let Some(unit) = &patch.unit {
            checks.non_empty("unit", unit);
        }
        if let Some(current) = patch.current_value {
            checks.non_negative("current_value", current);
        }
        checks.finish()
    }
}
