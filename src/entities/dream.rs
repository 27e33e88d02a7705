// 🌙 Dream Entity - a wishlist item without a committed plan yet
//
// Unlike a Goal there is no deadline requirement; priority orders the list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

fn default_priority() -> u8 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dream {
    pub title: String,
    pub estimated_cost: f64,

    /// 1 (someday) ..= 5 (next up)
    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Dream {
    pub fn new(title: &str, estimated_cost: f64) -> Self {
        Dream {
            title: title.to_string(),
            estimated_cost,
            priority: default_priority(),
            target_date: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DreamPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn priority_in_range(priority: u8) -> bool {
    (1..=5).contains(&priority)
}

impl Entity for Dream {
    type Patch = DreamPatch;

    const KIND: EntityKind = EntityKind::Dream;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("title", &self.title)
            .positive("estimated_cost", self.estimated_cost)
            .check("priority", priority_in_range(self.priority), "must be between 1 and 5")
            .finish()
    }

    fn validate_patch(patch: &DreamPatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(title) = &patch.title {
            checks.non_empty("title", title);
        }
        if let Some(cost) = patch.estimated_cost {
            checks.positive("estimated_cost", cost);
        }
        if let Some(priority) = patch.priority {
            checks.check("priority", priority_in_range(priority), "must be between 1 and 5");
        }
        checks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dream_priority_bounds() {
        let mut dream = Dream::new("Sailboat", 30000.0);
        assert!(dream.validate().is_ok());

        dream.priority = 9;
        let errors = dream.validate().unwrap_err();
        assert_eq!(errors[0].field, "priority");
    }

    #[test]
    fn test_dream_priority_defaults_when_missing() {
        let dream: Dream = serde_json::from_value(serde_json::json!({
            "title": "Trip to Japan",
            "estimated_cost": 4000.0
        }))
        .unwrap();
        assert_eq!(dream.priority, 3);
    }
}
