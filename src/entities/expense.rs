// Expense Entity - money going out, categorized

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub spent_on: NaiveDate,

    #[serde(default)]
    pub recurring: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Expense {
    pub fn new(
        description: &str,
        amount: f64,
        currency: &str,
        category: &str,
        spent_on: NaiveDate,
    ) -> Self {
        Expense {
            description: description.to_string(),
            amount,
            currency: currency.to_string(),
            category: category.to_string(),
            spent_on,
            recurring: false,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Expense {
    type Patch = ExpensePatch;

    const KIND: EntityKind = EntityKind::Expense;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("description", &self.description)
            .positive("amount", self.amount)
            .currency("currency", &self.currency)
            .non_empty("category", &self.category)
            .finish()
    }

    fn validate_patch(patch: &ExpensePatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(description) = &patch.description {
            checks.non_empty("description", description);
        }
        if let Some(amount) = patch.amount {
            checks.positive("amount", amount);
        }
        if let Some(currency) = &patch.currency {
            checks.currency("currency", currency);
        }
        if let Some(category) = &patch.category {
            checks.non_empty("category", category);
        }
        checks.finish()
    }
}
