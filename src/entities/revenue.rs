// 💰 Revenue Entity - money coming in (salary, freelance, dividends)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revenue {
    pub source: String,
    pub amount: f64,
    pub currency: String,
    pub received_on: NaiveDate,

    #[serde(default)]
    pub recurring: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Revenue {
    pub fn new(source: &str, amount: f64, currency: &str, received_on: NaiveDate) -> Self {
        Revenue {
            source: source.to_string(),
            amount,
            currency: currency.to_string(),
            received_on,
            recurring: false,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenuePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Revenue {
    type Patch = RevenuePatch;

    const KIND: EntityKind = EntityKind::Revenue;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("source", &self.source)
            .positive("amount", self.amount)
            .currency("currency", &self.currency)
            .finish()
    }

    fn validate_patch(patch: &RevenuePatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(source) = &patch.source {
            checks.non_empty("source", source);
        }
        if let Some(amount) = patch.amount {
            checks.positive("amount", amount);
        }
        if let Some(currency) = &patch.currency {
            checks.currency("currency", currency);
        }
        checks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_validation() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert!(Revenue::new("Salary", 4200.0, "USD", date).validate().is_ok());

        let errors = Revenue::new("Salary", 4200.0, "dollars", date)
            .validate()
            .unwrap_err();
        assert_eq!(errors[0].field, "currency");
    }

    #[test]
    fn test_revenue_recurring_defaults_to_false() {
        let revenue: Revenue = serde_json::from_value(serde_json::json!({
            "source": "Dividends",
            "amount": 12.5,
            "currency": "USD",
            "received_on": "2025-03-01"
        }))
        .unwrap();
        assert!(!revenue.recurring);
    }
}
