// 💳 Product Entity - a debt, investment or savings product
//
// Transactions point at a product by id (deposits, withdrawals, interest).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Loan, credit card, mortgage
    Debt,

    /// Brokerage, fund, crypto
    Investment,

    /// Savings account, deposit certificate
    Savings,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Debt => "debt",
            ProductKind::Investment => "investment",
            ProductKind::Savings => "savings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub kind: ProductKind,
    pub institution: String,
    pub principal: f64,

    /// Annual rate as a percentage (e.g. 4.5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_on: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Product {
    pub fn new(name: &str, kind: ProductKind, institution: &str, principal: f64) -> Self {
        Product {
            name: name.to_string(),
            kind,
            institution: institution.to_string(),
            principal,
            interest_rate: None,
            opened_on: None,
            notes: None,
        }
    }

    pub fn is_debt(&self) -> bool {
        self.kind == ProductKind::Debt
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProductKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Product {
    type Patch = ProductPatch;

    const KIND: EntityKind = EntityKind::Product;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        checks
            .non_empty("name", &self.name)
            .non_empty("institution", &self.institution)
            .non_negative("principal", self.principal);
        if let Some(rate) = self.interest_rate {
            checks.non_negative("interest_rate", rate);
        }
        checks.finish()
    }

    fn validate_patch(patch: &ProductPatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(name) = &patch.name {
            checks.non_empty("name", name);
        }
        if let Some(institution) = &patch.institution {
            checks.non_empty("institution", institution);
        }
        if let Some(principal) = patch.principal {
            checks.non_negative("principal", principal);
        }
        if let Some(rate) = patch.interest_rate {
            checks.non_negative("interest_rate", rate);
        }
        checks.finish()
    }
}
