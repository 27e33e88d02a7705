// Transaction Entity - money moving in or out of a product
//
// product_id is whatever id the caller knows the product by; it is stored
// as-is and never translated between backends.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Interest,
    Fee,
}

impl TransactionKind {
    /// Sign applied to the amount when summing a product balance
    pub fn sign(&self) -> f64 {
        match self {
            TransactionKind::Deposit | TransactionKind::Interest => 1.0,
            TransactionKind::Withdrawal | TransactionKind::Fee => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub product_id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub occurred_on: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Transaction {
    pub fn new(product_id: &str, kind: TransactionKind, amount: f64, occurred_on: NaiveDate) -> Self {
        Transaction {
            product_id: product_id.to_string(),
            kind,
            amount,
            occurred_on,
            notes: None,
        }
    }

    pub fn signed_amount(&self) -> f64 {
        self.kind.sign() * self.amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Transaction {
    type Patch = TransactionPatch;

    const KIND: EntityKind = EntityKind::Transaction;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("product_id", &self.product_id)
            .positive("amount", self.amount)
            .finish()
    }

    fn validate_patch(patch: &TransactionPatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(product_id) = &patch.product_id {
            checks.non_empty("product_id", product_id);
        }
        if let Some(amount) = patch.amount {
            checks.positive("amount", amount);
        }
        checks.finish()
    }
}
