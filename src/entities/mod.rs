// Entity Models - the seven record kinds mirrored into both stores
//
// Each entity has:
// - A plain record (no identity until a backend assigns one)
// - A patch type where every field is optional
// - Required-field validation that runs before any backend is touched
//
// The Entity trait is the per-entity adapter the coordinator is generic over.

pub mod bet;
pub mod dream;
pub mod expense;
pub mod goal;
pub mod product;
pub mod revenue;
pub mod transaction;

pub use bet::{Bet, BetPatch, BetStatus};
pub use dream::{Dream, DreamPatch};
pub use expense::{Expense, ExpensePatch};
pub use goal::{Goal, GoalPatch};
pub use product::{Product, ProductKind, ProductPatch};
pub use revenue::{Revenue, RevenuePatch};
pub use transaction::{Transaction, TransactionKind, TransactionPatch};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Backend-agnostic field map (canonical snake_case keys)
pub type Fields = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Goal,
    Product,
    Revenue,
    Expense,
    Transaction,
    Dream,
    Bet,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Goal,
        EntityKind::Product,
        EntityKind::Revenue,
        EntityKind::Expense,
        EntityKind::Transaction,
        EntityKind::Dream,
        EntityKind::Bet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Goal => "goal",
            EntityKind::Product => "product",
            EntityKind::Revenue => "revenue",
            EntityKind::Expense => "expense",
            EntityKind::Transaction => "transaction",
            EntityKind::Dream => "dream",
            EntityKind::Bet => "bet",
        }
    }

    /// Table / collection name used by the stores
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Goal => "goals",
            EntityKind::Product => "products",
            EntityKind::Revenue => "revenues",
            EntityKind::Expense => "expenses",
            EntityKind::Transaction => "transactions",
            EntityKind::Dream => "dreams",
            EntityKind::Bet => "bets",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SyncError;

    /// Accepts the singular name or the collection name, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == lower || kind.collection() == lower)
            .ok_or_else(|| SyncError::UnsupportedEntity(s.to_string()))
    }
}

// ============================================================================
// FIELD VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn required(field: &str) -> Self {
        FieldError::new(field, "Required field is empty")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collects field errors for one record
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Checks::default()
    }

    pub fn non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(FieldError::required(field));
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value <= 0.0 {
            self.errors
                .push(FieldError::new(field, "must be greater than 0"));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value < 0.0 {
            self.errors.push(FieldError::new(field, "must not be negative"));
        }
        self
    }

    pub fn currency(&mut self, field: &str, value: &str) -> &mut Self {
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            self.errors
                .push(FieldError::new(field, "must be a 3-letter currency code"));
        }
        self
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}

// ============================================================================
// ENTITY ADAPTER
// ============================================================================

/// Per-entity adapter: kind tag, validation, and mapping to backend fields.
///
/// Records and patches serialize with snake_case keys; backends apply their
/// own naming on top. Patch fields left as `None` are omitted entirely.
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    type Patch: Serialize + DeserializeOwned + Clone + Default + fmt::Debug + Send + Sync + 'static;

    const KIND: EntityKind;

    /// Required-field and range checks for a full record
    fn validate(&self) -> Result<(), Vec<FieldError>>;

    /// Range checks for the fields a patch carries
    fn validate_patch(patch: &Self::Patch) -> Result<(), Vec<FieldError>>;

    fn to_fields(&self) -> Result<Fields, SyncError> {
        to_field_map(Self::KIND, self)
    }

    fn patch_fields(patch: &Self::Patch) -> Result<Fields, SyncError> {
        let fields = to_field_map(Self::KIND, patch)?;
        if fields.is_empty() {
            return Err(SyncError::EmptyPatch(Self::KIND.to_string()));
        }
        Ok(fields)
    }

    fn from_fields(fields: Fields) -> Result<Self, SyncError> {
        serde_json::from_value(serde_json::Value::Object(fields)).map_err(|e| {
            SyncError::MalformedPayload {
                kind: Self::KIND.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

fn to_field_map<T: Serialize>(kind: EntityKind, value: &T) -> Result<Fields, SyncError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(SyncError::MalformedPayload {
            kind: kind.to_string(),
            reason: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(SyncError::MalformedPayload {
            kind: kind.to_string(),
            reason: e.to_string(),
        }),
    }
}
