// Finance Sync - Core Library
// Dual-write synchronization of personal-finance records across two stores.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod api;
pub mod backend;
pub mod config;
pub mod entities;
pub mod error;
#[cfg(feature = "server")]
pub mod server;
pub mod sync;
pub mod telemetry;

// Re-export commonly used types
pub use backend::{
    connect, Backend, DocumentBackend, MemoryBackend, RemoteBackend, SqliteBackend, TenantId,
};
pub use config::{AppConfig, BackendConfig};
pub use entities::{
    Bet, BetStatus, Dream, Entity, EntityKind, Expense, Fields, Goal, Product, ProductKind,
    Revenue, Transaction, TransactionKind,
};
pub use error::{BackendError, FailureKind, SyncError};
pub use sync::{
    BackendOutcome, CompensationReport, DualWriteCoordinator, OperationKind, RecordRef, Slot,
    SyncOperation, SyncOutcome, SyncPolicy,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
