use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use finance_sync::telemetry::init_tracing;
use finance_sync::{
    connect, AppConfig, DualWriteCoordinator, EntityKind, OperationKind, RecordRef, Slot,
    TenantId,
};

/// Mirror finance records into both stores from the command line
#[derive(Parser)]
#[command(name = "finance-sync", version)]
struct Cli {
    /// JSON config file (FINANCE_SYNC_* env vars override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tenant the records belong to
    #[arg(long, global = true)]
    tenant: Option<String>,

    #[command(flatten)]
    policy: PolicyFlags,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PolicyFlags {
    /// Undo a one-sided create with a compensating delete
    #[arg(long, global = true)]
    rollback: bool,

    /// Stop a create when the primary store fails
    #[arg(long, global = true)]
    fail_fast_primary: bool,

    /// Report a create as failed when the secondary store fails
    #[arg(long, global = true)]
    fail_fast_secondary: bool,

    /// Store attempted first (a or b)
    #[arg(long, global = true)]
    primary: Option<Slot>,

    /// Write both stores at the same time
    #[arg(long, global = true)]
    concurrent: bool,
}

#[derive(Args)]
struct Target {
    /// Id valid in both stores
    #[arg(long, conflicts_with_all = ["id_a", "id_b"])]
    id: Option<String>,

    /// Id in store A only
    #[arg(long)]
    id_a: Option<String>,

    /// Id in store B only
    #[arg(long)]
    id_b: Option<String>,
}

impl Target {
    fn record_ref(&self) -> RecordRef {
        match &self.id {
            Some(id) => RecordRef::shared(id),
            None => RecordRef::per_backend(self.id_a.as_deref(), self.id_b.as_deref()),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a record in both stores
    Create {
        entity: String,
        /// Record as JSON, or @path to a JSON file
        payload: String,
    },
    /// Patch a record in both stores
    Update {
        entity: String,
        #[command(flatten)]
        target: Target,
        /// Patch as JSON, or @path to a JSON file
        payload: String,
    },
    /// Delete a record from both stores
    Delete {
        entity: String,
        #[command(flatten)]
        target: Target,
    },
    /// Read a record back from both stores
    Show {
        entity: String,
        #[command(flatten)]
        target: Target,
    },
}

fn read_payload(arg: &str) -> Result<serde_json::Value> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).context("Payload is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    init_tracing("warn", config.log_json);

    if let Some(tenant) = &cli.tenant {
        config.tenant = tenant.clone();
    }
    let flags = &cli.policy;
    config.policy.rollback_on_partial_failure |= flags.rollback;
    config.policy.fail_fast_on_primary_error |= flags.fail_fast_primary;
    config.policy.fail_fast_on_secondary_error |= flags.fail_fast_secondary;
    config.policy.concurrent |= flags.concurrent;
    if let Some(primary) = flags.primary {
        config.policy.primary = primary;
    }

    let a = connect(&config.backend_a)?;
    let b = connect(&config.backend_b)?;
    let coordinator = DualWriteCoordinator::new(
        TenantId::new(config.tenant.clone()),
        a,
        b,
        config.policy.clone(),
    );

    let outcome = match &cli.command {
        Command::Create { entity, payload } => {
            coordinator
                .execute_json(entity, OperationKind::Create, None, read_payload(payload)?)
                .await?
        }
        Command::Update {
            entity,
            target,
            payload,
        } => {
            coordinator
                .execute_json(
                    entity,
                    OperationKind::Update,
                    Some(target.record_ref()),
                    read_payload(payload)?,
                )
                .await?
        }
        Command::Delete { entity, target } => {
            coordinator
                .execute_json(
                    entity,
                    OperationKind::Delete,
                    Some(target.record_ref()),
                    serde_json::Value::Null,
                )
                .await?
        }
        Command::Show { entity, target } => {
            let kind: EntityKind = entity.parse()?;
            let target = target.record_ref();
            let mut shown = serde_json::Map::new();
            for slot in [Slot::A, Slot::B] {
                let value = match target.get(slot) {
                    Some(id) => match coordinator.backend(slot).get(kind, coordinator.tenant(), id).await {
                        Ok(Some(fields)) => serde_json::Value::Object(fields),
                        Ok(None) => serde_json::Value::Null,
                        Err(e) => serde_json::json!({ "error": e.to_string() }),
                    },
                    None => serde_json::Value::Null,
                };
                shown.insert(slot.as_str().to_string(), value);
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.overall_success {
        eprintln!("❌ {}", outcome.summary());
        std::process::exit(2);
    }

    Ok(())
}
