// Finance Sync - Web Server
// REST API over the dual-write coordinator and both stores

use anyhow::{Context, Result};
use std::path::PathBuf;

use finance_sync::server::{router, AppState};
use finance_sync::telemetry::init_tracing;
use finance_sync::{connect, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    init_tracing("info", config.log_json);

    println!("🌐 Finance Sync - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let a = connect(&config.backend_a)?;
    let b = connect(&config.backend_b)?;
    println!("✓ Store A: {}", a.name());
    println!("✓ Store B: {}", b.name());
    println!(
        "✓ Policy: primary={}, rollback={}, fail_fast_primary={}, fail_fast_secondary={}",
        config.policy.primary,
        config.policy.rollback_on_partial_failure,
        config.policy.fail_fast_on_primary_error,
        config.policy.fail_fast_on_secondary_error,
    );

    let app = router(AppState::new(a, b, config.policy.clone())?);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    println!("\n🚀 Server running on http://{}", config.listen_addr);
    println!("   Sync:   POST http://{}/api/sync/goals", config.listen_addr);
    println!("   Stores: GET  http://{}/api/stores/<store>/<entity>/<id>", config.listen_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
