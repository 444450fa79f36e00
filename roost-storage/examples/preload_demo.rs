//! Preload Demo
//!
//! Simulates a returning user whose workspaces live in the legacy key-value
//! store. The controller probes both stores, downloads a backup into
//! `./roost-backups`, migrates the workspace and starts a host on the
//! structured store.
//!
//! # Run Example
//!
//! ```bash
//! RUST_LOG=roost_storage=debug cargo run -p roost-storage --example preload_demo
//! ```
//!
//! Test overrides can be tried through the launch URL:
//!
//! ```bash
//! ROOST_LAUNCH_URL='http://127.0.0.1:8080/#e2e_testmigration_fallback=true' \
//!   cargo run -p roost-storage --example preload_demo
//! ```

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use roost_storage::constants::BACKUP_PROMPT_MESSAGE;
use roost_storage::migration::DirectorySink;
use roost_storage::preload::{
    BackupChoice, BackupPrompt, EnvironmentOverrides, Host, PreloadOutcome, Preloader,
};
use roost_storage::telemetry::{init_logging, TracingTelemetry};
use roost_storage::{Backend, KeyValueBackend, StorageConfig, StorageEnvironment};

struct PrintingHost;

#[async_trait]
impl Host for PrintingHost {
    async fn start(&self, backend: Arc<dyn Backend>) -> anyhow::Result<()> {
        let workspaces = backend.workspaces().await?;
        println!("host started on {} with workspaces {workspaces:?}", backend.name());
        Ok(())
    }
}

/// Shows the prompt text and always asks for a backup.
struct ConsolePrompt;

#[async_trait]
impl BackupPrompt for ConsolePrompt {
    async fn choose(&self) -> BackupChoice {
        println!("{BACKUP_PROMPT_MESSAGE}");
        println!("> download backup");
        BackupChoice::DownloadBackup
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(None)?;

    let config = StorageConfig::from_env();
    let env = config.environment().build();

    let legacy = KeyValueBackend::new(&env);
    anyhow::ensure!(legacy.probe().await, "key-value storage unavailable");
    legacy
        .write(".workspaces/default_workspace/contracts/1_Storage.sol", b"contract Storage {}\n")
        .await
        .context("seeding legacy workspace")?;
    println!("legacy workspaces: {:?}", legacy.workspaces().await?);

    let sink = Arc::new(DirectorySink::new("roost-backups"));
    let overrides = EnvironmentOverrides::from_env(&config.override_gate);
    let mut preloader = Preloader::from_config(&config, &env, sink, Arc::new(TracingTelemetry))
        .with_overrides(overrides);

    match preloader.run(&ConsolePrompt, &PrintingHost).await {
        PreloadOutcome::Ready { backend } => println!("ready on {backend}"),
        PreloadOutcome::Unsupported { message } => println!("{message}"),
        PreloadOutcome::Failed { message, error } => {
            anyhow::bail!("{message}\n{error}")
        }
    }

    if let Some(report) = preloader.report() {
        println!("probe report: {report:?}");
    }
    Ok(())
}
