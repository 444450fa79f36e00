//! DST: Preload Scenarios
//!
//! End-to-end runs of the decision controller over simulated storage:
//! fresh installs, legacy migration, overrides and missing storage.

mod common;

use std::sync::Arc;

use common::{seed_legacy, seed_preferred, snapshot, CountingPrompt, RecordingHost};
use roost_core::dst::{SimConfig, Simulation};
use roost_storage::constants::{KEY_VALUE_BACKEND_NAME, STRUCTURED_BACKEND_NAME, UNSUPPORTED_MESSAGE};
use roost_storage::migration::MemorySink;
use roost_storage::preload::{BackupChoice, EnvironmentOverrides, PreloadOutcome, PreloadState, Preloader};
use roost_storage::storage::Backend;
use roost_storage::telemetry::{EventCategory, RecordingTelemetry, StorageEvent};
use roost_storage::{ApiSupport, OverrideGate, StorageConfig, StorageEnvironment};

fn preloader(
    env: &StorageEnvironment,
    sink: Arc<MemorySink>,
    telemetry: Arc<RecordingTelemetry>,
) -> Preloader {
    Preloader::from_config(&StorageConfig::default(), env, sink, telemetry)
}

/// Scenario A: legacy has a workspace, preferred is empty. The user is asked
/// once, skips the backup, and the preferred backend comes up with the data.
#[tokio::test]
async fn test_dst_legacy_workspace_migrates_to_preferred() {
    Simulation::new(SimConfig::with_seed(42))
        .run(|sim| async move {
            let env = StorageEnvironment::from_simulation(&sim);
            seed_legacy(&env, "W").await;

            let sink = Arc::new(MemorySink::new());
            let telemetry = Arc::new(RecordingTelemetry::new());
            let mut preloader = preloader(&env, Arc::clone(&sink), Arc::clone(&telemetry));
            let prompt = CountingPrompt::new(BackupChoice::SkipBackup);
            let host = RecordingHost::default();

            let outcome = preloader.run(&prompt, &host).await;

            assert_eq!(
                outcome,
                PreloadOutcome::Ready {
                    backend: STRUCTURED_BACKEND_NAME.into()
                }
            );
            assert_eq!(prompt.asked(), 1);
            assert_eq!(host.starts(), 1);
            assert!(sink.deliveries().is_empty(), "backup was skipped");

            let active = host.backend().unwrap();
            assert_eq!(active.workspaces().await?, vec!["W"]);
            assert_eq!(active.read(".workspaces/W/README.txt").await?, b"hello");
            assert!(telemetry.contains(&StorageEvent::MigrationResult { success: true }));
            assert_eq!(telemetry.count(EventCategory::Migrate), 1);
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap();
}

/// Scenario B: the preferred backend is forced off. No prompt, no migration,
/// the legacy backend is handed over with its workspace intact.
#[tokio::test]
async fn test_dst_fallback_override_selects_legacy() {
    let env = StorageEnvironment::in_memory();
    let legacy = seed_legacy(&env, "W").await;
    let before = snapshot(&legacy).await;

    let telemetry = Arc::new(RecordingTelemetry::new());
    let overrides = EnvironmentOverrides::from_launch_url(
        "http://127.0.0.1:8080/#e2e_testmigration_fallback=true",
        &OverrideGate::default(),
    );
    let mut preloader =
        preloader(&env, Arc::new(MemorySink::new()), Arc::clone(&telemetry)).with_overrides(overrides);
    let prompt = CountingPrompt::new(BackupChoice::DownloadBackup);
    let host = RecordingHost::default();

    let outcome = preloader.run(&prompt, &host).await;

    assert_eq!(
        outcome,
        PreloadOutcome::Ready {
            backend: KEY_VALUE_BACKEND_NAME.into()
        }
    );
    assert_eq!(prompt.asked(), 0);
    assert_eq!(telemetry.count(EventCategory::Migrate), 0);
    assert_eq!(snapshot(host.backend().unwrap().as_ref()).await, before);

    let preferred = preloader.registry().get(STRUCTURED_BACKEND_NAME).unwrap();
    assert!(!preferred.has_workspace().await.unwrap());
}

/// Scenario C: every slot is forced off. Nothing reaches the host.
#[tokio::test]
async fn test_dst_block_storage_is_unsupported() {
    let env = StorageEnvironment::in_memory();
    seed_legacy(&env, "W").await;

    let telemetry = Arc::new(RecordingTelemetry::new());
    let overrides = EnvironmentOverrides::from_launch_url(
        "http://127.0.0.1:8080/#e2e_testblock_storage=true",
        &OverrideGate::default(),
    );
    let mut preloader =
        preloader(&env, Arc::new(MemorySink::new()), Arc::clone(&telemetry)).with_overrides(overrides);
    let prompt = CountingPrompt::new(BackupChoice::SkipBackup);
    let host = RecordingHost::default();

    let outcome = preloader.run(&prompt, &host).await;

    assert_eq!(
        outcome,
        PreloadOutcome::Unsupported {
            message: UNSUPPORTED_MESSAGE
        }
    );
    assert_eq!(preloader.state(), PreloadState::Unsupported);
    assert_eq!(prompt.asked(), 0);
    assert_eq!(host.starts(), 0);
    assert!(telemetry.contains(&StorageEvent::NoSupportedStorage));
}

#[tokio::test]
async fn test_dst_preferred_with_workspace_never_prompts() {
    let env = StorageEnvironment::in_memory();
    seed_legacy(&env, "old").await;
    seed_preferred(&env, "current").await;

    let mut preloader = preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    );
    let prompt = CountingPrompt::new(BackupChoice::SkipBackup);
    let host = RecordingHost::default();

    preloader.run(&prompt, &host).await;

    assert_eq!(prompt.asked(), 0);
    let active = host.backend().unwrap();
    assert_eq!(active.name(), STRUCTURED_BACKEND_NAME);
    assert_eq!(active.workspaces().await.unwrap(), vec!["current"]);
}

#[tokio::test]
async fn test_dst_only_legacy_available() {
    let env = StorageEnvironment::builder()
        .structured(ApiSupport::Missing)
        .build();
    seed_legacy(&env, "W").await;

    let telemetry = Arc::new(RecordingTelemetry::new());
    let mut preloader = preloader(&env, Arc::new(MemorySink::new()), Arc::clone(&telemetry));
    let prompt = CountingPrompt::new(BackupChoice::SkipBackup);
    let host = RecordingHost::default();

    let outcome = preloader.run(&prompt, &host).await;

    assert_eq!(
        outcome,
        PreloadOutcome::Ready {
            backend: KEY_VALUE_BACKEND_NAME.into()
        }
    );
    assert_eq!(prompt.asked(), 0);
    assert!(telemetry.contains(&StorageEvent::BackendUnsupported {
        backend: STRUCTURED_BACKEND_NAME.into()
    }));
}

#[tokio::test]
async fn test_dst_empty_workspace_does_not_prompt() {
    let env = StorageEnvironment::in_memory();
    let legacy = roost_storage::KeyValueBackend::new(&env);
    assert!(legacy.probe().await);
    legacy.create_dir(".workspaces/empty").await.unwrap();

    let mut preloader = preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    );
    let prompt = CountingPrompt::new(BackupChoice::SkipBackup);

    preloader.run(&prompt, &RecordingHost::default()).await;

    assert_eq!(prompt.asked(), 0);
    assert_eq!(preloader.report().map(|r| r.legacy_has_workspace), Some(false));
}

#[tokio::test]
async fn test_dst_migration_test_override_seeds_and_migrates() {
    let env = StorageEnvironment::in_memory();
    let overrides = EnvironmentOverrides::from_launch_url(
        "http://127.0.0.1:8080/#e2e_testmigration=true",
        &OverrideGate::default(),
    );
    let sink = Arc::new(MemorySink::new());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let mut preloader = preloader(&env, Arc::clone(&sink), Arc::clone(&telemetry))
        .with_overrides(overrides);
    let prompt = CountingPrompt::new(BackupChoice::DownloadBackup);
    let host = RecordingHost::default();

    preloader.run(&prompt, &host).await;

    assert!(preloader.report().unwrap().seeded);
    assert_eq!(prompt.asked(), 1);
    assert_eq!(sink.deliveries().len(), 1);
    assert_eq!(telemetry.count(EventCategory::Migrate), 1);
    let active = host.backend().unwrap();
    assert_eq!(active.name(), STRUCTURED_BACKEND_NAME);
    assert_eq!(active.workspaces().await.unwrap(), vec!["workspace_test"]);
    assert_eq!(
        active
            .read(".workspaces/workspace_test/.deps/remix-tests/remix_accounts.sol")
            .await
            .unwrap(),
        b"library TestsAccounts {}\n"
    );
}

#[tokio::test]
async fn test_dst_gate_mismatch_ignores_overrides() {
    let env = StorageEnvironment::in_memory();
    seed_legacy(&env, "W").await;

    let overrides = EnvironmentOverrides::from_launch_url(
        "https://remix.example.org/#e2e_testblock_storage=true",
        &OverrideGate::default(),
    );
    assert_eq!(overrides, EnvironmentOverrides::none());

    let mut preloader = preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .with_overrides(overrides);
    let host = RecordingHost::default();

    let outcome = preloader
        .run(&CountingPrompt::new(BackupChoice::SkipBackup), &host)
        .await;

    assert!(matches!(outcome, PreloadOutcome::Ready { .. }));
    assert_eq!(host.starts(), 1);
}

#[tokio::test]
async fn test_dst_custom_gate_honours_overrides() {
    let gate = OverrideGate::new("http", "localhost", 3000);
    let overrides =
        EnvironmentOverrides::from_launch_url("http://localhost:3000/#e2e_testblock_storage=true", &gate);
    assert!(overrides.block_storage);

    let env = StorageEnvironment::in_memory();
    let mut preloader = preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .with_overrides(overrides);

    let outcome = preloader
        .run(&BackupChoice::SkipBackup, &RecordingHost::default())
        .await;
    assert!(matches!(outcome, PreloadOutcome::Unsupported { .. }));
}

#[tokio::test]
async fn test_dst_host_started_once_across_reruns() {
    let env = StorageEnvironment::in_memory();
    seed_legacy(&env, "W").await;

    let mut preloader = preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    );
    let prompt = CountingPrompt::new(BackupChoice::DownloadBackup);
    let host = RecordingHost::default();

    preloader.run(&prompt, &host).await;
    let again = preloader.run(&prompt, &host).await;

    assert!(matches!(again, PreloadOutcome::Failed { .. }));
    assert_eq!(preloader.state(), PreloadState::Ready);
    assert_eq!(prompt.asked(), 1);
    assert_eq!(host.starts(), 1);
}

#[tokio::test]
async fn test_dst_second_session_finds_migrated_data() {
    let env = StorageEnvironment::in_memory();
    seed_legacy(&env, "W").await;

    let first = CountingPrompt::new(BackupChoice::SkipBackup);
    preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .run(&first, &RecordingHost::default())
    .await;
    assert_eq!(first.asked(), 1);

    let second = CountingPrompt::new(BackupChoice::SkipBackup);
    let host = RecordingHost::default();
    preloader(
        &env,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingTelemetry::new()),
    )
    .run(&second, &host)
    .await;

    assert_eq!(second.asked(), 0);
    assert_eq!(host.backend().unwrap().name(), STRUCTURED_BACKEND_NAME);
}
