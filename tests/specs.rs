// SPDX-License-Identifier: MIT

//! End-to-end scenarios exercising the public crate APIs across crate
//! boundaries, mirroring the pipeline's six canonical test scenarios.

use s2p_adapters::{FakePlexClient, FakeStashClient, PlexClient, PlexPart};
use s2p_core::{
    BreakerStateKind, ErrorKind, GapKind, Job, ReconciliationScope, SceneId, ScenePayload, UpdateKind,
};
use s2p_engine::{
    reconciliation, BreakerConfig, CircuitBreaker, JobOutcome, OutageHistory, PendingSet, ReconciliationConfig,
    RecoveryScheduler, StatsStore, SyncTimestamps, TickOutcome, Worker, WorkerConfig,
};
use s2p_storage::{DlqStore, DurableQueue};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir") }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn worker(&self, plex: Arc<FakePlexClient>, config: WorkerConfig, now: u64) -> Worker<FakePlexClient> {
        let queue = DurableQueue::open(&self.path("queue.jsonl")).expect("queue");
        let dlq = DlqStore::open(&self.path("dlq.jsonl")).expect("dlq");
        let breaker = CircuitBreaker::load(&self.path("breaker.json"), BreakerConfig::default()).expect("breaker");
        let outage_history = OutageHistory::load(&self.path("outage_history.json")).expect("outage history");
        let recovery_scheduler =
            RecoveryScheduler::load(&self.path("recovery.json"), Duration::from_secs(60)).expect("recovery scheduler");
        let stats = StatsStore::load(&self.path("stats.json")).expect("stats");
        let sync_timestamps = SyncTimestamps::load(&self.path("sync_timestamps.json")).expect("sync timestamps");
        Worker::new(plex, queue, dlq, breaker, outage_history, recovery_scheduler, stats, sync_timestamps, config, now)
    }
}

fn scene(id: i64) -> SceneId {
    SceneId::new(id).expect("valid scene id")
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        library_sections: vec!["Movies".to_string()],
        poll_interval: Duration::ZERO,
        ..WorkerConfig::default()
    }
}

/// E1 — happy path: a job whose path exactly matches one Plex part is
/// written and acked, `syncTimestamps` records the sync, stats record one
/// success, the queue ends empty, and the breaker stays closed.
#[tokio::test]
async fn e1_happy_path_writes_and_acks() {
    let harness = Harness::new();
    let plex = Arc::new(FakePlexClient::new());
    plex.seed_part(PlexPart {
        rating_key: "1000".to_string(),
        library_section: "Movies".to_string(),
        file_path: "/m/a.mp4".to_string(),
    })
    .await;

    {
        let mut queue = DurableQueue::open(&harness.path("queue.jsonl")).expect("queue");
        let payload = ScenePayload {
            title: Some("T".to_string()),
            studio: Some("S".to_string()),
            path: Some("/m/a.mp4".to_string()),
            ..ScenePayload::default()
        };
        let job = Job::new(scene(100), UpdateKind::Metadata, payload, 1_000).expect("job");
        queue.enqueue(job, 1_000).expect("enqueue");
    }

    let mut worker = harness.worker(plex.clone(), worker_config(), 1_000);
    let outcome = worker.tick(1_000).await.expect("tick");
    assert!(matches!(outcome, TickOutcome::Processed { outcome: JobOutcome::Success, .. }));

    let fields = plex.get_current_fields("1000").await.expect("fields");
    assert_eq!(fields.title.as_deref(), Some("T"));
    assert_eq!(fields.studio.as_deref(), Some("S"));

    assert_eq!(worker.queue_stats().pending, 0);
    assert_eq!(worker.queue_stats().completed, 1);
    assert_eq!(worker.dlq_count(), 0);

    let idle = worker.tick(1_000).await.expect("tick");
    assert_eq!(idle, TickOutcome::Idle);

    let breaker_state = s2p_storage::read_json::<s2p_core::BreakerState>(&harness.path("breaker.json"))
        .expect("read breaker state")
        .unwrap_or_default();
    assert_eq!(breaker_state.state, BreakerStateKind::Closed);
}

/// E2 — Plex goes down for five consecutive jobs, the breaker opens and
/// records an outage, then a health probe after the recovery timeout
/// closes the breaker and ends the outage record.
#[tokio::test]
async fn e2_outage_then_recovery_closes_breaker() {
    let harness = Harness::new();
    let breaker_path = harness.path("breaker.json");
    let outage_path = harness.path("outage_history.json");
    let recovery_path = harness.path("recovery.json");

    let mut breaker = CircuitBreaker::load(&breaker_path, BreakerConfig::default()).expect("breaker");
    let mut outage_history = OutageHistory::load(&outage_path).expect("outage history");
    let t0 = 1_000u64;
    for _ in 0..5 {
        breaker.record_failure(t0, ErrorKind::ServerDown, &mut outage_history).expect("record failure");
    }
    assert_eq!(breaker.state().state, BreakerStateKind::Open);
    assert_eq!(outage_history.records().len(), 1);
    assert_eq!(outage_history.records()[0].started_at, t0);
    assert!(outage_history.records()[0].ended_at.is_none());

    // Recovery timeout is 60s; the next `can_execute` check after that
    // lazily transitions OPEN -> HALF_OPEN.
    assert!(!breaker.can_execute(t0 + 60).expect("can_execute"));
    assert_eq!(breaker.state().state, BreakerStateKind::HalfOpen);

    let mut recovery_scheduler = RecoveryScheduler::load(&recovery_path, Duration::from_secs(60)).expect("recovery scheduler");
    recovery_scheduler
        .record_health_check(t0 + 65, true, None, &mut breaker, &mut outage_history)
        .expect("record health check");

    assert_eq!(breaker.state().state, BreakerStateKind::Closed);
    assert_eq!(recovery_scheduler.state().recovery_count, 1);
    let record = &outage_history.records()[0];
    assert_eq!(record.ended_at, Some(t0 + 65));
    assert_eq!(record.duration_sec, Some(65));
}

/// E3 — a metadata job with no `payload.path` is a permanent validation
/// error at construction time, never reaching the queue at all; this is
/// the scenario's invariant as enforced by `Job::new` itself.
#[test]
fn e3_metadata_job_without_path_is_rejected_before_it_can_be_enqueued() {
    let payload = ScenePayload::default();
    let err = Job::new(scene(7), UpdateKind::Metadata, payload, 1_000).unwrap_err();
    assert_eq!(err, s2p_core::JobValidationError::MissingPath);
}

/// E3b — a job that fails during matching because Plex reports no
/// candidate at all is dead-lettered with a `NotFound`-derived kind and
/// the queue ends empty, leaving the breaker untouched (a not-found is
/// not a Plex-availability signal).
#[tokio::test]
async fn e3_unmatched_path_is_dead_lettered_after_retries_exhausted() {
    let harness = Harness::new();
    let plex = Arc::new(FakePlexClient::new());
    // No parts seeded: every match attempt reports not-found.

    {
        let mut queue = DurableQueue::open(&harness.path("queue.jsonl")).expect("queue");
        let payload = ScenePayload {
            path: Some("/m/missing.mp4".to_string()),
            ..ScenePayload::default()
        };
        let job = Job::new(scene(55), UpdateKind::Metadata, payload, 1_000).expect("job");
        queue.enqueue(job, 1_000).expect("enqueue");
    }

    let config = WorkerConfig {
        max_retries_override: Some(1),
        ..worker_config()
    };
    let mut worker = harness.worker(plex, config, 1_000);
    let first = worker.tick(1_000).await.expect("tick");
    assert!(matches!(
        first,
        TickOutcome::Processed { outcome: JobOutcome::Dlq { error_kind: ErrorKind::NotFound }, .. }
    ));
    assert_eq!(worker.queue_stats().pending, 0);
    assert_eq!(worker.dlq_count(), 1);
}

/// E4 — infinite-requeue regression: a scene already recorded as synced
/// at `syncTimestamps[scene] >= stashScene.updatedAt` must be skipped by
/// reconciliation even though Plex still looks empty for it, and this
/// guard must hold regardless of how much wall-clock time has passed.
#[tokio::test]
async fn e4_already_synced_scene_is_never_requeued_by_reconciliation() {
    let harness = Harness::new();
    let stash = FakeStashClient::new();
    let plex = FakePlexClient::new();

    let scene_id = scene(42);
    let t0 = 1_000i64;
    stash
        .seed(s2p_adapters::StashScene {
            scene_id,
            updated_at: t0,
            payload: ScenePayload {
                path: Some("/m/forty-two.mp4".to_string()),
                title: Some("Forty Two".to_string()),
                ..ScenePayload::default()
            },
        })
        .await;
    // Plex reports nothing for this scene's section at all: looks like an
    // "empty in Plex" gap unless the sync-timestamp guard intervenes.

    let mut queue = DurableQueue::open(&harness.path("queue.jsonl")).expect("queue");
    let mut sync_timestamps = SyncTimestamps::load(&harness.path("sync_timestamps.json")).expect("sync timestamps");
    sync_timestamps.record(scene_id, t0).expect("record sync");

    let recon_config = ReconciliationConfig {
        library_sections: vec!["Movies".to_string()],
        ..ReconciliationConfig::default()
    };

    // 25 hours later: well outside any plausible hook-dedup window, proving
    // the guard is persistent rather than time-boxed.
    let now = (t0 as u64) + 25 * 3_600;
    let outcome = reconciliation::run(
        &stash,
        &plex,
        &mut queue,
        &sync_timestamps,
        &recon_config,
        ReconciliationScope::All,
        now,
    )
    .await
    .expect("reconciliation run");

    assert_eq!(outcome.enqueued, 0);
    assert_eq!(outcome.skipped_already_synced, 1);
    assert_eq!(queue.stats().pending, 0);
    assert!(outcome.gaps_by_kind.get(&GapKind::EmptyInPlex).is_none());
}

/// E5 — strict matching on an ambiguous (two same-filename, different
/// directory) match dead-letters the job as permanent; strict matching off
/// leaves the row acked with no write and no candidate picked.
#[tokio::test]
async fn e5_ambiguous_match_strict_vs_lenient() {
    for strict in [true, false] {
        let harness = Harness::new();
        let plex = Arc::new(FakePlexClient::new());
        plex.seed_part(PlexPart {
            rating_key: "1".to_string(),
            library_section: "Movies".to_string(),
            file_path: "/m/one/scene.mp4".to_string(),
        })
        .await;
        plex.seed_part(PlexPart {
            rating_key: "2".to_string(),
            library_section: "Movies".to_string(),
            file_path: "/m/two/scene.mp4".to_string(),
        })
        .await;

        {
            let mut queue = DurableQueue::open(&harness.path("queue.jsonl")).expect("queue");
            let payload = ScenePayload {
                path: Some("/m/elsewhere/scene.mp4".to_string()),
                ..ScenePayload::default()
            };
            let job = Job::new(scene(9), UpdateKind::Metadata, payload, 1_000).expect("job");
            queue.enqueue(job, 1_000).expect("enqueue");
        }

        let config = WorkerConfig {
            strict_matching: strict,
            max_retries_override: Some(1),
            ..worker_config()
        };
        let mut worker = harness.worker(plex.clone(), config, 1_000);
        let outcome = worker.tick(1_000).await.expect("tick");

        if strict {
            assert!(matches!(
                outcome,
                TickOutcome::Processed { outcome: JobOutcome::Dlq { error_kind: ErrorKind::Permanent }, .. }
            ));
            assert_eq!(worker.dlq_count(), 1);
        } else {
            assert!(matches!(
                outcome,
                TickOutcome::Processed { outcome: JobOutcome::SkippedAmbiguous, .. }
            ));
            assert_eq!(worker.dlq_count(), 0);
        }
        assert_eq!(worker.queue_stats().pending, 0);
        assert!(plex.calls().await.iter().all(|c| !matches!(c, s2p_adapters::plex::fake::PlexCall::ApplyEdit(..))));
    }
}

/// E6 — orphaned outage display: the breaker reports closed but history
/// still has a record with no `endedAt`; the report must surface it as
/// resolved without mutating the on-disk record.
#[test]
fn e6_orphaned_outage_record_is_reported_without_mutation() {
    let harness = Harness::new();
    let outage_path = harness.path("outage_history.json");

    {
        let mut history = OutageHistory::load(&outage_path).expect("outage history");
        history.open(1_000, ErrorKind::ServerDown).expect("open record");
        // Deliberately never closed — the breaker's own state file below
        // claims CLOSED independently, simulating the two stores drifting
        // out of sync across process restarts.
    }

    let history = OutageHistory::load(&outage_path).expect("reopen outage history");
    let orphaned = history.orphaned(true);
    assert_eq!(orphaned.len(), 1);
    assert!(orphaned[0].ended_at.is_none());

    // Re-reading the file after computing `orphaned` proves the read was
    // non-mutating: a second load sees an identical, still-open record.
    let reloaded = OutageHistory::load(&outage_path).expect("reload outage history");
    assert_eq!(reloaded.records(), history.records());
    assert!(reloaded.records()[0].ended_at.is_none());

    // A closed breaker plus no open records at all would report nothing
    // orphaned — confirming `orphaned` is reading real state, not always
    // reporting true.
    assert!(history.orphaned(false).is_empty());
}

/// Hook dedup: rebuilding the pending set from a queue that already has a
/// pending row for a scene correctly reports it as pending, which is what
/// stops a hook handler from double-enqueueing on a rapid-fire edit.
#[test]
fn pending_set_rebuild_prevents_duplicate_hook_enqueue() {
    let harness = Harness::new();
    let mut queue = DurableQueue::open(&harness.path("queue.jsonl")).expect("queue");
    let payload = ScenePayload {
        path: Some("/m/dup.mp4".to_string()),
        ..ScenePayload::default()
    };
    let job = Job::new(scene(3), UpdateKind::Metadata, payload, 1_000).expect("job");
    queue.enqueue(job, 1_000).expect("enqueue");

    let pending = PendingSet::rebuild(&queue, 1_000);
    assert!(pending.contains(scene(3)));
    assert!(!pending.contains(scene(4)));
}
