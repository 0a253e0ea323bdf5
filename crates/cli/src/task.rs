// SPDX-License-Identifier: MIT

//! Dispatch for the thirteen `args.mode` task invocations. Each mode opens
//! only the stores it needs; mutating modes acquire the host-wide worker
//! lock first so they can't race a concurrently running `process_queue`
//! invocation on the same data directory.

use crate::color;
use crate::config::Config;
use crate::device_identity;
use crate::output::format_time_ago;
use crate::paths::DataPaths;
use crate::table::{Column, Table};
use anyhow::{bail, Context};
use s2p_adapters::{HttpPlexClient, HttpStashClient, PlexClient};
use s2p_core::{BreakerState, BreakerStateKind, ReconciliationScope, RecoveryState};
use s2p_engine::{
    reconciliation, BreakerConfig, CircuitBreaker, OutageHistory, ReconciliationConfig,
    ReconciliationScheduler, RecoveryScheduler, StatsStore, SyncTimestamps, TickOutcome, Worker,
    WorkerConfig,
};
use s2p_storage::{read_json, DlqStore, DurableQueue, WorkerLock};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// `RecoveryScheduler`'s check interval is not exposed as a config key;
/// 5s matches the worker's own gate (`!can_execute`) so a probe fires as
/// soon as it's due rather than lagging an arbitrary poll cadence.
const RECOVERY_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub async fn dispatch(mode: &str, config: &Config) -> anyhow::Result<()> {
    let paths = DataPaths::new(config.data_dir.clone());
    match mode {
        "sync_all" => reconcile(config, &paths, ReconciliationScope::All).await,
        "sync_recent" => reconcile(config, &paths, ReconciliationScope::Last24h).await,
        "reconcile_all" => reconcile(config, &paths, ReconciliationScope::All).await,
        "reconcile_recent" => reconcile(config, &paths, ReconciliationScope::Last24h).await,
        "reconcile_7days" => reconcile(config, &paths, ReconciliationScope::Last7Days).await,
        "view_status" => view_status(&paths),
        "outage_summary" => outage_summary(&paths),
        "clear_queue" => clear_queue(&paths),
        "clear_dlq" => clear_dlq(&paths),
        "purge_dlq" => purge_dlq(config, &paths),
        "process_queue" => process_queue(config, &paths).await,
        "recover_outage_jobs" => recover_outage_jobs(&paths),
        "health_check" => health_check(config, &paths).await,
        other => bail!("unknown task mode {other:?}"),
    }
}

fn build_plex(config: &Config, paths: &DataPaths) -> anyhow::Result<HttpPlexClient> {
    let device_id = device_identity::load_or_create(&paths.device_identity()).context("load device identity")?;
    Ok(HttpPlexClient::new(
        config.plex_url.clone(),
        config.plex_token.clone(),
        device_id,
        config.connect_timeout,
        config.read_timeout,
    )?)
}

fn build_stash(config: &Config) -> anyhow::Result<HttpStashClient> {
    Ok(HttpStashClient::new(config.stash_url.clone(), config.stash_api_key.clone())?)
}

async fn reconcile(config: &Config, paths: &DataPaths, scope: ReconciliationScope) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();

    let plex = build_plex(config, paths)?;
    let stash = build_stash(config)?;
    let mut queue = DurableQueue::open(&paths.queue()).context("open queue")?;
    let sync_timestamps = SyncTimestamps::load(&paths.sync_timestamps()).context("load sync timestamps")?;
    let mut scheduler =
        ReconciliationScheduler::load(&paths.reconciliation_state(), config.reconcile_interval, config.reconcile_scope)
            .context("load reconciliation scheduler")?;

    let recon_config = ReconciliationConfig {
        library_sections: config.plex_library.clone(),
        path_rewrite_rules: config.path_rewrites.clone(),
        batch_size: config.reconcile_batch_size,
        reconcile_missing: config.reconcile_missing,
    };

    let outcome = reconciliation::run(&stash, &plex, &mut queue, &sync_timestamps, &recon_config, scope, now).await?;
    let skipped = outcome.skipped_queued + outcome.skipped_no_metadata + outcome.skipped_already_synced;
    scheduler.record_run(now, scope, outcome.scenes_checked, outcome.gaps_by_kind.clone(), outcome.enqueued, skipped)?;

    tracing::info!(
        scenes_checked = outcome.scenes_checked,
        enqueued = outcome.enqueued,
        skipped,
        "reconciliation sweep complete"
    );
    println!(
        "{}: checked {} scenes, enqueued {} repair job(s), skipped {}",
        color::header("reconciliation"),
        outcome.scenes_checked,
        outcome.enqueued,
        skipped
    );
    Ok(())
}

async fn process_queue(config: &Config, paths: &DataPaths) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();

    let plex = Arc::new(build_plex(config, paths)?);
    let queue = DurableQueue::open(&paths.queue()).context("open queue")?;
    let dlq = DlqStore::open(&paths.dlq()).context("open dlq")?;
    let breaker = CircuitBreaker::load(&paths.circuit_breaker(), BreakerConfig::default()).context("load breaker")?;
    let outage_history = OutageHistory::load(&paths.outage_history()).context("load outage history")?;
    let recovery_scheduler =
        RecoveryScheduler::load(&paths.recovery_state(), RECOVERY_CHECK_INTERVAL).context("load recovery scheduler")?;
    let stats = StatsStore::load(&paths.stats()).context("load stats")?;
    let sync_timestamps = SyncTimestamps::load(&paths.sync_timestamps()).context("load sync timestamps")?;

    let worker_config = WorkerConfig {
        library_sections: config.plex_library.clone(),
        path_rewrite_rules: config.path_rewrites.clone(),
        strict_matching: config.strict_matching,
        preserve_plex_edits: config.preserve_plex_edits,
        poll_interval: config.poll_interval,
        max_retries_override: config.max_retries,
        trigger_plex_scan: config.trigger_plex_scan,
        fields: config.fields,
    };

    let mut worker = Worker::new(plex, queue, dlq, breaker, outage_history, recovery_scheduler, stats, sync_timestamps, worker_config, now);

    // A single host-invocation drains whatever is ready and exits; it does
    // not linger as a resident daemon waiting on new rows or retries.
    loop {
        match worker.tick(now_unix()).await? {
            TickOutcome::Idle => break,
            TickOutcome::BreakerOpen { .. } => break,
            TickOutcome::NotReadyYet { .. } => break,
            TickOutcome::Processed { .. } => {}
        }
    }

    let stats = worker.queue_stats();
    println!(
        "{}: {} pending, {} in progress, {} completed, {} failed; {} in dead-letter queue",
        color::header("process_queue"),
        stats.pending,
        stats.in_progress,
        stats.completed,
        stats.failed,
        worker.dlq_count()
    );
    Ok(())
}

fn clear_queue(paths: &DataPaths) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();
    let mut queue = DurableQueue::open(&paths.queue()).context("open queue")?;
    let before = queue.stats();

    // `DurableQueue` has no bulk-clear primitive; draining every pending
    // row through `get_pending`/`fail` (the same terminal transition a
    // permanently-failed job takes) and compacting is the closest fit
    // from its existing API.
    while let Some(row) = queue.get_pending(Duration::from_millis(0), now)? {
        queue.fail(row.job_id)?;
    }
    queue.compact().context("compact queue")?;

    println!("{}: cleared {} pending job(s)", color::header("clear_queue"), before.pending);
    Ok(())
}

fn clear_dlq(paths: &DataPaths) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let mut dlq = DlqStore::open(&paths.dlq()).context("open dlq")?;
    let count = dlq.count();
    dlq.clear()?;
    dlq.compact().context("compact dlq")?;
    println!("{}: cleared {} entries", color::header("clear_dlq"), count);
    Ok(())
}

fn purge_dlq(config: &Config, paths: &DataPaths) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();
    let mut dlq = DlqStore::open(&paths.dlq()).context("open dlq")?;
    let removed = dlq.delete_older_than(now, config.dlq_retention_days.saturating_mul(86_400))?;
    dlq.compact().context("compact dlq")?;
    println!(
        "{}: purged {} entries older than {} day(s)",
        color::header("purge_dlq"),
        removed,
        config.dlq_retention_days
    );
    Ok(())
}

/// Replay every dead-letter entry that failed purely because Plex was
/// down during an outage, not because the job itself is defective — those
/// are the only DLQ entries this mode is safe to resurrect automatically.
fn recover_outage_jobs(paths: &DataPaths) -> anyhow::Result<()> {
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();
    let mut dlq = DlqStore::open(&paths.dlq()).context("open dlq")?;
    let mut queue = DurableQueue::open(&paths.queue()).context("open queue")?;

    let ids: Vec<u64> = dlq.entries_by_error_kind("ServerDown").iter().map(|e| e.id).collect();
    let mut recovered = 0usize;
    for id in ids {
        let job = dlq.replay(id)?;
        queue.enqueue(job, now)?;
        recovered += 1;
    }
    dlq.compact().context("compact dlq")?;

    println!("{}: requeued {} outage-related job(s)", color::header("recover_outage_jobs"), recovered);
    Ok(())
}

/// An on-demand deep probe. Unlike the worker's own gated health check,
/// this bypasses [`RecoveryScheduler`]'s interval and never forwards its
/// result into the breaker — only the worker loop is permitted to mutate
/// breaker state (see [`s2p_engine::circuit_breaker`]'s module doc).
async fn health_check(config: &Config, paths: &DataPaths) -> anyhow::Result<()> {
    let plex = build_plex(config, paths)?;
    let probe = plex.health_probe().await;

    let breaker_state = read_json::<BreakerState>(&paths.circuit_breaker())?.unwrap_or_default();
    let recovery_state = read_json::<RecoveryState>(&paths.recovery_state())?.unwrap_or_default();

    match &probe {
        Ok(()) => println!("{}: Plex reachable ({})", color::status("ok"), config.plex_url),
        Err(e) => println!("{}: Plex unreachable: {e}", color::status("failed")),
    }
    println!(
        "breaker: {:?} ({} consecutive failures, {} consecutive successes)",
        breaker_state.state, breaker_state.consecutive_failures, breaker_state.consecutive_successes
    );
    println!(
        "recovery: {} recoveries so far, last check {}",
        recovery_state.recovery_count,
        format_time_ago(recovery_state.last_check_time)
    );

    if probe.is_err() && breaker_state.state == BreakerStateKind::Closed {
        tracing::warn!("manual health check failed while breaker reports closed; Plex may be newly unreachable");
    }
    Ok(())
}

fn view_status(paths: &DataPaths) -> anyhow::Result<()> {
    let queue = DurableQueue::open(&paths.queue()).context("open queue")?;
    let dlq = DlqStore::open(&paths.dlq()).context("open dlq")?;
    let breaker_state = read_json::<BreakerState>(&paths.circuit_breaker())?.unwrap_or_default();
    let stats = read_json::<s2p_core::Stats>(&paths.stats())?.unwrap_or_default();
    let reconciliation_state = read_json::<s2p_core::ReconciliationState>(&paths.reconciliation_state())?;

    let q = queue.stats();
    println!("{}", color::header("queue"));
    let mut table = Table::new(vec![Column::left("STATE"), Column::right("COUNT")]);
    table.row(vec!["pending".to_string(), q.pending.to_string()]);
    table.row(vec!["in_progress".to_string(), q.in_progress.to_string()]);
    table.row(vec!["completed".to_string(), q.completed.to_string()]);
    table.row(vec!["failed".to_string(), q.failed.to_string()]);
    table.row(vec!["dead_letter".to_string(), dlq.count().to_string()]);
    table.render(&mut std::io::stdout());

    println!();
    println!("{}", color::header("breaker"));
    println!(
        "  state: {}",
        color::status(&format!("{:?}", breaker_state.state).to_lowercase())
    );

    println!();
    println!("{}", color::header("lifetime stats"));
    println!("  success: {}  failure: {}  dlq: {}", stats.success_count, stats.failure_count, stats.dlq_count);

    if let Some(state) = reconciliation_state {
        println!();
        println!(
            "{}: {} ago, scope {}, {} gap(s) found, {} enqueued",
            color::header("last reconciliation"),
            format_time_ago(state.last_run_at),
            state.last_scope,
            state.total_gaps(),
            state.enqueued_count
        );
    }

    Ok(())
}

fn outage_summary(paths: &DataPaths) -> anyhow::Result<()> {
    let breaker_state = read_json::<BreakerState>(&paths.circuit_breaker())?.unwrap_or_default();
    let history = OutageHistory::load(&paths.outage_history()).context("load outage history")?;
    let orphaned = history.orphaned(breaker_state.state == BreakerStateKind::Closed);

    println!(
        "{}: {} (mttr {}, mtbf {})",
        color::header("breaker"),
        color::status(&format!("{:?}", breaker_state.state).to_lowercase()),
        history.mttr().map(|v| format!("{v:.0}s")).unwrap_or_else(|| "n/a".to_string()),
        history.mtbf().map(|v| format!("{v:.0}s")).unwrap_or_else(|| "n/a".to_string()),
    );

    if !orphaned.is_empty() {
        println!(
            "{} {} outage record(s) still open despite a closed breaker — resolved, breaker closed",
            color::status("pending"),
            orphaned.len()
        );
    }

    let mut table = Table::new(vec![
        Column::left("STARTED").with_max(19),
        Column::left("ENDED").with_max(19),
        Column::left("KIND"),
        Column::right("DURATION"),
    ]);
    for record in history.records() {
        table.row(vec![
            record.started_at.to_string(),
            record.ended_at.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
            record.first_error_kind.to_string(),
            record.duration_sec.map(|d| format!("{d}s")).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.render(&mut std::io::stdout());
    Ok(())
}
