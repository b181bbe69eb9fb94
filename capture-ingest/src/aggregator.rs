//! Report aggregator
//!
//! Owns every mutation of a session's report. Each mutation runs as one
//! unit per session key: the key lock is held across the companion existence
//! check, the report read, the resolver decision and the write, and the
//! database work happens inside a single `BEGIN IMMEDIATE` transaction.
//!
//! Mutations run on a spawned task so a dropped request cannot cancel a write
//! half way. A transaction dropped without commit is rolled back by sqlx.

use capture_common::db::retry_on_lock;
use capture_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::reports;
use crate::locks::SessionLocks;
use crate::models::{ArtifactKind, ArtifactPath, Pair, Report, Score, SessionKey, TickId};
use crate::pairing::{self, Arrival, PairingDecision};
use crate::store::ArtifactStore;

/// Longest time to keep retrying a locked database before failing the request
const MAX_LOCK_WAIT_MS: u64 = 5000;

/// Effect of one arrival on the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    ReportCreated { pair_complete: bool },
    PairAppended { pair_complete: bool },
    PairAttached { pair_complete: bool },
    /// Retry of an artifact the report already reflects
    AlreadyRecorded,
    /// Snapshot with no frame-created pair; left out of the report
    PairNotFound,
}

#[derive(Clone)]
pub struct ReportAggregator {
    db: SqlitePool,
    store: Arc<dyn ArtifactStore>,
    locks: SessionLocks,
}

impl ReportAggregator {
    pub fn new(db: SqlitePool, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            db,
            store,
            locks: SessionLocks::new(),
        }
    }

    /// Resolve and apply one stored artifact
    ///
    /// `companion` is where the other half of the tick would be stored; for
    /// frames its existence is checked under the session lock and, when
    /// present, recorded immediately.
    pub async fn apply(
        &self,
        key: &SessionKey,
        arrival: Arrival,
        companion: Option<ArtifactPath>,
    ) -> Result<AggregateOutcome> {
        let this = self.clone();
        let key = key.clone();
        detached(async move {
            let _guard = this.locks.lock(&key).await;

            let mut companion_path = None;
            if let (ArtifactKind::Frame, Some(path)) = (arrival.kind, companion) {
                if this.store.exists(&path).await? {
                    debug!(session = %key, companion = %path, "Companion snapshot already stored");
                    companion_path = Some(path.relative());
                }
            }

            let mut tx = this.begin_write().await?;
            let outcome = apply_arrival(&mut tx, &key, &arrival, companion_path.as_deref()).await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await
    }

    /// Create the report if absent and append `pair`
    ///
    /// Returns false when a pair for the same tick already existed; the
    /// existing pair is left untouched.
    pub async fn upsert(&self, key: &SessionKey, pair: Pair) -> Result<bool> {
        let this = self.clone();
        let key = key.clone();
        detached(async move {
            let _guard = this.locks.lock(&key).await;
            let mut tx = this.begin_write().await?;
            let report_id = reports::ensure_report(&mut tx, &key).await?;
            let inserted = reports::insert_pair(&mut tx, report_id, &pair).await?;
            reports::touch_report(&mut tx, report_id).await?;
            tx.commit().await?;
            Ok(inserted)
        })
        .await
    }

    /// Set one side of the pair for `tick`
    ///
    /// A missing report or pair is not an error: it is logged and `false` is
    /// returned, since snapshots may legitimately have no pair to fill.
    pub async fn patch_pair_side(
        &self,
        key: &SessionKey,
        tick: &TickId,
        side: ArtifactKind,
        path: &str,
    ) -> Result<bool> {
        let this = self.clone();
        let key = key.clone();
        let tick = tick.clone();
        let path = path.to_string();
        detached(async move {
            let _guard = this.locks.lock(&key).await;
            let mut tx = this.begin_write().await?;
            let patched = patch_sides(&mut tx, &key, &tick, &[(side, path)]).await?;
            tx.commit().await?;
            Ok(patched)
        })
        .await
    }

    /// Append an externally computed game score, creating the report if needed
    pub async fn record_score(&self, key: &SessionKey, score: Score) -> Result<Report> {
        let this = self.clone();
        let key = key.clone();
        detached(async move {
            let _guard = this.locks.lock(&key).await;
            let mut tx = this.begin_write().await?;
            let report_id = reports::ensure_report(&mut tx, &key).await?;
            reports::insert_score(&mut tx, report_id, &score).await?;
            reports::touch_report(&mut tx, report_id).await?;
            let report = load_existing(&mut tx, &key).await?;
            tx.commit().await?;
            Ok(report)
        })
        .await
    }

    /// Store the externally computed emotions annotation on an existing pair
    pub async fn set_pair_emotions(
        &self,
        key: &SessionKey,
        tick: &TickId,
        emotions: serde_json::Value,
    ) -> Result<()> {
        let this = self.clone();
        let key = key.clone();
        let tick = tick.clone();
        detached(async move {
            let _guard = this.locks.lock(&key).await;
            let mut tx = this.begin_write().await?;
            let report_id = reports::find_report_id(&mut tx, &key)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Report {}", key)))?;
            if !reports::update_pair_emotions(&mut tx, report_id, &tick, &emotions).await? {
                return Err(Error::NotFound(format!("Pair {} in report {}", tick, key)));
            }
            reports::touch_report(&mut tx, report_id).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    /// Current report for `key`, if any
    pub async fn load_report(&self, key: &SessionKey) -> Result<Option<Report>> {
        let mut conn = self.db.acquire().await?;
        reports::load_report(&mut conn, key).await
    }

    /// Open a write transaction
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front so the read that
    /// precedes each write cannot go stale under another writer.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        retry_on_lock("begin report transaction", MAX_LOCK_WAIT_MS, || async {
            Ok(self.db.begin_with("BEGIN IMMEDIATE").await?)
        })
        .await
    }
}

async fn apply_arrival(
    conn: &mut SqliteConnection,
    key: &SessionKey,
    arrival: &Arrival,
    companion_path: Option<&str>,
) -> Result<AggregateOutcome> {
    let report = reports::load_report(conn, key).await?;
    let decision = pairing::resolve(arrival, report.as_ref(), companion_path);

    match decision {
        PairingDecision::CreateReportWithPair(pair) | PairingDecision::AppendNewPair(pair) => {
            let created = report.is_none();
            let pair_complete = pair.is_complete();
            let report_id = reports::ensure_report(conn, key).await?;

            if !reports::insert_pair(conn, report_id, &pair).await? {
                // Only reachable if another writer bypassed the session lock
                warn!(session = %key, tick = %pair.tick, "Pair appeared concurrently, merging sides");
                let sides: Vec<_> = [ArtifactKind::Frame, ArtifactKind::Snapshot]
                    .into_iter()
                    .filter_map(|kind| pair.side(kind).map(|p| (kind, p.to_string())))
                    .collect();
                patch_sides(conn, key, &pair.tick, &sides).await?;
            }
            reports::touch_report(conn, report_id).await?;

            if created {
                info!(session = %key, tick = %pair.tick, pair_complete, "New report created with pair");
                Ok(AggregateOutcome::ReportCreated { pair_complete })
            } else {
                info!(session = %key, tick = %pair.tick, pair_complete, "Pair added to report");
                Ok(AggregateOutcome::PairAppended { pair_complete })
            }
        }
        PairingDecision::AttachToExistingPair { tick, sides } => {
            patch_sides(conn, key, &tick, &sides).await?;

            let pair_complete = report
                .as_ref()
                .and_then(|r| r.pair(&tick))
                .map(|existing| {
                    let mut merged = existing.clone();
                    for (side, path) in &sides {
                        merged.set_side(*side, path.clone());
                    }
                    merged.is_complete()
                })
                .unwrap_or(false);

            info!(session = %key, tick = %tick, pair_complete, "Pair updated");
            Ok(AggregateOutcome::PairAttached { pair_complete })
        }
        PairingDecision::AlreadyRecorded { tick } => {
            debug!(session = %key, tick = %tick, "Artifact already recorded in report");
            Ok(AggregateOutcome::AlreadyRecorded)
        }
        PairingDecision::DiscardSnapshot { tick } => {
            info!(
                session = %key,
                tick = %tick,
                "Snapshot uploaded without corresponding frame, not added to report"
            );
            Ok(AggregateOutcome::PairNotFound)
        }
    }
}

/// Set sides of the pair for `tick`; false (logged) when the pair is missing
async fn patch_sides(
    conn: &mut SqliteConnection,
    key: &SessionKey,
    tick: &TickId,
    sides: &[(ArtifactKind, String)],
) -> Result<bool> {
    let report_id = match reports::find_report_id(conn, key).await? {
        Some(id) => id,
        None => {
            warn!(session = %key, tick = %tick, "No report to patch");
            return Ok(false);
        }
    };

    for (side, path) in sides {
        if !reports::update_pair_side(conn, report_id, tick, *side, path).await? {
            warn!(session = %key, tick = %tick, side = %side, "No pair to patch");
            return Ok(false);
        }
    }

    reports::touch_report(conn, report_id).await?;
    Ok(true)
}

async fn load_existing(conn: &mut SqliteConnection, key: &SessionKey) -> Result<Report> {
    reports::load_report(conn, key)
        .await?
        .ok_or_else(|| Error::Internal(format!("Report {} missing inside its own transaction", key)))
}

async fn detached<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(future)
        .await
        .map_err(|e| Error::Internal(format!("Report update task failed: {}", e)))?
}
