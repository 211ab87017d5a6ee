//! Expiry sweep: force-completes active rents whose fixed term has ended
//! and returns their compartments to the pool.
//!
//! The sweep never overlaps itself. Within a process, a trigger that finds
//! a sweep already running is skipped. Across processes, a sweep only runs
//! while holding a transaction-scoped Postgres advisory lock; an instance
//! that cannot take it skips the run.
//!
//! A run works through overdue rents in batches until none are left. Rents
//! that failed or were skipped are left out of later batches of the same
//! run, so they cannot crowd out the rest; the next run retries them.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use smartbox_core::rental;
use smartbox_core::status::RentStatus;
use smartbox_core::types::{DbId, Timestamp};
use smartbox_db::repositories::{CompartmentRepo, RentRepo};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

/// Advisory lock key shared by every instance ("SBXSWEEP" in ASCII).
pub const SWEEP_LOCK_KEY: i64 = 0x5342_5853_5745_4550;

/// Overdue rents fetched per query.
const DEFAULT_BATCH_SIZE: i64 = 500;

/// Outcome of one sweep run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue rents found.
    pub scanned: usize,
    /// Rents completed and compartments freed.
    pub completed: usize,
    /// Rents that were closed or locked by someone else in the meantime.
    pub skipped: usize,
    /// Rents whose completion failed; retried next run.
    pub failed: usize,
    /// The run stopped early because shutdown was requested.
    pub interrupted: bool,
}

/// Why a trigger did not sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSkipped {
    /// A sweep is already running in this process.
    AlreadyRunning,
    /// Another instance holds the advisory lock.
    LockedElsewhere,
}

pub struct ExpirySweeper {
    pool: PgPool,
    interval: Duration,
    batch_size: i64,
    cancel: CancellationToken,
    running: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: CancellationToken::new(),
            running: Mutex::new(()),
        }
    }

    /// Stop the loop, and any run in progress between two rents, once
    /// `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        assert!(batch_size > 0, "sweep batch size must be positive");
        self.batch_size = batch_size;
        self
    }

    /// Run the sweep loop until cancelled.
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Expiry sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.trigger(Utc::now()).await {
                        Ok(Ok(report)) if report.scanned > 0 => {
                            tracing::info!(
                                scanned = report.scanned,
                                completed = report.completed,
                                skipped = report.skipped,
                                failed = report.failed,
                                interrupted = report.interrupted,
                                "Expiry sweep finished"
                            );
                        }
                        Ok(Ok(_)) => tracing::debug!("Expiry sweep: nothing overdue"),
                        Ok(Err(skipped)) => {
                            tracing::debug!(?skipped, "Expiry sweep skipped");
                        }
                        Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
                    }
                }
            }
        }
    }

    /// Sweep once, unless a sweep is already running here or elsewhere.
    pub async fn trigger(&self, now: Timestamp) -> AppResult<Result<SweepReport, SweepSkipped>> {
        let Ok(_running) = self.running.try_lock() else {
            return Ok(Err(SweepSkipped::AlreadyRunning));
        };

        // Held on its own connection for the whole run; released when the
        // guard transaction ends, including on early return.
        let mut guard = self.pool.begin().await?;
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock($1)")
            .bind(SWEEP_LOCK_KEY)
            .fetch_one(&mut *guard)
            .await?;
        if !acquired {
            return Ok(Err(SweepSkipped::LockedElsewhere));
        }

        let report = self.sweep(now).await;
        guard.rollback().await?;
        Ok(Ok(report?))
    }

    /// Complete every overdue rent, each in its own transaction.
    async fn sweep(&self, now: Timestamp) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();
        // Skipped and failed rents are not offered again within this run.
        let mut passed_over: Vec<DbId> = Vec::new();

        loop {
            let ids =
                RentRepo::list_overdue_ids(&self.pool, now, &passed_over, self.batch_size).await?;
            if ids.is_empty() {
                return Ok(report);
            }
            report.scanned += ids.len();

            for rent_id in ids {
                if self.cancel.is_cancelled() {
                    report.interrupted = true;
                    return Ok(report);
                }
                match self.complete_overdue(rent_id, now).await {
                    Ok(true) => report.completed += 1,
                    Ok(false) => {
                        report.skipped += 1;
                        passed_over.push(rent_id);
                    }
                    Err(e) => {
                        report.failed += 1;
                        passed_over.push(rent_id);
                        tracing::warn!(rent_id, error = %e, "Expiry sweep: failed to complete rent");
                    }
                }
            }
        }
    }

    /// Returns `false` if the rent no longer needs completing.
    async fn complete_overdue(&self, rent_id: DbId, now: Timestamp) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(rent) = RentRepo::lock_overdue(&mut tx, rent_id, now).await? else {
            return Ok(false);
        };

        let closure = rental::close_for_transition(&rent.facts()?, RentStatus::Completed, now)?;
        RentRepo::close(
            &mut tx,
            rent_id,
            RentStatus::Completed,
            closure.end_time,
            None,
            closure.total_cost,
        )
        .await?;
        CompartmentRepo::release(&mut tx, rent.compartment_id).await?;
        tx.commit().await?;

        tracing::info!(
            rent_id,
            compartment_id = rent.compartment_id,
            "Overdue rent completed by sweep"
        );
        Ok(true)
    }
}
