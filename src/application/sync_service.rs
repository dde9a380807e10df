//! Catalog synchronization use case
//!
//! [`CatalogSyncService`] runs one crawl → reconcile → apply cycle.
//! [`SyncCoordinator`] is the single entry point for both the scheduler and
//! manual triggers and guarantees that at most one cycle runs at a time.

#![allow(clippy::uninlined_format_args)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{CatalogResult, ItemFailure};
use crate::domain::reconciliation::{ReconciliationConfig, ReconciliationEngine, SyncMode};
use crate::domain::repositories::{CatalogRepository, CatalogSource};

/// Classification counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub scraped: usize,
    pub new: usize,
    pub modified: usize,
    pub out_of_stock: usize,
    pub unchanged: usize,
    pub duplicates: usize,
    pub notifications: usize,
    pub categories_total: usize,
    pub pages_fetched: usize,
    pub failed_categories: Vec<String>,
}

/// Outcome of one sync run as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub mode: SyncMode,
    /// The run reached the end without a run-level fault
    pub success: bool,
    pub skipped: bool,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub stats: SyncStats,
    pub failures: Vec<ItemFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    fn empty(mode: SyncMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            success: false,
            skipped: false,
            created: 0,
            updated: 0,
            failed: 0,
            stats: SyncStats::default(),
            failures: Vec::new(),
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    /// Summary returned to a trigger that lost the race for the running flag
    pub fn skipped(mode: SyncMode) -> Self {
        Self {
            skipped: true,
            ..Self::empty(mode, Utc::now())
        }
    }

    /// Summary of a run aborted by a run-level fault
    pub fn aborted(mode: SyncMode, started_at: DateTime<Utc>, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            finished_at: Utc::now(),
            ..Self::empty(mode, started_at)
        }
    }
}

/// One crawl → reconcile → apply cycle
pub struct CatalogSyncService {
    source: Arc<dyn CatalogSource>,
    repository: Arc<dyn CatalogRepository>,
    engine: ReconciliationEngine,
}

impl CatalogSyncService {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        repository: Arc<dyn CatalogRepository>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            source,
            repository,
            engine: ReconciliationEngine::new(config),
        }
    }

    /// Runs one cycle. Item-level problems end up in the summary; run-level
    /// faults (site unreachable, storage down, full-mode rollback) are errors.
    pub async fn run(&self, mode: SyncMode) -> CatalogResult<SyncSummary> {
        let mut summary = SyncSummary::empty(mode, Utc::now());
        info!("🚀 Catalog sync {} started ({} mode)", summary.run_id, mode);

        let crawl = self.source.fetch_catalog().await?;
        let snapshot = self.repository.load_snapshot().await?;
        info!(
            "📊 Reconciling {} scraped products against {} stored",
            crawl.products.len(),
            snapshot.len()
        );

        let reconciliation = self.engine.reconcile(&crawl.products, &snapshot);
        let report = self.repository.apply_write_plan(&reconciliation.plan, mode).await?;

        summary.stats = SyncStats {
            scraped: crawl.products.len(),
            new: reconciliation.new.len(),
            modified: reconciliation.modified.len(),
            out_of_stock: reconciliation.out_of_stock.len(),
            unchanged: reconciliation.unchanged.len(),
            duplicates: reconciliation.duplicates,
            notifications: report.notified,
            categories_total: crawl.categories_total,
            pages_fetched: crawl.pages_fetched,
            failed_categories: crawl.failed_categories,
        };
        summary.created = report.created;
        summary.updated = report.updated;
        summary.failures = reconciliation.failures;
        summary.failures.extend(report.failures);
        summary.failed = summary.failures.len();
        summary.success = true;
        summary.finished_at = Utc::now();

        info!(
            "✅ Catalog sync {} finished: {} created, {} updated, {} unchanged, {} failed",
            summary.run_id, summary.created, summary.updated, summary.stats.unchanged, summary.failed
        );
        if !summary.stats.failed_categories.is_empty() {
            warn!(
                "⚠️ Categories missing from this run: {}",
                summary.stats.failed_categories.join(", ")
            );
        }
        Ok(summary)
    }
}

/// Who asked for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    /// Another run was already in flight
    Skipped,
}

/// Clears the running flag however the run ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes sync runs and remembers the last summary
pub struct SyncCoordinator {
    service: CatalogSyncService,
    running: AtomicBool,
    last_summary: RwLock<Option<SyncSummary>>,
}

impl SyncCoordinator {
    pub fn new(service: CatalogSyncService) -> Self {
        Self {
            service,
            running: AtomicBool::new(false),
            last_summary: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn last_summary(&self) -> Option<SyncSummary> {
        self.last_summary.read().await.clone()
    }

    /// Runs a sync unless one is already in flight
    pub async fn trigger(&self, mode: SyncMode, trigger: SyncTrigger) -> CatalogResult<SyncOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("⏭️ {:?} sync skipped: another run is in progress", trigger);
            return Ok(SyncOutcome::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        let started_at = Utc::now();
        match self.service.run(mode).await {
            Ok(summary) => {
                *self.last_summary.write().await = Some(summary.clone());
                Ok(SyncOutcome::Completed(summary))
            }
            Err(e) => {
                error!("❌ {:?} sync aborted: {}", trigger, e);
                *self.last_summary.write().await = Some(SyncSummary::aborted(mode, started_at, &e));
                Err(e)
            }
        }
    }
}
