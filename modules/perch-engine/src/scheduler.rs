// Cron scheduling for discovery runs: one job per (account, discovery-type)
// pair, keyed "<account_id>:<discovery_type>".
//
// Job bodies catch and log their own failures — a broken run never
// deregisters its job, stops the scheduler, or touches other jobs. The
// start/stop gate controls firing without touching the job table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use perch_common::{AccountStatus, DiscoverySchedule, DiscoveryType, Opportunity, PerchError};

use crate::discovery::DiscoveryEngine;
use crate::store::Store;

pub fn job_key(account_id: Uuid, discovery_type: DiscoveryType) -> String {
    format!("{account_id}:{discovery_type}")
}

pub struct DiscoveryScheduler {
    store: Arc<dyn Store>,
    engine: Arc<DiscoveryEngine>,
    inner: JobScheduler,
    /// Job-table: job key → cron job id.
    jobs: Mutex<HashMap<String, Uuid>>,
    /// Firing gate checked at the top of every job body.
    running: Arc<AtomicBool>,
}

impl DiscoveryScheduler {
    /// Build the scheduler and start its ticker. No jobs fire until
    /// `start()` opens the gate.
    pub async fn new(
        store: Arc<dyn Store>,
        engine: Arc<DiscoveryEngine>,
    ) -> Result<Self, PerchError> {
        let inner = JobScheduler::new()
            .await
            .map_err(|e| PerchError::Scheduler(e.to_string()))?;
        inner
            .start()
            .await
            .map_err(|e| PerchError::Scheduler(e.to_string()))?;

        Ok(Self {
            store,
            engine,
            inner,
            jobs: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register one job per enabled schedule of each active account.
    /// Returns the job-table size.
    pub async fn initialize(&self) -> Result<usize, PerchError> {
        let accounts = self.store.list_accounts().await?;
        let mut jobs = self.jobs.lock().await;

        for account in accounts
            .iter()
            .filter(|a| a.status == AccountStatus::Active)
        {
            for schedule in account.discovery.schedules.iter().filter(|s| s.enabled) {
                let key = job_key(account.id, schedule.discovery_type);
                if jobs.contains_key(&key) {
                    continue;
                }
                match self.register(account.id, schedule).await {
                    Ok(job_id) => {
                        debug!(key = %key, cron = %schedule.cron_expression, "Registered discovery job");
                        jobs.insert(key, job_id);
                    }
                    // One bad cron expression must not take down the rest
                    // of the table.
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping schedule with invalid cron expression");
                    }
                }
            }
        }

        info!(jobs = jobs.len(), "Discovery scheduler initialized");
        Ok(jobs.len())
    }

    async fn register(
        &self,
        account_id: Uuid,
        schedule: &DiscoverySchedule,
    ) -> Result<Uuid, PerchError> {
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let discovery_type = schedule.discovery_type;

        let job = Job::new_async(schedule.cron_expression.as_str(), move |_uuid, _lock| {
            let engine = Arc::clone(&engine);
            let running = Arc::clone(&running);

            Box::pin(async move {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                match engine.discover(account_id, discovery_type).await {
                    Ok(created) => debug!(
                        %account_id,
                        discovery_type = %discovery_type,
                        created = created.len(),
                        "Scheduled discovery run complete"
                    ),
                    // The engine already recorded discovery.error on the
                    // account; the job stays registered for the next tick.
                    Err(e) => warn!(
                        %account_id,
                        discovery_type = %discovery_type,
                        error = %e,
                        "Scheduled discovery run failed"
                    ),
                }
            })
        })
        .map_err(|e| PerchError::Scheduler(e.to_string()))?;

        self.inner
            .add(job)
            .await
            .map_err(|e| PerchError::Scheduler(e.to_string()))
    }

    /// Clear the job table and rebuild it from current accounts. Used after
    /// schedule edits.
    pub async fn reload(&self) -> Result<usize, PerchError> {
        {
            let mut jobs = self.jobs.lock().await;
            for (key, job_id) in jobs.drain() {
                if let Err(e) = self.inner.remove(&job_id).await {
                    warn!(key = %key, error = %e, "Failed to remove job during reload");
                }
            }
        }
        self.initialize().await
    }

    /// Open the firing gate.
    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
        info!("Discovery scheduler started");
    }

    /// Close the firing gate. Registered jobs keep ticking but their bodies
    /// return immediately.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Discovery scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn contains_job(&self, account_id: Uuid, discovery_type: DiscoveryType) -> bool {
        self.jobs
            .lock()
            .await
            .contains_key(&job_key(account_id, discovery_type))
    }

    /// Run discovery for an account immediately, independent of the cron
    /// state and the firing gate. The result or error goes straight to the
    /// caller; the job table is untouched.
    pub async fn trigger_now(
        &self,
        account_id: Uuid,
        discovery_type: DiscoveryType,
    ) -> Result<Vec<Opportunity>, PerchError> {
        self.engine.discover(account_id, discovery_type).await
    }

    /// Tear down the underlying cron runner.
    pub async fn shutdown(&mut self) -> Result<(), PerchError> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| PerchError::Scheduler(e.to_string()))
    }
}
