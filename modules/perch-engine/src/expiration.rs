// TTL enforcement, half one: the periodic sweep. The other half is the
// query-time guard inside every pending read (store layer), so reads stay
// correct between sweeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use perch_common::PerchError;

use crate::store::Store;

pub struct ExpirationSweeper {
    store: Arc<dyn Store>,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// One sweep: pending opportunities past their TTL become expired.
    /// Idempotent and safe to run at any time.
    pub async fn sweep(&self) -> Result<u64, PerchError> {
        let expired = self.store.expire_pending_before(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "Expired stale opportunities");
        }
        Ok(expired)
    }

    /// Run the sweep on an interval until the handle is aborted. Sweep
    /// failures are logged and the loop continues.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if let Err(e) = self.sweep().await {
                    warn!(error = %e, "Expiration sweep failed");
                }
            }
        })
    }
}
