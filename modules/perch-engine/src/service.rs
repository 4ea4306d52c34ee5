// Opportunity read/update facade consumed by the API layer. Every pending
// read goes through the store's query-time expiry guard; status updates are
// validated against the lifecycle here, before any write.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use perch_common::{Opportunity, OpportunityStatus, PerchError};

use crate::store::{OpportunityFilter, Store};

pub struct OpportunityService {
    store: Arc<dyn Store>,
}

impl OpportunityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List an account's opportunities, best score first.
    pub async fn list(
        &self,
        account_id: Uuid,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, PerchError> {
        self.store
            .list_opportunities(account_id, filter, Utc::now())
            .await
    }

    /// Explicit status transition. Only a live pending opportunity may move,
    /// and only to `dismissed` or `responded` — expiry is the sweeper's job.
    pub async fn update_status(
        &self,
        opportunity_id: Uuid,
        status: OpportunityStatus,
    ) -> Result<Opportunity, PerchError> {
        if !matches!(
            status,
            OpportunityStatus::Dismissed | OpportunityStatus::Responded
        ) {
            return Err(PerchError::InvalidStatus {
                expected: "dismissed or responded",
                actual: status.to_string(),
            });
        }

        let opportunity = self
            .store
            .get_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| PerchError::not_found("opportunity", opportunity_id))?;

        let now = Utc::now();
        if !opportunity.is_live_pending(now) {
            // A lapsed-but-unswept pending row reads as expired, keeping
            // this path in agreement with the sweeper.
            let effective = if opportunity.status == OpportunityStatus::Pending {
                OpportunityStatus::Expired
            } else {
                opportunity.status
            };
            return Err(PerchError::InvalidStatus {
                expected: "pending",
                actual: effective.to_string(),
            });
        }

        let updated = self
            .store
            .update_opportunity_status(opportunity_id, status)
            .await?;
        info!(opportunity = %opportunity_id, status = %status, "Opportunity status updated");
        Ok(updated)
    }
}
