// Posting a drafted response back to the platform.
//
// Idempotency lives in the status check: anything but `draft` is rejected
// before the adapter is ever called. On adapter failure both records are
// left untouched so the user can edit and retry; on success the store flips
// response and opportunity in one atomic step.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use perch_common::{PerchError, Response, ResponseStatus};

use crate::store::Store;
use crate::traits::PlatformAdapter;

pub struct PostingWorkflow {
    store: Arc<dyn Store>,
    adapter: Arc<dyn PlatformAdapter>,
}

impl PostingWorkflow {
    pub fn new(store: Arc<dyn Store>, adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { store, adapter }
    }

    pub async fn post(&self, response_id: Uuid) -> Result<Response, PerchError> {
        let response = self
            .store
            .get_response(response_id)
            .await?
            .ok_or_else(|| PerchError::not_found("response", response_id))?;

        if response.status != ResponseStatus::Draft {
            return Err(PerchError::InvalidStatus {
                expected: "draft",
                actual: response.status.to_string(),
            });
        }

        let opportunity = self
            .store
            .get_opportunity(response.opportunity_id)
            .await?
            .ok_or_else(|| PerchError::not_found("opportunity", response.opportunity_id))?;
        let account = self
            .store
            .get_account(response.account_id)
            .await?
            .ok_or_else(|| PerchError::not_found("account", response.account_id))?;

        let receipt = match self
            .adapter
            .post(&account, &opportunity.post_id, &response.text)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    response = %response_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Platform posting failed, records left unchanged"
                );
                return Err(e);
            }
        };

        let posted = self.store.complete_posting(response_id, &receipt).await?;

        info!(
            response = %response_id,
            platform_post = %receipt.platform_post_id,
            "Response posted"
        );
        Ok(posted)
    }
}
