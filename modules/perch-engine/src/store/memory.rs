use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use perch_common::{
    Account, Author, AuthorInfo, DiscoveryType, Opportunity, OpportunityStatus, PerchError,
    Platform, PostReceipt, Profile, Response, ResponseStatus,
};

use super::{OpportunityFilter, Store};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    profiles: HashMap<Uuid, Profile>,
    authors: HashMap<(Platform, String), Author>,
    opportunities: HashMap<Uuid, Opportunity>,
    /// (account_id, post_id) pairs with an existing opportunity.
    opportunity_keys: HashSet<(Uuid, String)>,
    responses: HashMap<Uuid, Response>,
}

/// In-memory store. One RwLock over the whole state keeps multi-entity
/// mutations (posting completion, insert-if-absent) atomic from the
/// reader's perspective.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account. Host-process setup and test fixtures only.
    pub async fn put_account(&self, account: Account) {
        self.state.write().await.accounts.insert(account.id, account);
    }

    /// Seed a profile. Host-process setup and test fixtures only.
    pub async fn put_profile(&self, profile: Profile) {
        self.state.write().await.profiles.insert(profile.id, profile);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, PerchError> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, PerchError> {
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn record_discovery_success(
        &self,
        account_id: Uuid,
        discovery_type: DiscoveryType,
        at: DateTime<Utc>,
    ) -> Result<(), PerchError> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| PerchError::not_found("account", account_id))?;

        account.discovery.last_at = Some(at);
        account.discovery.error = None;
        if let Some(schedule) = account.discovery.schedule_mut(discovery_type) {
            schedule.last_run_at = Some(at);
        }
        Ok(())
    }

    async fn record_discovery_failure(
        &self,
        account_id: Uuid,
        message: &str,
    ) -> Result<(), PerchError> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| PerchError::not_found("account", account_id))?;

        account.discovery.error = Some(message.to_string());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, PerchError> {
        Ok(self.state.read().await.profiles.get(&id).cloned())
    }

    async fn upsert_author(
        &self,
        platform: Platform,
        info: &AuthorInfo,
        now: DateTime<Utc>,
    ) -> Result<Author, PerchError> {
        let mut state = self.state.write().await;
        let key = (platform, info.platform_user_id.clone());

        let author = match state.authors.get_mut(&key) {
            Some(existing) => {
                existing.handle = info.handle.clone();
                existing.display_name = info.display_name.clone();
                existing.bio = info.bio.clone();
                existing.follower_count = info.follower_count;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let author = Author {
                    id: Uuid::new_v4(),
                    platform,
                    platform_user_id: info.platform_user_id.clone(),
                    handle: info.handle.clone(),
                    display_name: info.display_name.clone(),
                    bio: info.bio.clone(),
                    follower_count: info.follower_count,
                    updated_at: now,
                };
                state.authors.insert(key, author.clone());
                author
            }
        };
        Ok(author)
    }

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>, PerchError> {
        Ok(self
            .state
            .read()
            .await
            .authors
            .values()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn get_opportunity(&self, id: Uuid) -> Result<Option<Opportunity>, PerchError> {
        Ok(self.state.read().await.opportunities.get(&id).cloned())
    }

    async fn has_opportunity(
        &self,
        account_id: Uuid,
        post_id: &str,
    ) -> Result<bool, PerchError> {
        Ok(self
            .state
            .read()
            .await
            .opportunity_keys
            .contains(&(account_id, post_id.to_string())))
    }

    async fn insert_opportunity_if_absent(
        &self,
        opportunity: Opportunity,
    ) -> Result<bool, PerchError> {
        let mut state = self.state.write().await;
        let key = (opportunity.account_id, opportunity.post_id.clone());
        if state.opportunity_keys.contains(&key) {
            return Ok(false);
        }
        state.opportunity_keys.insert(key);
        state.opportunities.insert(opportunity.id, opportunity);
        Ok(true)
    }

    async fn list_opportunities(
        &self,
        account_id: Uuid,
        filter: &OpportunityFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, PerchError> {
        let state = self.state.read().await;
        let mut matches: Vec<Opportunity> = state
            .opportunities
            .values()
            .filter(|o| o.account_id == account_id)
            .filter(|o| match filter.status {
                // Pending reads carry the expiry guard even before a sweep.
                Some(OpportunityStatus::Pending) => o.is_live_pending(now),
                Some(status) => o.status == status,
                None => true,
            })
            .filter(|o| {
                filter
                    .discovery_type
                    .map_or(true, |ty| o.discovery_type == ty)
            })
            .filter(|o| filter.min_total.map_or(true, |min| o.scoring.total >= min))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            b.scoring
                .total
                .partial_cmp(&a.scoring.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matches)
    }

    async fn update_opportunity_status(
        &self,
        id: Uuid,
        status: OpportunityStatus,
    ) -> Result<Opportunity, PerchError> {
        let mut state = self.state.write().await;
        let opportunity = state
            .opportunities
            .get_mut(&id)
            .ok_or_else(|| PerchError::not_found("opportunity", id))?;
        opportunity.status = status;
        Ok(opportunity.clone())
    }

    async fn expire_pending_before(&self, now: DateTime<Utc>) -> Result<u64, PerchError> {
        let mut state = self.state.write().await;
        let mut expired = 0u64;
        for opportunity in state.opportunities.values_mut() {
            if opportunity.status == OpportunityStatus::Pending && opportunity.expires_at < now {
                opportunity.status = OpportunityStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn insert_response(&self, response: Response) -> Result<(), PerchError> {
        self.state
            .write()
            .await
            .responses
            .insert(response.id, response);
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, PerchError> {
        Ok(self.state.read().await.responses.get(&id).cloned())
    }

    async fn latest_response_version(
        &self,
        opportunity_id: Uuid,
    ) -> Result<Option<u32>, PerchError> {
        Ok(self
            .state
            .read()
            .await
            .responses
            .values()
            .filter(|r| r.opportunity_id == opportunity_id)
            .map(|r| r.version)
            .max())
    }

    async fn update_response_text(&self, id: Uuid, text: &str) -> Result<Response, PerchError> {
        let mut state = self.state.write().await;
        let response = state
            .responses
            .get_mut(&id)
            .ok_or_else(|| PerchError::not_found("response", id))?;

        if response.status != ResponseStatus::Draft {
            return Err(PerchError::InvalidStatus {
                expected: "draft",
                actual: response.status.to_string(),
            });
        }
        response.text = text.to_string();
        Ok(response.clone())
    }

    async fn update_response_status(
        &self,
        id: Uuid,
        status: ResponseStatus,
    ) -> Result<Response, PerchError> {
        let mut state = self.state.write().await;
        let response = state
            .responses
            .get_mut(&id)
            .ok_or_else(|| PerchError::not_found("response", id))?;

        // Posted and dismissed are terminal for a version.
        if response.status != ResponseStatus::Draft {
            return Err(PerchError::InvalidStatus {
                expected: "draft",
                actual: response.status.to_string(),
            });
        }
        response.status = status;
        Ok(response.clone())
    }

    async fn complete_posting(
        &self,
        response_id: Uuid,
        receipt: &PostReceipt,
    ) -> Result<Response, PerchError> {
        let mut state = self.state.write().await;

        // Validate both sides before mutating either.
        let opportunity_id = {
            let response = state
                .responses
                .get(&response_id)
                .ok_or_else(|| PerchError::not_found("response", response_id))?;
            if response.status != ResponseStatus::Draft {
                return Err(PerchError::InvalidStatus {
                    expected: "draft",
                    actual: response.status.to_string(),
                });
            }
            response.opportunity_id
        };
        if !state.opportunities.contains_key(&opportunity_id) {
            return Err(PerchError::not_found("opportunity", opportunity_id));
        }

        let updated = {
            let response = state
                .responses
                .get_mut(&response_id)
                .ok_or_else(|| PerchError::not_found("response", response_id))?;
            response.status = ResponseStatus::Posted;
            response.platform_post_id = Some(receipt.platform_post_id.clone());
            response.platform_post_url = Some(receipt.platform_post_url.clone());
            response.posted_at = Some(receipt.posted_at);
            response.clone()
        };

        if let Some(opportunity) = state.opportunities.get_mut(&opportunity_id) {
            opportunity.status = OpportunityStatus::Responded;
        }

        Ok(updated)
    }
}
