// Discovery: fetch candidate posts for an account, cache their authors,
// score them against the profile, and persist the ones worth engaging.
//
// Bookkeeping contract: run timestamps advance only on success, so a failed
// run is retried over the same window instead of silently skipping it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use perch_common::{
    Account, ContentSnapshot, DiscoveryType, Opportunity, OpportunityStatus, PerchError, Post,
    Profile, FIRST_RUN_LOOKBACK_HOURS, REPLIES_FETCH_LIMIT, SCORE_THRESHOLD, SEARCH_FETCH_LIMIT,
};

use crate::scoring::score_opportunity;
use crate::store::Store;
use crate::traits::PlatformAdapter;

pub struct DiscoveryEngine {
    store: Arc<dyn Store>,
    adapter: Arc<dyn PlatformAdapter>,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<dyn Store>, adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { store, adapter }
    }

    /// Run one discovery pass for an account. Returns the newly created
    /// opportunities (possibly none).
    pub async fn discover(
        &self,
        account_id: Uuid,
        discovery_type: DiscoveryType,
    ) -> Result<Vec<Opportunity>, PerchError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| PerchError::not_found("account", account_id))?;
        let profile = self
            .store
            .get_profile(account.profile_id)
            .await?
            .ok_or_else(|| PerchError::not_found("profile", account.profile_id))?;

        let now = Utc::now();
        let since = account
            .discovery
            .schedule(discovery_type)
            .and_then(|s| s.last_run_at)
            .unwrap_or_else(|| now - Duration::hours(FIRST_RUN_LOOKBACK_HOURS));

        let posts = match discovery_type {
            DiscoveryType::Replies => {
                self.adapter
                    .fetch_replies(&account, since, REPLIES_FETCH_LIMIT)
                    .await
            }
            DiscoveryType::Search => {
                // Search discovery is opt-in per content: with no keywords
                // configured there is nothing to scan, so the run ends
                // before any adapter call or bookkeeping.
                if profile.keywords.is_empty() {
                    debug!(
                        account = %account.handle,
                        "No discovery keywords configured, skipping search run"
                    );
                    return Ok(Vec::new());
                }
                self.adapter
                    .search_posts(&account, &profile.keywords, since, SEARCH_FETCH_LIMIT)
                    .await
            }
        };

        let posts = match posts {
            Ok(posts) => posts,
            Err(e) => {
                warn!(
                    account = %account.handle,
                    discovery_type = %discovery_type,
                    error = %e,
                    "Discovery fetch failed"
                );
                self.store
                    .record_discovery_failure(account_id, &e.to_string())
                    .await?;
                return Err(e);
            }
        };

        let mut created = Vec::new();
        for post in &posts {
            match self
                .consider(&account, &profile, post, discovery_type, now)
                .await
            {
                Ok(Some(opportunity)) => created.push(opportunity),
                Ok(None) => {}
                Err(e) => {
                    self.store
                        .record_discovery_failure(account_id, &e.to_string())
                        .await?;
                    return Err(e);
                }
            }
        }

        self.store
            .record_discovery_success(account_id, discovery_type, now)
            .await?;

        info!(
            account = %account.handle,
            discovery_type = %discovery_type,
            fetched = posts.len(),
            created = created.len(),
            "Discovery run complete"
        );
        Ok(created)
    }

    /// Evaluate a single candidate post: cache its author, skip duplicates,
    /// score, and persist if it clears the threshold.
    async fn consider(
        &self,
        account: &Account,
        profile: &Profile,
        post: &Post,
        discovery_type: DiscoveryType,
        now: DateTime<Utc>,
    ) -> Result<Option<Opportunity>, PerchError> {
        let info = self
            .adapter
            .get_author(account, &post.author_platform_id)
            .await?;
        let author = self
            .store
            .upsert_author(account.platform, &info, now)
            .await?;

        if self
            .store
            .has_opportunity(account.id, &post.post_id)
            .await?
        {
            debug!(post_id = %post.post_id, "Opportunity already exists, skipping");
            return Ok(None);
        }

        let scoring = score_opportunity(post, &info, profile, now);
        if scoring.total < SCORE_THRESHOLD {
            debug!(
                post_id = %post.post_id,
                total = scoring.total,
                "Below score threshold, skipping"
            );
            return Ok(None);
        }

        let opportunity = Opportunity {
            id: Uuid::new_v4(),
            account_id: account.id,
            author_id: author.id,
            platform: account.platform,
            post_id: post.post_id.clone(),
            content: ContentSnapshot {
                text: post.text.clone(),
                posted_at: post.created_at,
            },
            scoring,
            status: OpportunityStatus::Pending,
            discovered_at: now,
            expires_at: now + Opportunity::ttl(),
            discovery_type,
        };

        // Persist-time uniqueness check: a concurrent pass for the same
        // account may have inserted this post between the check above and
        // here. Losing the race is a silent skip, not an error.
        if self
            .store
            .insert_opportunity_if_absent(opportunity.clone())
            .await?
        {
            Ok(Some(opportunity))
        } else {
            debug!(post_id = %post.post_id, "Lost insert race to a concurrent run");
            Ok(None)
        }
    }
}
