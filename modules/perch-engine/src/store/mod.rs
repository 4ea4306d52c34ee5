// Persistence seam for the lifecycle engine.
//
// The engine never talks to a database directly — every read and write goes
// through `Store`, so the core logic is deterministic under the in-memory
// implementation and a real backend can be swapped in by the host process.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use perch_common::{
    Account, Author, AuthorInfo, DiscoveryType, Opportunity, OpportunityStatus, PerchError,
    Platform, PostReceipt, Profile, Response, ResponseStatus,
};

/// Filters for opportunity listings. A `Pending` status filter additionally
/// requires `expires_at > now` — the query-time half of the TTL guarantee.
#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub status: Option<OpportunityStatus>,
    pub discovery_type: Option<DiscoveryType>,
    pub min_total: Option<f64>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- Accounts ---

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, PerchError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, PerchError>;

    /// Successful discovery run: set `discovery.last_at` and the schedule's
    /// `last_run_at` to `at`, clear `discovery.error`.
    async fn record_discovery_success(
        &self,
        account_id: Uuid,
        discovery_type: DiscoveryType,
        at: DateTime<Utc>,
    ) -> Result<(), PerchError>;

    /// Failed discovery run: set `discovery.error` only. The run timestamps
    /// stay put so the next run retries the same window.
    async fn record_discovery_failure(
        &self,
        account_id: Uuid,
        message: &str,
    ) -> Result<(), PerchError>;

    // --- Profiles ---

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, PerchError>;

    // --- Authors ---

    /// Insert or refresh the cached author keyed by (platform,
    /// platform_user_id). Last write wins on fields; the author id is stable
    /// across upserts. Authors are never deleted.
    async fn upsert_author(
        &self,
        platform: Platform,
        info: &AuthorInfo,
        now: DateTime<Utc>,
    ) -> Result<Author, PerchError>;

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>, PerchError>;

    // --- Opportunities ---

    async fn get_opportunity(&self, id: Uuid) -> Result<Option<Opportunity>, PerchError>;

    /// True if an opportunity already exists for (account_id, post_id).
    async fn has_opportunity(&self, account_id: Uuid, post_id: &str)
        -> Result<bool, PerchError>;

    /// Atomic insert honoring the (account_id, post_id) uniqueness
    /// invariant. Returns false (and stores nothing) when a concurrent run
    /// got there first.
    async fn insert_opportunity_if_absent(
        &self,
        opportunity: Opportunity,
    ) -> Result<bool, PerchError>;

    async fn list_opportunities(
        &self,
        account_id: Uuid,
        filter: &OpportunityFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, PerchError>;

    async fn update_opportunity_status(
        &self,
        id: Uuid,
        status: OpportunityStatus,
    ) -> Result<Opportunity, PerchError>;

    /// Bulk-expire: pending opportunities with `expires_at < now` become
    /// `expired`. Returns how many rows changed. Never touches non-pending
    /// opportunities; safe to re-run at any time.
    async fn expire_pending_before(&self, now: DateTime<Utc>) -> Result<u64, PerchError>;

    // --- Responses ---

    async fn insert_response(&self, response: Response) -> Result<(), PerchError>;

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, PerchError>;

    /// Highest version among responses for this opportunity, regardless of
    /// their status.
    async fn latest_response_version(
        &self,
        opportunity_id: Uuid,
    ) -> Result<Option<u32>, PerchError>;

    /// Edit draft text. Fails with InvalidStatus for posted/dismissed
    /// responses.
    async fn update_response_text(&self, id: Uuid, text: &str) -> Result<Response, PerchError>;

    async fn update_response_status(
        &self,
        id: Uuid,
        status: ResponseStatus,
    ) -> Result<Response, PerchError>;

    /// Atomically flip the response to `posted` (with the platform receipt)
    /// and its opportunity to `responded`. Readers never observe one side
    /// without the other.
    async fn complete_posting(
        &self,
        response_id: Uuid,
        receipt: &PostReceipt,
    ) -> Result<Response, PerchError>;
}
