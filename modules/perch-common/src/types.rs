use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Domain constants ---

/// How long a pending opportunity stays actionable.
pub const OPPORTUNITY_TTL_HOURS: i64 = 4;

/// Minimum scoring.total for an opportunity to be persisted.
pub const SCORE_THRESHOLD: f64 = 30.0;

/// Lookback window for an account's first discovery run.
pub const FIRST_RUN_LOOKBACK_HOURS: i64 = 2;

/// Fetch limit for replies discovery.
pub const REPLIES_FETCH_LIMIT: u32 = 100;

/// Fetch limit for keyword search discovery.
pub const SEARCH_FETCH_LIMIT: u32 = 50;

/// How many knowledge-base chunks the generation pipeline retrieves.
pub const KNOWLEDGE_TOP_K: usize = 5;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Bluesky,
    Mastodon,
    X,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Bluesky => write!(f, "bluesky"),
            Platform::Mastodon => write!(f, "mastodon"),
            Platform::X => write!(f, "x"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Paused,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    Replies,
    Search,
}

impl std::fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryType::Replies => write!(f, "replies"),
            DiscoveryType::Search => write!(f, "search"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Pending,
    Dismissed,
    Responded,
    Expired,
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpportunityStatus::Pending => write!(f, "pending"),
            OpportunityStatus::Dismissed => write!(f, "dismissed"),
            OpportunityStatus::Responded => write!(f, "responded"),
            OpportunityStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Draft,
    Posted,
    Dismissed,
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseStatus::Draft => write!(f, "draft"),
            ResponseStatus::Posted => write!(f, "posted"),
            ResponseStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

// --- Account ---

/// Per-type discovery schedule. An account carries at most one entry per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySchedule {
    pub discovery_type: DiscoveryType,
    pub enabled: bool,
    /// Six-field cron expression (seconds-resolution), e.g. "0 */15 * * * *".
    pub cron_expression: String,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Discovery bookkeeping, mutated only by the discovery engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryState {
    pub schedules: Vec<DiscoverySchedule>,
    pub last_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl DiscoveryState {
    pub fn schedule(&self, discovery_type: DiscoveryType) -> Option<&DiscoverySchedule> {
        self.schedules
            .iter()
            .find(|s| s.discovery_type == discovery_type)
    }

    pub fn schedule_mut(
        &mut self,
        discovery_type: DiscoveryType,
    ) -> Option<&mut DiscoverySchedule> {
        self.schedules
            .iter_mut()
            .find(|s| s.discovery_type == discovery_type)
    }
}

/// A connected platform identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub platform: Platform,
    pub handle: String,
    pub profile_id: Uuid,
    pub status: AccountStatus,
    pub discovery: DiscoveryState,
}

// --- Profile ---

/// Generation inputs: voice, principles, and the interests/keywords that
/// drive search discovery. Read-only from the engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub voice: String,
    pub principles: Vec<String>,
    pub interests: Vec<String>,
    pub keywords: Vec<String>,
    pub communities: Vec<String>,
}

// --- Author ---

/// Cached platform-identity projection, keyed by (platform, platform_user_id).
/// Upserted on every discovery encounter, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub platform: Platform,
    pub platform_user_id: String,
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub follower_count: u64,
    pub updated_at: DateTime<Utc>,
}

// --- Opportunity ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    pub recency: f64,
    pub impact: f64,
    pub total: f64,
}

/// Post text as it looked at discovery time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// A discovered candidate post worth engaging with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub author_id: Uuid,
    pub platform: Platform,
    /// Platform-native id of the parent post being engaged with.
    pub post_id: String,
    pub content: ContentSnapshot,
    pub scoring: Scoring,
    pub status: OpportunityStatus,
    pub discovered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub discovery_type: DiscoveryType,
}

impl Opportunity {
    /// Pending and not past its TTL. Every "pending" read must use this,
    /// not the raw status, so reads stay correct between sweeps.
    pub fn is_live_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == OpportunityStatus::Pending && self.expires_at > now
    }

    pub fn ttl() -> Duration {
        Duration::hours(OPPORTUNITY_TTL_HOURS)
    }
}

// --- Response ---

/// Everything the generation pipeline learned while drafting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub keywords: Vec<String>,
    pub topic: String,
    pub domain: String,
    pub question: Option<String>,
    pub knowledge_chunks: usize,
    pub model: String,
    pub analysis_ms: u64,
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    /// Platform max length the draft was validated against.
    pub max_length: usize,
}

/// A drafted or posted reply to an opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub account_id: Uuid,
    pub text: String,
    pub status: ResponseStatus,
    /// 1-based; incremented on each regeneration for the same opportunity.
    pub version: u32,
    pub metadata: ResponseMetadata,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- Adapter-facing shapes ---

/// A candidate post as returned by a platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub author_platform_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u32,
    pub reply_count: u32,
}

/// Full author detail as returned by a platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub platform_user_id: String,
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub follower_count: u64,
}

/// What the platform hands back after a successful post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceipt {
    pub platform_post_id: String,
    pub platform_post_url: String,
    pub posted_at: DateTime<Utc>,
}

/// Per-platform response constraints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponseConstraints {
    pub max_length: usize,
}

/// One ranked chunk from the knowledge-base collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub text: String,
    pub source: Option<String>,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_within_ttl_is_live() {
        let now = Utc::now();
        let opp = Opportunity {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            platform: Platform::Bluesky,
            post_id: "at://post/1".to_string(),
            content: ContentSnapshot {
                text: "hello".to_string(),
                posted_at: now,
            },
            scoring: Scoring {
                recency: 40.0,
                impact: 36.0,
                total: 76.0,
            },
            status: OpportunityStatus::Pending,
            discovered_at: now,
            expires_at: now + Duration::hours(3),
            discovery_type: DiscoveryType::Replies,
        };

        assert!(opp.is_live_pending(now));

        let mut lapsed = opp.clone();
        lapsed.expires_at = now - Duration::seconds(1);
        assert!(!lapsed.is_live_pending(now));

        // Expiring at exactly the query instant is excluded.
        let mut boundary = opp.clone();
        boundary.expires_at = now;
        assert!(!boundary.is_live_pending(now));

        let mut dismissed = opp;
        dismissed.status = OpportunityStatus::Dismissed;
        assert!(!dismissed.is_live_pending(now));
    }

    #[test]
    fn schedule_lookup_by_type() {
        let mut state = DiscoveryState {
            schedules: vec![DiscoverySchedule {
                discovery_type: DiscoveryType::Replies,
                enabled: true,
                cron_expression: "0 */15 * * * *".to_string(),
                last_run_at: None,
            }],
            last_at: None,
            error: None,
        };

        assert!(state.schedule(DiscoveryType::Replies).is_some());
        assert!(state.schedule(DiscoveryType::Search).is_none());

        state
            .schedule_mut(DiscoveryType::Replies)
            .expect("replies schedule")
            .last_run_at = Some(Utc::now());
        assert!(state
            .schedule(DiscoveryType::Replies)
            .and_then(|s| s.last_run_at)
            .is_some());
    }
}
