// Trait abstractions for the engine's external collaborators.
//
// PlatformAdapter — everything that talks to a social platform.
// KnowledgeBase — keyword search over the user's ingested documents.
//
// These enable deterministic testing with MockAdapter and MockKnowledge:
// no network, no platform credentials. `cargo test` in seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use perch_common::{
    Account, AuthorInfo, KnowledgeChunk, PerchError, Platform, Post, PostReceipt,
    ResponseConstraints,
};

/// Per-platform capability the discovery engine and posting workflow depend
/// on. Implementations live outside the core and pre-classify their
/// failures into the `PerchError` platform variants.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Fetch posts replying to the account since the given instant.
    async fn fetch_replies(
        &self,
        account: &Account,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Post>, PerchError>;

    /// Keyword search for candidate posts since the given instant.
    async fn search_posts(
        &self,
        account: &Account,
        keywords: &[String],
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Post>, PerchError>;

    /// Fetch full author detail for a platform user id.
    async fn get_author(
        &self,
        account: &Account,
        platform_user_id: &str,
    ) -> Result<AuthorInfo, PerchError>;

    /// Publish a reply to the given parent post.
    async fn post(
        &self,
        account: &Account,
        parent_post_id: &str,
        text: &str,
    ) -> Result<PostReceipt, PerchError>;

    /// Response constraints (max length) for a platform.
    async fn response_constraints(
        &self,
        platform: Platform,
    ) -> Result<ResponseConstraints, PerchError>;
}

/// Semantic search over the knowledge base. Callers of the generation
/// pipeline never see this fail — the retrieval stage collapses any error
/// into zero chunks.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(
        &self,
        keywords: &[String],
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, PerchError>;
}
