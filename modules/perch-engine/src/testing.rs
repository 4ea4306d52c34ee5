// Test mocks for the lifecycle engine.
//
// Three mocks matching the three trait boundaries:
// - MockAdapter (PlatformAdapter) — scripted posts/authors, call counters
// - MockKnowledge (KnowledgeBase) — fixed chunks or forced failure
// - MockModel (LanguageModel) — scripted analysis outcomes, canned replies
//
// Plus `fixtures` helpers for accounts, profiles, opportunities, responses.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use perch_common::{
    Account, AuthorInfo, KnowledgeChunk, PerchError, Platform, Post, PostReceipt,
    ResponseConstraints,
};

use crate::generation::{ContentAnalysis, LanguageModel};
use crate::traits::{KnowledgeBase, PlatformAdapter};

type ErrorFactory = Box<dyn Fn() -> PerchError + Send + Sync>;

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Scripted platform adapter. Builder pattern: `.on_replies()`,
/// `.on_search()`, `.on_author()`, `.with_receipt()`, `.failing_*()`.
/// Unregistered authors resolve to a generic mid-size account so discovery
/// tests only script what they assert on.
pub struct MockAdapter {
    replies: Mutex<Vec<Post>>,
    search_results: Mutex<Vec<Post>>,
    authors: Mutex<HashMap<String, AuthorInfo>>,
    receipt: Mutex<Option<PostReceipt>>,
    max_length: usize,

    fetch_error: Mutex<Option<ErrorFactory>>,
    post_error: Mutex<Option<ErrorFactory>>,

    pub fetch_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub author_calls: AtomicUsize,
    pub post_calls: AtomicUsize,

    fetch_since: Mutex<Vec<DateTime<Utc>>>,
    search_keywords: Mutex<Vec<Vec<String>>>,
    posted: Mutex<Vec<(String, String)>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            search_results: Mutex::new(Vec::new()),
            authors: Mutex::new(HashMap::new()),
            receipt: Mutex::new(None),
            max_length: 300,
            fetch_error: Mutex::new(None),
            post_error: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            author_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
            fetch_since: Mutex::new(Vec::new()),
            search_keywords: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn on_replies(self, posts: Vec<Post>) -> Self {
        *self.replies.lock().unwrap() = posts;
        self
    }

    pub fn on_search(self, posts: Vec<Post>) -> Self {
        *self.search_results.lock().unwrap() = posts;
        self
    }

    pub fn on_author(self, platform_user_id: &str, info: AuthorInfo) -> Self {
        self.authors
            .lock()
            .unwrap()
            .insert(platform_user_id.to_string(), info);
        self
    }

    pub fn with_receipt(self, receipt: PostReceipt) -> Self {
        *self.receipt.lock().unwrap() = Some(receipt);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Every fetch/search call fails with the produced error.
    pub fn failing_fetch(
        self,
        factory: impl Fn() -> PerchError + Send + Sync + 'static,
    ) -> Self {
        *self.fetch_error.lock().unwrap() = Some(Box::new(factory));
        self
    }

    /// Every post call fails with the produced error.
    pub fn failing_post(self, factory: impl Fn() -> PerchError + Send + Sync + 'static) -> Self {
        *self.post_error.lock().unwrap() = Some(Box::new(factory));
        self
    }

    /// `since` values passed to fetch_replies, in call order.
    pub fn recorded_fetch_since(&self) -> Vec<DateTime<Utc>> {
        self.fetch_since.lock().unwrap().clone()
    }

    pub fn recorded_search_keywords(&self) -> Vec<Vec<String>> {
        self.search_keywords.lock().unwrap().clone()
    }

    /// (parent_post_id, text) pairs actually sent to the platform.
    pub fn recorded_posts(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    async fn fetch_replies(
        &self,
        _account: &Account,
        since: DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<Post>, PerchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_since.lock().unwrap().push(since);
        if let Some(factory) = self.fetch_error.lock().unwrap().as_ref() {
            return Err(factory());
        }
        Ok(self.replies.lock().unwrap().clone())
    }

    async fn search_posts(
        &self,
        _account: &Account,
        keywords: &[String],
        _since: DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<Post>, PerchError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_keywords
            .lock()
            .unwrap()
            .push(keywords.to_vec());
        if let Some(factory) = self.fetch_error.lock().unwrap().as_ref() {
            return Err(factory());
        }
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn get_author(
        &self,
        _account: &Account,
        platform_user_id: &str,
    ) -> Result<AuthorInfo, PerchError> {
        self.author_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .authors
            .lock()
            .unwrap()
            .get(platform_user_id)
            .cloned()
            .unwrap_or_else(|| AuthorInfo {
                platform_user_id: platform_user_id.to_string(),
                handle: format!("{platform_user_id}.example"),
                display_name: platform_user_id.to_string(),
                bio: String::new(),
                follower_count: 50_000,
            }))
    }

    async fn post(
        &self,
        _account: &Account,
        parent_post_id: &str,
        text: &str,
    ) -> Result<PostReceipt, PerchError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(factory) = self.post_error.lock().unwrap().as_ref() {
            return Err(factory());
        }
        self.posted
            .lock()
            .unwrap()
            .push((parent_post_id.to_string(), text.to_string()));
        Ok(self
            .receipt
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| PostReceipt {
                platform_post_id: format!("reply-to-{parent_post_id}"),
                platform_post_url: format!("https://example.net/{parent_post_id}/reply"),
                posted_at: Utc::now(),
            }))
    }

    async fn response_constraints(
        &self,
        _platform: Platform,
    ) -> Result<ResponseConstraints, PerchError> {
        Ok(ResponseConstraints {
            max_length: self.max_length,
        })
    }
}

// ---------------------------------------------------------------------------
// MockKnowledge
// ---------------------------------------------------------------------------

pub struct MockKnowledge {
    chunks: Mutex<Vec<KnowledgeChunk>>,
    failing: AtomicBool,
    pub search_calls: AtomicUsize,
    queries: Mutex<Vec<Vec<String>>>,
}

impl Default for MockKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKnowledge {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            search_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chunks(self, chunks: Vec<KnowledgeChunk>) -> Self {
        *self.chunks.lock().unwrap() = chunks;
        self
    }

    /// Every search fails, simulating an unavailable collaborator.
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn recorded_queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for MockKnowledge {
    async fn search(
        &self,
        keywords: &[String],
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, PerchError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(keywords.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(PerchError::Anyhow(anyhow::anyhow!(
                "knowledge base unavailable"
            )));
        }
        Ok(self.chunks.lock().unwrap().iter().take(top_k).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

enum ScriptedAnalysis {
    Ok(ContentAnalysis),
    Malformed,
}

/// Scripted language model. By default returns a generic analysis and a
/// fixed reply; `push_malformed_analysis()` front-loads failures to exercise
/// the retry path. Records every prompt for injection assertions.
pub struct MockModel {
    analysis: Mutex<ContentAnalysis>,
    script: Mutex<VecDeque<ScriptedAnalysis>>,
    reply: Mutex<String>,
    pub analyze_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    analysis_prompts: Mutex<Vec<(String, String)>>,
    generation_prompts: Mutex<Vec<(String, String)>>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            analysis: Mutex::new(ContentAnalysis {
                main_topic: "general discussion".to_string(),
                keywords: vec!["general".to_string()],
                domain: "software".to_string(),
                question: None,
            }),
            script: Mutex::new(VecDeque::new()),
            reply: Mutex::new("Appreciate the mention — happy to dig into this.".to_string()),
            analyze_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            analysis_prompts: Mutex::new(Vec::new()),
            generation_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_analysis(self, analysis: ContentAnalysis) -> Self {
        *self.analysis.lock().unwrap() = analysis;
        self
    }

    pub fn with_reply(self, reply: &str) -> Self {
        *self.reply.lock().unwrap() = reply.to_string();
        self
    }

    /// Queue one malformed analysis result ahead of the default.
    pub fn push_malformed_analysis(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedAnalysis::Malformed);
        self
    }

    /// Queue one specific analysis result ahead of the default.
    pub fn push_analysis(self, analysis: ContentAnalysis) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedAnalysis::Ok(analysis));
        self
    }

    pub fn recorded_analysis_prompts(&self) -> Vec<(String, String)> {
        self.analysis_prompts.lock().unwrap().clone()
    }

    pub fn recorded_generation_prompts(&self) -> Vec<(String, String)> {
        self.generation_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn analyze(&self, system: &str, user: &str) -> Result<ContentAnalysis, PerchError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.analysis_prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));

        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return match outcome {
                ScriptedAnalysis::Ok(analysis) => Ok(analysis),
                ScriptedAnalysis::Malformed => Err(PerchError::Generation(
                    "analysis output did not match schema".to_string(),
                )),
            };
        }
        Ok(self.analysis.lock().unwrap().clone())
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, PerchError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.generation_prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(self.reply.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub mod fixtures {
    use super::*;
    use perch_common::{
        AccountStatus, ContentSnapshot, DiscoverySchedule, DiscoveryState, DiscoveryType,
        Opportunity, OpportunityStatus, Profile, Response, ResponseMetadata, ResponseStatus,
        Scoring,
    };

    pub fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            display_name: "Sam".to_string(),
            voice: "curious, direct, no hashtags".to_string(),
            principles: vec!["cite sources when correcting someone".to_string()],
            interests: vec!["distributed systems".to_string()],
            keywords: vec!["rust".to_string(), "async".to_string()],
            communities: vec!["rustlang".to_string()],
        }
    }

    /// Profile with no search keywords or interests configured.
    pub fn profile_without_keywords() -> Profile {
        Profile {
            keywords: vec![],
            interests: vec![],
            ..profile()
        }
    }

    pub fn account_for_profile(profile_id: Uuid) -> Account {
        Account {
            id: Uuid::new_v4(),
            platform: Platform::Bluesky,
            handle: "sam.bsky.social".to_string(),
            profile_id,
            status: AccountStatus::Active,
            discovery: DiscoveryState {
                schedules: vec![
                    DiscoverySchedule {
                        discovery_type: DiscoveryType::Replies,
                        enabled: true,
                        cron_expression: "0 */15 * * * *".to_string(),
                        last_run_at: None,
                    },
                    DiscoverySchedule {
                        discovery_type: DiscoveryType::Search,
                        enabled: true,
                        cron_expression: "0 */30 * * * *".to_string(),
                        last_run_at: None,
                    },
                ],
                last_at: None,
                error: None,
            },
        }
    }

    pub fn account_with_replies_schedule() -> Account {
        let mut account = account_for_profile(Uuid::new_v4());
        account
            .discovery
            .schedules
            .retain(|s| s.discovery_type == DiscoveryType::Replies);
        account
    }

    pub fn post(post_id: &str, author_id: &str, age: Duration, text: &str) -> Post {
        Post {
            post_id: post_id.to_string(),
            author_platform_id: author_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now() - age,
            like_count: 12,
            reply_count: 3,
        }
    }

    pub fn opportunity(
        account_id: Uuid,
        post_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Opportunity {
        let now = Utc::now();
        Opportunity {
            id: Uuid::new_v4(),
            account_id,
            author_id: Uuid::new_v4(),
            platform: Platform::Bluesky,
            post_id: post_id.to_string(),
            content: ContentSnapshot {
                text: "anyone have opinions on async runtimes?".to_string(),
                posted_at: now - Duration::minutes(30),
            },
            scoring: Scoring {
                recency: 45.0,
                impact: 31.0,
                total: 76.0,
            },
            status: OpportunityStatus::Pending,
            discovered_at: now,
            expires_at,
            discovery_type: DiscoveryType::Replies,
        }
    }

    pub fn draft_response(opportunity_id: Uuid, account_id: Uuid, version: u32) -> Response {
        Response {
            id: Uuid::new_v4(),
            opportunity_id,
            account_id,
            text: "We went through this exact migration last year — ask away.".to_string(),
            status: ResponseStatus::Draft,
            version,
            metadata: ResponseMetadata {
                keywords: vec!["async".to_string()],
                topic: "async runtimes".to_string(),
                domain: "software".to_string(),
                question: Some("anyone have opinions?".to_string()),
                knowledge_chunks: 0,
                model: "mock-model".to_string(),
                analysis_ms: 120,
                retrieval_ms: 0,
                generation_ms: 480,
                max_length: 300,
            },
            platform_post_id: None,
            platform_post_url: None,
            posted_at: None,
            created_at: Utc::now(),
        }
    }
}
