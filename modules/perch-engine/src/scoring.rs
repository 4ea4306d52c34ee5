use chrono::{DateTime, Utc};

use perch_common::{AuthorInfo, Post, Profile, Scoring};

/// Recency decays to zero after this many hours.
const RECENCY_WINDOW_HOURS: f64 = 24.0;

/// Score a candidate post for an account's profile.
///
/// Components:
/// - `recency` (0–50): linear decay from 50 at age zero to 0 at 24h.
/// - `impact` (0–50): audience + engagement + profile relevance.
///   - audience: log-scaled follower count, up to 20
///   - engagement: log-scaled likes + replies, up to 15
///   - relevance: profile keyword/interest matches in the text, up to 15
///
/// `total = recency + impact`, so a fresh post from a large account clears
/// the persistence threshold on its own, while stale or low-reach posts
/// need relevance to survive.
pub fn score_opportunity(
    post: &Post,
    author: &AuthorInfo,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Scoring {
    let age_hours = (now - post.created_at).num_minutes() as f64 / 60.0;
    let recency = 50.0 * (1.0 - age_hours / RECENCY_WINDOW_HOURS).clamp(0.0, 1.0);

    // Audience: log10 of follower count, saturating at 1M followers.
    let audience = ((author.follower_count as f64 + 1.0).log10() / 6.0).min(1.0) * 20.0;

    // Engagement: log10 of likes + replies, saturating at 1000 interactions.
    let interactions = (post.like_count + post.reply_count) as f64;
    let engagement = ((interactions + 1.0).log10() / 3.0).min(1.0) * 15.0;

    let relevance = relevance_component(&post.text, profile);

    let impact = audience + engagement + relevance;

    Scoring {
        recency,
        impact,
        total: recency + impact,
    }
}

/// Fraction of the profile's keywords and interests present in the text,
/// scaled to 0–15. Case-insensitive substring match.
fn relevance_component(text: &str, profile: &Profile) -> f64 {
    let terms: Vec<&String> = profile
        .keywords
        .iter()
        .chain(profile.interests.iter())
        .collect();
    if terms.is_empty() {
        return 0.0;
    }

    let haystack = text.to_lowercase();
    let matched = terms
        .iter()
        .filter(|t| !t.is_empty() && haystack.contains(&t.to_lowercase()))
        .count();

    15.0 * (matched as f64 / terms.len() as f64)
}
