//! Core domain model and pure trend-pipeline logic for trendscan.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "trendscan-core";

/// Origin platform for raw items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Forum,
    Microblog,
    Web,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Forum, Source::Microblog, Source::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Forum => "forum",
            Source::Microblog => "microblog",
            Source::Web => "web",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSource(pub String);

impl fmt::Display for UnknownSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source: {}", self.0)
    }
}

impl std::error::Error for UnknownSource {}

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forum" => Ok(Source::Forum),
            "microblog" => Ok(Source::Microblog),
            "web" => Ok(Source::Web),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStatus {
    Pending,
    Analyzing,
    Analyzed,
    Alerted,
    Dismissed,
}

impl TrendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendStatus::Pending => "pending",
            TrendStatus::Analyzing => "analyzing",
            TrendStatus::Analyzed => "analyzed",
            TrendStatus::Alerted => "alerted",
            TrendStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPotential {
    High,
    Medium,
    Low,
    None,
}

impl MarketPotential {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketPotential::High => "high",
            MarketPotential::Medium => "medium",
            MarketPotential::Low => "low",
            MarketPotential::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Binary,
    MultipleChoice,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatedLiquidity {
    High,
    Medium,
    Low,
}

/// Display bucketing of a trend↔market match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdPotential {
    High,
    Medium,
    Low,
}

impl AdPotential {
    pub fn from_score(score: f64) -> Self {
        if score > 20.0 {
            AdPotential::High
        } else if score > 10.0 {
            AdPotential::Medium
        } else {
            AdPotential::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdPotential::High => "high",
            AdPotential::Medium => "medium",
            AdPotential::Low => "low",
        }
    }
}

/// Engagement counters as reported by a source. Populated fields depend on
/// the platform; an absent counter is treated as zero by the threshold gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EngagementMetrics {
    #[serde(default)]
    pub upvotes: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub retweets: Option<i64>,
    #[serde(default)]
    pub relevance: Option<f64>,
}

/// One fetched post/article/result, as handed over by a source fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub metrics: EngagementMetrics,
}

impl RawItem {
    /// Title and body joined, the text the keyword filter runs over.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// A persisted candidate topic. Unique per `(source, source_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub id: Uuid,
    pub source: Source,
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: String,
    pub engagement_score: f64,
    pub velocity_score: Option<f64>,
    pub detected_at: DateTime<Utc>,
    pub status: TrendStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSuggestion {
    pub question: String,
    pub market_type: MarketType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub resolution_criteria: String,
    pub estimated_liquidity: EstimatedLiquidity,
}

/// What a scorer says about one trend. Not yet tied to a trend row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub market_potential: MarketPotential,
    pub confidence_score: f64,
    pub summary: String,
    pub reasoning: String,
    #[serde(default)]
    pub suggested_markets: Vec<MarketSuggestion>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AnalysisOutcome {
    /// The outcome recorded when scoring is disabled or has failed.
    pub fn unscored(summary: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            market_potential: MarketPotential::None,
            confidence_score: 0.0,
            summary: summary.into(),
            reasoning: reasoning.into(),
            suggested_markets: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Out-of-range confidence from an external scorer is a data-quality
    /// condition, not an error; clamp it on ingest.
    pub fn clamped(mut self) -> Self {
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);
        self
    }
}

/// Persisted analysis row, one per trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub trend_id: Uuid,
    pub market_potential: MarketPotential,
    pub confidence_score: f64,
    pub summary: String,
    pub reasoning: String,
    pub suggested_markets: Vec<MarketSuggestion>,
    pub keywords: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// A tradable question mirrored from the prediction-market API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub current_odds: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
}

/// A scored trend↔market pairing. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMatch {
    pub trend_id: Uuid,
    pub market_id: String,
    pub market_slug: String,
    pub market_question: String,
    pub match_score: f64,
    pub matched_keywords: Vec<String>,
    pub ad_potential: AdPotential,
}

/// Per-source scan bookkeeping, one row per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: Source,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_scan_status: Option<String>,
    pub trends_found: i64,
    pub api_calls_today: i64,
}

// ---------------------------------------------------------------------------
// Keyword filter
// ---------------------------------------------------------------------------

/// Curated domain keywords that mark a text as market-relevant.
pub const INCLUSION_KEYWORDS: &[&str] = &[
    // Events & outcomes
    "election", "vote", "poll", "forecast", "prediction", "odds", "betting",
    "will happen", "will win", "will lose", "outcome", "result",
    // Politics
    "trump", "biden", "desantis", "harris", "senate", "congress", "governor",
    "primary", "debate", "campaign", "policy", "executive order",
    // Economics & finance
    "inflation", "recession", "fed rate", "stock market", "crash", "rally",
    "earnings", "ipo", "merger", "acquisition", "bankruptcy", "default",
    "bitcoin", "crypto", "ethereum", "sec approval",
    // Sports
    "championship", "playoffs", "super bowl", "world series", "finals",
    "mvp", "trade", "draft pick", "injury report", "game 7",
    // Tech & business
    "product launch", "apple event", "tesla", "spacex", "ai release",
    "layoffs", "ceo", "scandal", "investigation", "lawsuit",
    // Entertainment & culture
    "oscars", "emmys", "grammys", "box office", "streaming numbers",
    "album release", "tour announcement", "controversy",
    // Science & climate
    "breakthrough", "clinical trial", "fda approval", "climate summit",
    "emissions target", "vaccine", "pandemic", "outbreak",
    // Geopolitics
    "war", "peace talks", "sanctions", "treaty", "alliance", "conflict",
    "summit", "diplomatic", "military action", "ceasefire",
];

/// Content that disqualifies a text outright, whatever else it matches.
pub const EXCLUSION_KEYWORDS: &[&str] = &[
    "nsfw", "porn", "xxx", "onlyfans",
    "buy my", "check out my", "subscribe to",
    "upvote if", "karma", "cake day",
];

/// Case-insensitive substring filter over an inclusion and an exclusion list.
/// Exclusion always wins.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    inclusion: Vec<String>,
    exclusion: Vec<String>,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(
            INCLUSION_KEYWORDS.iter().map(|k| k.to_string()),
            EXCLUSION_KEYWORDS.iter().map(|k| k.to_string()),
        )
    }
}

impl KeywordFilter {
    pub fn new(
        inclusion: impl IntoIterator<Item = String>,
        exclusion: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            inclusion: inclusion.into_iter().map(|k| k.to_lowercase()).collect(),
            exclusion: exclusion.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if self.exclusion.iter().any(|k| lower.contains(k.as_str())) {
            return false;
        }
        self.inclusion.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Every inclusion keyword present in `text`, in inclusion-list order.
    pub fn matched_keywords(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.inclusion
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Engagement thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForumThresholds {
    pub min_upvotes: i64,
    pub min_comments: i64,
    pub min_ratio: f64,
}

impl Default for ForumThresholds {
    fn default() -> Self {
        Self {
            min_upvotes: 50,
            min_comments: 5,
            min_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MicroblogThresholds {
    pub min_likes: i64,
    pub min_retweets: i64,
}

impl Default for MicroblogThresholds {
    fn default() -> Self {
        Self {
            min_likes: 500,
            min_retweets: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WebThresholds {
    pub min_score: f64,
}

impl Default for WebThresholds {
    fn default() -> Self {
        Self { min_score: 0.5 }
    }
}

/// Per-source minimum-engagement gate. An absent metric counts as zero, so
/// it fails any positive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EngagementThresholds {
    pub forum: ForumThresholds,
    pub microblog: MicroblogThresholds,
    pub web: WebThresholds,
}

impl EngagementThresholds {
    pub fn meets(&self, source: Source, metrics: &EngagementMetrics) -> bool {
        match source {
            Source::Forum => {
                metrics.upvotes.unwrap_or(0) >= self.forum.min_upvotes
                    && metrics.comments.unwrap_or(0) >= self.forum.min_comments
                    && metrics.upvote_ratio.unwrap_or(0.0) >= self.forum.min_ratio
            }
            Source::Microblog => {
                metrics.likes.unwrap_or(0) >= self.microblog.min_likes
                    && metrics.retweets.unwrap_or(0) >= self.microblog.min_retweets
            }
            Source::Web => metrics.relevance.unwrap_or(0.0) >= self.web.min_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Collapse `items` to one per key. On a repeated key the later occurrence
/// replaces the earlier one in place; output order is first-seen key order.
pub fn dedupe_last_wins<T, K, F>(items: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut slot: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for item in items {
        let key = key_of(&item);
        match slot.get(&key) {
            Some(&idx) => out[idx] = item,
            None => {
                slot.insert(key, out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Like [`dedupe_last_wins`], but a repeated key only replaces the incumbent
/// when `prefer(candidate, incumbent)` says so.
pub fn dedupe_keep_best<T, K, F, P>(items: Vec<T>, key_of: F, prefer: P) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
    P: Fn(&T, &T) -> bool,
{
    let mut slot: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for item in items {
        let key = key_of(&item);
        match slot.get(&key) {
            Some(&idx) => {
                if prefer(&item, &out[idx]) {
                    out[idx] = item;
                }
            }
            None => {
                slot.insert(key, out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Market-ranking dedup: one market per slug, higher volume wins.
pub fn dedupe_markets_by_slug(markets: Vec<Market>) -> Vec<Market> {
    dedupe_keep_best(
        markets,
        |m| m.slug.clone(),
        |candidate, incumbent| candidate.volume > incumbent.volume,
    )
}

// ---------------------------------------------------------------------------
// Match scoring
// ---------------------------------------------------------------------------

/// Markets with a score above this are worth persisting as matches.
pub const MIN_MATCH_SCORE: f64 = 5.0;

/// Candidate markets below this volume are not considered at all.
pub const MIN_CANDIDATE_VOLUME: f64 = 100.0;

/// Weighted relevance between a trend's text and one market.
///
/// Keyword hits on the market text weigh 10 apiece, shared long tokens weigh
/// 1, and volume/liquidity tiers add a fixed bonus. Scores only mean anything
/// relative to each other and the fixed cutoffs.
pub fn match_score(title: &str, content: &str, keywords: &[String], market: &Market) -> f64 {
    let mut score = 0.0;

    let trend_text = format!("{} {}", title, content).to_lowercase();
    let market_text = format!(
        "{} {} {}",
        market.question,
        market.description.as_deref().unwrap_or(""),
        market.tags.as_deref().unwrap_or(&[]).join(" ")
    )
    .to_lowercase();

    for keyword in keywords {
        if market_text.contains(&keyword.to_lowercase()) {
            score += 10.0;
        }
    }

    let market_words: HashSet<&str> = market_text.split_whitespace().collect();
    for word in trend_text.split_whitespace() {
        if word.len() > 4 && market_words.contains(word) {
            score += 1.0;
        }
    }

    if market.volume > 10_000.0 {
        score += 5.0;
    } else if market.volume > 1_000.0 {
        score += 3.0;
    }

    if market.liquidity > 10_000.0 {
        score += 3.0;
    } else if market.liquidity > 1_000.0 {
        score += 2.0;
    }

    score
}

// ---------------------------------------------------------------------------
// Engagement score heuristics
// ---------------------------------------------------------------------------

/// Recency proxy for platforms that report no counters: full marks when
/// brand new, decaying one point per hour, floored at zero.
pub fn recency_engagement(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours_old = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    (100.0 - hours_old).max(0.0)
}

/// Web-search relevance rescaled to the 0..100 range used everywhere else.
pub fn relevance_engagement(relevance: f64) -> f64 {
    (relevance * 100.0).round()
}

/// Engagement score persisted on the trend row for a given source.
pub fn engagement_score(source: Source, item: &RawItem, now: DateTime<Utc>) -> f64 {
    match source {
        Source::Forum => item.metrics.upvotes.unwrap_or(0) as f64,
        Source::Microblog => recency_engagement(item.created_at, now),
        Source::Web => relevance_engagement(item.metrics.relevance.unwrap_or(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mk_market(id: &str, question: &str, volume: f64, liquidity: f64) -> Market {
        Market {
            id: id.to_string(),
            question: question.to_string(),
            description: None,
            slug: id.to_string(),
            end_date: None,
            volume,
            liquidity,
            current_odds: None,
            category: None,
            tags: None,
            active: true,
            closed: false,
        }
    }

    #[test]
    fn exclusion_dominates_inclusion() {
        let filter = KeywordFilter::default();
        // "election" is an inclusion hit, "nsfw" an exclusion hit.
        assert!(!filter.is_relevant("NSFW election drama thread"));
        assert!(filter.is_relevant("election drama thread"));
    }

    #[test]
    fn relevance_requires_an_inclusion_hit() {
        let filter = KeywordFilter::default();
        assert!(!filter.is_relevant("pictures of my cat"));
        assert!(filter.is_relevant("Will the Fed Rate change this week?"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let filter = KeywordFilter::default();
        // "poll" matches inside "polls".
        assert!(filter.is_relevant("POLLS show a tight race"));
        let matched = filter.matched_keywords("Election forecast: polls show tight race");
        assert_eq!(matched, vec!["election", "poll", "forecast"]);
    }

    #[test]
    fn matched_keywords_preserve_list_order() {
        let filter = KeywordFilter::new(
            vec!["beta".to_string(), "alpha".to_string()],
            Vec::new(),
        );
        assert_eq!(
            filter.matched_keywords("alpha then beta"),
            vec!["beta", "alpha"]
        );
    }

    #[test]
    fn forum_threshold_fails_on_any_single_field() {
        let thresholds = EngagementThresholds::default();
        let metrics = EngagementMetrics {
            upvotes: Some(49),
            comments: Some(100),
            upvote_ratio: Some(1.0),
            ..Default::default()
        };
        assert!(!thresholds.meets(Source::Forum, &metrics));

        let passing = EngagementMetrics {
            upvotes: Some(60),
            comments: Some(8),
            upvote_ratio: Some(0.7),
            ..Default::default()
        };
        assert!(thresholds.meets(Source::Forum, &passing));
    }

    #[test]
    fn missing_metrics_count_as_zero() {
        let thresholds = EngagementThresholds::default();
        assert!(!thresholds.meets(Source::Forum, &EngagementMetrics::default()));
        assert!(!thresholds.meets(Source::Microblog, &EngagementMetrics::default()));
        assert!(!thresholds.meets(Source::Web, &EngagementMetrics::default()));

        let zeroed = EngagementThresholds {
            forum: ForumThresholds {
                min_upvotes: 0,
                min_comments: 0,
                min_ratio: 0.0,
            },
            ..Default::default()
        };
        assert!(zeroed.meets(Source::Forum, &EngagementMetrics::default()));
    }

    #[test]
    fn microblog_threshold_checks_both_counters() {
        let thresholds = EngagementThresholds::default();
        let liked_not_shared = EngagementMetrics {
            likes: Some(1_000),
            retweets: Some(10),
            ..Default::default()
        };
        assert!(!thresholds.meets(Source::Microblog, &liked_not_shared));
        let both = EngagementMetrics {
            likes: Some(1_000),
            retweets: Some(80),
            ..Default::default()
        };
        assert!(thresholds.meets(Source::Microblog, &both));
    }

    #[test]
    fn source_names_round_trip_and_unknowns_are_rejected() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
        assert!("rss".parse::<Source>().is_err());
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Keyed {
        id: &'static str,
        v: i32,
    }

    #[test]
    fn dedupe_keeps_last_occurrence_in_first_seen_order() {
        let items = vec![
            Keyed { id: "a", v: 1 },
            Keyed { id: "b", v: 2 },
            Keyed { id: "a", v: 3 },
        ];
        let out = dedupe_last_wins(items, |i| i.id);
        assert_eq!(
            out,
            vec![Keyed { id: "a", v: 3 }, Keyed { id: "b", v: 2 }]
        );
    }

    #[test]
    fn slug_dedupe_keeps_higher_volume() {
        let markets = vec![
            mk_market("x", "q1", 5.0, 0.0),
            mk_market("x", "q2", 50.0, 0.0),
            mk_market("y", "q3", 1.0, 0.0),
        ];
        let out = dedupe_markets_by_slug(markets);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].volume, 50.0);
        assert_eq!(out[0].question, "q2");
        assert_eq!(out[1].slug, "y");
    }

    #[test]
    fn slug_dedupe_keeps_incumbent_on_equal_volume() {
        let markets = vec![
            mk_market("x", "first", 5.0, 0.0),
            mk_market("x", "second", 5.0, 0.0),
        ];
        let out = dedupe_markets_by_slug(markets);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].question, "first");
    }

    #[test]
    fn match_score_counts_keywords_tokens_and_tiers() {
        let market = Market {
            description: Some("Polls close in November".to_string()),
            ..mk_market(
                "m1",
                "Will the election result favor the incumbent?",
                20_000.0,
                5_000.0,
            )
        };
        let keywords = vec!["election".to_string(), "poll".to_string()];
        // keyword hits: "election", "poll" (inside "polls")      -> 20
        // shared tokens > 4 chars: "election", "result", "polls" -> 3
        // volume > 10000 -> 5, liquidity > 1000 -> 2
        let score = match_score(
            "Election result polls",
            "tight race ahead",
            &keywords,
            &market,
        );
        assert_eq!(score, 30.0);
    }

    #[test]
    fn match_score_is_monotone_in_keywords_and_tiers() {
        let market = mk_market("m1", "election outcome question", 500.0, 500.0);
        let fewer = vec!["election".to_string()];
        let more = vec!["election".to_string(), "outcome".to_string()];
        let base = match_score("title", "content", &fewer, &market);
        let with_more = match_score("title", "content", &more, &market);
        assert!(with_more > base);

        let richer = mk_market("m2", "election outcome question", 15_000.0, 15_000.0);
        assert!(match_score("title", "content", &fewer, &richer) > base);
    }

    #[test]
    fn ad_potential_buckets() {
        assert_eq!(AdPotential::from_score(25.0), AdPotential::High);
        assert_eq!(AdPotential::from_score(20.0), AdPotential::Medium);
        assert_eq!(AdPotential::from_score(10.5), AdPotential::Medium);
        assert_eq!(AdPotential::from_score(10.0), AdPotential::Low);
        assert_eq!(AdPotential::from_score(0.0), AdPotential::Low);
    }

    #[test]
    fn recency_engagement_decays_and_floors() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap();
        let fresh = now;
        let old = now - chrono::Duration::hours(30);
        let ancient = now - chrono::Duration::hours(300);
        assert_eq!(recency_engagement(fresh, now), 100.0);
        assert_eq!(recency_engagement(old, now), 70.0);
        assert_eq!(recency_engagement(ancient, now), 0.0);
    }

    #[test]
    fn confidence_is_clamped_on_ingest() {
        let outcome = AnalysisOutcome {
            market_potential: MarketPotential::High,
            confidence_score: 1.7,
            summary: "s".into(),
            reasoning: "r".into(),
            suggested_markets: Vec::new(),
            keywords: Vec::new(),
        };
        assert_eq!(outcome.clamped().confidence_score, 1.0);

        let negative = AnalysisOutcome {
            confidence_score: -0.2,
            ..AnalysisOutcome::unscored("s", "r")
        };
        assert_eq!(negative.clamped().confidence_score, 0.0);
    }
}
