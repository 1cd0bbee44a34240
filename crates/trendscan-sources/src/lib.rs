//! Source fetcher contracts + the concrete clients for the four upstream APIs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use trendscan_core::{
    dedupe_last_wins, dedupe_markets_by_slug, EngagementMetrics, Market, RawItem, Source,
    MIN_CANDIDATE_VOLUME,
};

pub const CRATE_NAME: &str = "trendscan-sources";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("credentials not configured: {0}")]
    MissingCredentials(&'static str),
    #[error("upstream run ended in state {0}")]
    UpstreamRun(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// One upstream platform. Failures degrade to an empty batch; the scan run
/// must keep going whatever a collaborator does.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self) -> Vec<RawItem>;
}

// ---------------------------------------------------------------------------
// Forum (Reddit-style public JSON listings)
// ---------------------------------------------------------------------------

/// Communities scanned by default, chosen for prediction-market overlap.
pub const DEFAULT_FORUM_COMMUNITIES: &[&str] = &[
    "wallstreetbets",
    "politics",
    "worldnews",
    "technology",
    "cryptocurrency",
    "sports",
    "nba",
    "nfl",
    "stocks",
    "investing",
    "futurology",
];

#[derive(Debug, Clone)]
pub struct ForumConfig {
    pub base_url: String,
    pub user_agent: String,
    pub communities: Vec<String>,
    pub communities_per_scan: usize,
    pub items_per_community: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            user_agent: "trendscan/0.1".to_string(),
            communities: DEFAULT_FORUM_COMMUNITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            communities_per_scan: 5,
            items_per_community: 5,
        }
    }
}

pub struct ForumClient {
    http: reqwest::Client,
    config: ForumConfig,
}

#[derive(Debug, Deserialize)]
struct ForumListing {
    data: ForumListingData,
}

#[derive(Debug, Deserialize)]
struct ForumListingData {
    children: Vec<ForumChild>,
}

#[derive(Debug, Deserialize)]
struct ForumChild {
    data: ForumPost,
}

#[derive(Debug, Deserialize)]
struct ForumPost {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    author: String,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    upvote_ratio: Option<f64>,
    #[serde(default)]
    created_utc: f64,
}

impl ForumClient {
    pub fn new(config: ForumConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, config })
    }

    /// Hot listing for one community.
    pub async fn fetch_hot(
        &self,
        community: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, FetchError> {
        let url = format!(
            "{}/r/{}/hot.json?limit={}",
            self.config.base_url, community, limit
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        let listing: ForumListing = resp.json().await?;
        Ok(forum_listing_to_items(listing))
    }
}

fn forum_listing_to_items(listing: ForumListing) -> Vec<RawItem> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let post = child.data;
            RawItem {
                url: format!("https://reddit.com{}", post.permalink),
                created_at: timestamp_secs(post.created_utc),
                metrics: EngagementMetrics {
                    upvotes: Some(post.ups),
                    comments: Some(post.num_comments),
                    upvote_ratio: post.upvote_ratio,
                    ..Default::default()
                },
                id: post.id,
                title: post.title,
                content: post.selftext,
                author: post.author,
            }
        })
        .collect()
}

fn timestamp_secs(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl SourceFetcher for ForumClient {
    fn source(&self) -> Source {
        Source::Forum
    }

    async fn fetch(&self) -> Vec<RawItem> {
        let mut items = Vec::new();
        for community in self
            .config
            .communities
            .iter()
            .take(self.config.communities_per_scan)
        {
            match self
                .fetch_hot(community, self.config.items_per_community)
                .await
            {
                Ok(batch) => items.extend(batch),
                Err(err) => {
                    warn!(community = %community, %err, "forum listing fetch failed");
                }
            }
        }
        items
    }
}

// ---------------------------------------------------------------------------
// Microblog (Apify-style scraping actor: start run, poll, read dataset)
// ---------------------------------------------------------------------------

/// Accounts watched by default when the registry supplies none.
pub const DEFAULT_MICROBLOG_ACCOUNTS: &[&str] = &[
    "breakingnews",
    "CNNBreaking",
    "Reuters",
    "AP",
    "BBCBreaking",
];

#[derive(Debug, Clone)]
pub struct MicroblogConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub actor_id: String,
    pub accounts: Vec<String>,
    pub accounts_per_scan: usize,
    pub tweets_per_account: usize,
    pub items_per_scan: usize,
    pub poll_interval: Duration,
    pub poll_attempts: usize,
}

impl Default for MicroblogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com".to_string(),
            api_token: None,
            actor_id: "apidojo~twitter-scraper-lite".to_string(),
            accounts: DEFAULT_MICROBLOG_ACCOUNTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            accounts_per_scan: 3,
            tweets_per_account: 5,
            items_per_scan: 15,
            poll_interval: Duration::from_secs(1),
            poll_attempts: 60,
        }
    }
}

pub struct MicroblogClient {
    http: reqwest::Client,
    config: MicroblogConfig,
}

#[derive(Debug, Deserialize)]
struct ActorRunEnvelope {
    data: ActorRun,
}

#[derive(Debug, Deserialize)]
struct ActorRun {
    id: String,
    #[serde(rename = "defaultDatasetId")]
    default_dataset_id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct MicroblogTweet {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "tweetId", default)]
    tweet_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<TweetAuthor>,
    #[serde(rename = "likeCount", default)]
    like_count: Option<i64>,
    #[serde(rename = "retweetCount", default)]
    retweet_count: Option<i64>,
    #[serde(rename = "createdAt", default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TweetAuthor {
    #[serde(rename = "userName", default)]
    user_name: Option<String>,
}

impl MicroblogClient {
    pub fn new(config: MicroblogConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, config })
    }

    /// Recent tweets for one account via the scraping actor.
    pub async fn fetch_account(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, FetchError> {
        let token = self
            .config
            .api_token
            .as_deref()
            .ok_or(FetchError::MissingCredentials("microblog api token"))?;

        let run_url = format!(
            "{}/v2/acts/{}/runs",
            self.config.base_url, self.config.actor_id
        );
        let resp = self
            .http
            .post(&run_url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "searchMode": "user",
                "searchTerms": [account],
                "maxTweets": limit,
                "addUserInfo": true,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url: run_url,
            });
        }
        let run: ActorRunEnvelope = resp.json().await?;

        let status = self.wait_for_run(&run.data.id, token).await?;
        if status != "SUCCEEDED" {
            return Err(FetchError::UpstreamRun(status));
        }

        let dataset_url = format!(
            "{}/v2/datasets/{}/items?format=json",
            self.config.base_url, run.data.default_dataset_id
        );
        let resp = self.http.get(&dataset_url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url: dataset_url,
            });
        }
        let tweets: Vec<MicroblogTweet> = resp.json().await?;
        Ok(tweets_to_items(tweets, account))
    }

    async fn wait_for_run(&self, run_id: &str, token: &str) -> Result<String, FetchError> {
        let status_url = format!("{}/v2/actor-runs/{}", self.config.base_url, run_id);
        let mut status = String::new();
        for _ in 0..self.config.poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;
            let resp = self.http.get(&status_url).bearer_auth(token).send().await?;
            let envelope: ActorRunEnvelope = resp.json().await?;
            status = envelope.data.status;
            match status.as_str() {
                "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT" => return Ok(status),
                _ => continue,
            }
        }
        Ok(status)
    }
}

fn tweets_to_items(tweets: Vec<MicroblogTweet>, account: &str) -> Vec<RawItem> {
    tweets
        .into_iter()
        .filter_map(|tweet| {
            let id = tweet.id.or(tweet.tweet_id)?;
            let text = tweet.text.unwrap_or_default();
            let author = tweet
                .author
                .and_then(|a| a.user_name)
                .unwrap_or_else(|| account.to_string());
            let url = tweet
                .url
                .unwrap_or_else(|| format!("https://x.com/{}/status/{}", account, id));
            Some(RawItem {
                title: text.chars().take(100).collect(),
                content: text,
                url,
                author,
                created_at: tweet.created_at.unwrap_or_else(Utc::now),
                metrics: EngagementMetrics {
                    likes: Some(tweet.like_count.unwrap_or(0)),
                    retweets: Some(tweet.retweet_count.unwrap_or(0)),
                    ..Default::default()
                },
                id,
            })
        })
        .collect()
}

#[async_trait]
impl SourceFetcher for MicroblogClient {
    fn source(&self) -> Source {
        Source::Microblog
    }

    async fn fetch(&self) -> Vec<RawItem> {
        let mut items = Vec::new();
        for account in self
            .config
            .accounts
            .iter()
            .take(self.config.accounts_per_scan)
        {
            match self
                .fetch_account(account, self.config.tweets_per_account)
                .await
            {
                Ok(batch) => items.extend(batch),
                Err(err) => {
                    warn!(account = %account, %err, "microblog account fetch failed");
                }
            }
        }
        // Most recent first, capped per scan.
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(self.config.items_per_scan);
        items
    }
}

// ---------------------------------------------------------------------------
// Web search (Exa-style neural search)
// ---------------------------------------------------------------------------

/// Standing queries used to sweep for market-relevant coverage.
pub const DEFAULT_WEB_QUERIES: &[&str] = &[
    "breaking news events",
    "upcoming political elections",
    "major tech product launches",
    "sports championships predictions",
    "cryptocurrency developments",
    "economic indicators forecast",
    "climate policy changes",
    "entertainment awards predictions",
];

#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub queries: Vec<String>,
    pub queries_per_scan: usize,
    pub results_per_query: usize,
    pub items_per_scan: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exa.ai".to_string(),
            api_key: None,
            queries: DEFAULT_WEB_QUERIES.iter().map(|s| s.to_string()).collect(),
            queries_per_scan: 3,
            results_per_query: 20,
            items_per_scan: 10,
        }
    }
}

pub struct WebSearchClient {
    http: reqwest::Client,
    config: WebSearchConfig,
}

#[derive(Debug, Default, Clone)]
pub struct WebSearchOptions {
    pub category: Option<String>,
    pub start_published_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WebSearchResponse {
    #[serde(default)]
    results: Vec<WebSearchResult>,
}

#[derive(Debug, Deserialize)]
struct WebSearchResult {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    published_date: Option<DateTime<Utc>>,
    #[serde(default)]
    score: Option<f64>,
}

impl WebSearchClient {
    pub fn new(config: WebSearchConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<RawItem>, FetchError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingCredentials("web search api key"))?;

        let mut body = serde_json::json!({
            "query": query,
            "num_results": self.config.results_per_query,
            "use_autoprompt": true,
            "type": "neural",
            "contents": { "text": true },
        });
        if let Some(category) = &options.category {
            body["category"] = serde_json::Value::String(category.clone());
        }
        if let Some(start) = options.start_published_date {
            body["start_published_date"] = serde_json::Value::String(start.to_rfc3339());
        }

        let url = format!("{}/search", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        let parsed: WebSearchResponse = resp.json().await?;
        Ok(web_results_to_items(parsed.results))
    }

    /// News published within the last 24 hours.
    pub async fn recent_breaking_news(&self) -> Result<Vec<RawItem>, FetchError> {
        self.search(
            "breaking news",
            &WebSearchOptions {
                category: Some("news".to_string()),
                start_published_date: Some(Utc::now() - chrono::Duration::days(1)),
            },
        )
        .await
    }
}

fn web_results_to_items(results: Vec<WebSearchResult>) -> Vec<RawItem> {
    results
        .into_iter()
        .map(|result| RawItem {
            id: result.id.unwrap_or_else(|| result.url.clone()),
            title: result.title.unwrap_or_default(),
            content: result.text.or(result.summary).unwrap_or_default(),
            author: result.author.unwrap_or_default(),
            created_at: result.published_date.unwrap_or_else(Utc::now),
            metrics: EngagementMetrics {
                relevance: Some(result.score.unwrap_or(0.0)),
                ..Default::default()
            },
            url: result.url,
        })
        .collect()
}

#[async_trait]
impl SourceFetcher for WebSearchClient {
    fn source(&self) -> Source {
        Source::Web
    }

    async fn fetch(&self) -> Vec<RawItem> {
        let mut items = Vec::new();
        match self.recent_breaking_news().await {
            Ok(batch) => items.extend(batch),
            Err(err) => warn!(%err, "breaking-news sweep failed"),
        }
        let news = WebSearchOptions {
            category: Some("news".to_string()),
            ..Default::default()
        };
        for query in self.config.queries.iter().take(self.config.queries_per_scan) {
            match self.search(query, &news).await {
                Ok(batch) => items.extend(batch),
                Err(err) => warn!(query = %query, %err, "web search failed"),
            }
        }
        items.truncate(self.config.items_per_scan);
        items
    }
}

// ---------------------------------------------------------------------------
// Prediction-market mirror (Gamma-style REST)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    pub base_url: String,
    pub fetch_limit: usize,
    pub keep_top: usize,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gamma-api.polymarket.com".to_string(),
            fetch_limit: 100,
            keep_top: 50,
        }
    }
}

pub struct MarketClient {
    http: reqwest::Client,
    config: MarketApiConfig,
}

#[derive(Debug, Deserialize)]
struct WireMarket {
    id: String,
    question: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    market_slug: String,
    #[serde(default)]
    end_date_iso: Option<DateTime<Utc>>,
    #[serde(default)]
    outcome_prices: Vec<f64>,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    liquidity: f64,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl MarketClient {
    pub fn new(config: MarketApiConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, config })
    }

    /// Newest markets, filtered to open ones and ranked by volume.
    pub async fn fetch_active(&self) -> Result<Vec<Market>, FetchError> {
        let url = format!(
            "{}/markets?limit={}&closed=false&order=createdAt&ascending=false",
            self.config.base_url, self.config.fetch_limit
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        let wire: Vec<WireMarket> = resp.json().await?;
        Ok(prepare_market_mirror(
            wire.into_iter().map(Market::from).collect(),
            self.config.keep_top,
        ))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Market>, FetchError> {
        let url = format!("{}/search", self.config.base_url);
        let resp = self.http.get(&url).query(&[("query", query)]).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        let wire: Vec<WireMarket> = resp.json().await?;
        Ok(wire.into_iter().map(Market::from).collect())
    }

    /// Candidate markets for one trend: search per keyword (first five) and
    /// once for the title, merge, dedupe by id keeping the later copy, and
    /// drop closed or thin markets.
    pub async fn find_matching(&self, title: &str, keywords: &[String]) -> Vec<Market> {
        let mut candidates = Vec::new();
        for keyword in keywords.iter().take(5) {
            match self.search(keyword).await {
                Ok(batch) => candidates.extend(batch),
                Err(err) => warn!(keyword = %keyword, %err, "market keyword search failed"),
            }
        }
        match self.search(title).await {
            Ok(batch) => candidates.extend(batch),
            Err(err) => warn!(%err, "market title search failed"),
        }
        filter_candidate_markets(dedupe_last_wins(candidates, |m| m.id.clone()))
    }
}

impl From<WireMarket> for Market {
    fn from(wire: WireMarket) -> Self {
        Market {
            id: wire.id,
            question: wire.question,
            description: wire.description,
            slug: wire.market_slug,
            end_date: wire.end_date_iso,
            volume: wire.volume,
            liquidity: wire.liquidity,
            current_odds: wire.outcome_prices.first().copied(),
            category: wire.category,
            tags: wire.tags,
            active: wire.active,
            closed: wire.closed,
        }
    }
}

/// Mirror preparation: collapse repeated slugs to the higher-volume copy,
/// keep only open markets, rank by volume, cap the list.
fn prepare_market_mirror(markets: Vec<Market>, keep_top: usize) -> Vec<Market> {
    let mut open: Vec<Market> = dedupe_markets_by_slug(markets)
        .into_iter()
        .filter(|m| m.active && !m.closed)
        .collect();
    open.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    open.truncate(keep_top);
    open
}

fn filter_candidate_markets(markets: Vec<Market>) -> Vec<Market> {
    markets
        .into_iter()
        .filter(|m| m.active && !m.closed && m.volume > MIN_CANDIDATE_VOLUME)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forum_listing_maps_posts_to_raw_items() {
        let json = r#"{
            "data": {
                "children": [
                    {"data": {
                        "id": "p1",
                        "title": "Election forecast",
                        "selftext": "polls show tight race",
                        "permalink": "/r/politics/comments/p1/election_forecast/",
                        "author": "observer",
                        "ups": 60,
                        "num_comments": 8,
                        "upvote_ratio": 0.7,
                        "created_utc": 1764590400.0
                    }},
                    {"data": {
                        "id": "p2",
                        "title": "No body post",
                        "permalink": "/r/politics/comments/p2/x/",
                        "author": "other"
                    }}
                ]
            }
        }"#;
        let listing: ForumListing = serde_json::from_str(json).unwrap();
        let items = forum_listing_to_items(listing);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "p1");
        assert_eq!(
            items[0].url,
            "https://reddit.com/r/politics/comments/p1/election_forecast/"
        );
        assert_eq!(items[0].metrics.upvotes, Some(60));
        assert_eq!(items[0].metrics.comments, Some(8));
        assert_eq!(items[0].metrics.upvote_ratio, Some(0.7));
        assert_eq!(items[1].content, "");
        assert_eq!(items[1].metrics.upvotes, Some(0));
    }

    #[test]
    fn tweet_dataset_maps_and_falls_back_to_account() {
        let json = r#"[
            {"id": "t1", "text": "Breaking: senate vote tonight", "url": "https://x.com/a/status/t1",
             "author": {"userName": "reporter"}, "likeCount": 900, "retweetCount": 120,
             "createdAt": "2026-03-01T10:00:00Z"},
            {"tweetId": "t2", "text": "short"},
            {"text": "no id at all"}
        ]"#;
        let tweets: Vec<MicroblogTweet> = serde_json::from_str(json).unwrap();
        let items = tweets_to_items(tweets, "breakingnews");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].author, "reporter");
        assert_eq!(items[0].metrics.likes, Some(900));
        assert_eq!(items[1].id, "t2");
        assert_eq!(items[1].author, "breakingnews");
        assert_eq!(items[1].url, "https://x.com/breakingnews/status/t2");
        assert_eq!(items[1].metrics.likes, Some(0));
    }

    #[test]
    fn tweet_title_is_capped_at_100_chars() {
        let long = "x".repeat(240);
        let tweets = vec![MicroblogTweet {
            id: Some("t".to_string()),
            tweet_id: None,
            text: Some(long.clone()),
            url: None,
            author: None,
            like_count: None,
            retweet_count: None,
            created_at: None,
        }];
        let items = tweets_to_items(tweets, "acct");
        assert_eq!(items[0].title.chars().count(), 100);
        assert_eq!(items[0].content, long);
    }

    #[test]
    fn web_results_prefer_text_then_summary_and_id_falls_back_to_url() {
        let json = r#"{"results": [
            {"url": "https://news.example/a", "title": "A", "text": "full text", "summary": "sum",
             "score": 0.82, "published_date": "2026-03-01T08:00:00Z"},
            {"id": "doc-2", "url": "https://news.example/b", "title": "B", "summary": "only summary"}
        ]}"#;
        let parsed: WebSearchResponse = serde_json::from_str(json).unwrap();
        let items = web_results_to_items(parsed.results);
        assert_eq!(items[0].id, "https://news.example/a");
        assert_eq!(items[0].content, "full text");
        assert_eq!(items[0].metrics.relevance, Some(0.82));
        assert_eq!(items[1].id, "doc-2");
        assert_eq!(items[1].content, "only summary");
        assert_eq!(items[1].metrics.relevance, Some(0.0));
    }

    #[test]
    fn wire_market_maps_odds_from_first_outcome_price() {
        let json = r#"{
            "id": "m1",
            "question": "Will it happen?",
            "market_slug": "will-it-happen",
            "outcome_prices": [0.64, 0.36],
            "volume": 12000.0,
            "liquidity": 3000.0,
            "active": true,
            "closed": false,
            "category": "Politics"
        }"#;
        let wire: WireMarket = serde_json::from_str(json).unwrap();
        let market = Market::from(wire);
        assert_eq!(market.slug, "will-it-happen");
        assert_eq!(market.current_odds, Some(0.64));
        assert_eq!(market.volume, 12000.0);
    }

    fn mk_market(id: &str, volume: f64, active: bool, closed: bool) -> Market {
        Market {
            id: id.to_string(),
            question: id.to_string(),
            description: None,
            slug: id.to_string(),
            end_date: None,
            volume,
            liquidity: 0.0,
            current_odds: None,
            category: None,
            tags: None,
            active,
            closed,
        }
    }

    #[test]
    fn mirror_preparation_sorts_by_volume_and_caps() {
        let markets = vec![
            mk_market("low", 10.0, true, false),
            mk_market("closed", 99999.0, true, true),
            mk_market("high", 5000.0, true, false),
            mk_market("inactive", 88888.0, false, false),
            mk_market("mid", 500.0, true, false),
        ];
        let ranked = prepare_market_mirror(markets, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "high");
        assert_eq!(ranked[1].id, "mid");
    }

    #[test]
    fn mirror_preparation_collapses_repeated_slugs_to_higher_volume() {
        let mut a = mk_market("a", 100.0, true, false);
        a.slug = "same-event".to_string();
        let mut b = mk_market("b", 900.0, true, false);
        b.slug = "same-event".to_string();
        let ranked = prepare_market_mirror(vec![a, b], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn candidate_filter_drops_closed_and_thin_markets() {
        let markets = vec![
            mk_market("thin", 50.0, true, false),
            mk_market("closed", 5000.0, true, true),
            mk_market("good", 5000.0, true, false),
        ];
        let kept = filter_candidate_markets(markets);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "good");
    }
}
