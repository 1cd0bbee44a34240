//! Postgres persistence + cached settings store for trendscan.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;
use trendscan_core::{
    Analysis, EngagementThresholds, KeywordFilter, Market, MarketMatch, Source, SourceMetadata,
    Trend, TrendStatus,
};
use uuid::Uuid;

pub const CRATE_NAME: &str = "trendscan-storage";

/// How long a cached settings snapshot stays fresh.
pub const SETTINGS_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Everything the ingestion pipeline needs from the datastore. The
/// `(source, source_id)` uniqueness constraint behind `trend_exists` +
/// `insert_trend` is the pipeline's only concurrency guard.
#[async_trait]
pub trait TrendStore: Send + Sync {
    async fn trend_exists(&self, source: Source, source_id: &str) -> Result<bool, StoreError>;

    async fn insert_trend(&self, trend: &Trend) -> Result<(), StoreError>;

    async fn insert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError>;

    async fn update_trend_status(
        &self,
        trend_id: Uuid,
        status: TrendStatus,
    ) -> Result<(), StoreError>;

    async fn insert_market_match(&self, market_match: &MarketMatch) -> Result<(), StoreError>;

    /// Last write wins on a repeated market id.
    async fn upsert_market(&self, market: &Market) -> Result<(), StoreError>;

    async fn update_source_metadata(
        &self,
        source: Source,
        scanned_at: DateTime<Utc>,
        status: &str,
        trends_found: i64,
    ) -> Result<(), StoreError>;

    async fn source_metadata(&self) -> Result<Vec<SourceMetadata>, StoreError>;

    async fn reset_api_call_counters(&self) -> Result<(), StoreError>;

    /// Drop analyzed/dismissed trends detected before `older_than` (their
    /// low/none analyses go first, the rest cascade). Returns trends removed.
    async fn delete_stale_trends(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Key/value settings persistence. Reads go through [`SettingsCache`].
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_all(&self) -> Result<HashMap<String, serde_json::Value>, StoreError>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TrendStore for PgStore {
    async fn trend_exists(&self, source: Source, source_id: &str) -> Result<bool, StoreError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM trends WHERE source = $1 AND source_id = $2")
                .bind(source.as_str())
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn insert_trend(&self, trend: &Trend) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trends
                (id, source, source_id, title, content, url, author,
                 engagement_score, velocity_score, detected_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trend.id)
        .bind(trend.source.as_str())
        .bind(&trend.source_id)
        .bind(&trend.title)
        .bind(&trend.content)
        .bind(&trend.url)
        .bind(&trend.author)
        .bind(trend.engagement_score)
        .bind(trend.velocity_score)
        .bind(trend.detected_at)
        .bind(trend.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO analyses
                (id, trend_id, market_potential, confidence_score, summary,
                 reasoning, suggested_markets, keywords, analyzed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.trend_id)
        .bind(analysis.market_potential.as_str())
        .bind(analysis.confidence_score)
        .bind(&analysis.summary)
        .bind(&analysis.reasoning)
        .bind(serde_json::to_value(&analysis.suggested_markets).unwrap_or_default())
        .bind(serde_json::to_value(&analysis.keywords).unwrap_or_default())
        .bind(analysis.analyzed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_trend_status(
        &self,
        trend_id: Uuid,
        status: TrendStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE trends SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(trend_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_market_match(&self, market_match: &MarketMatch) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO market_matches
                (trend_id, market_id, market_slug, market_question,
                 match_score, matched_keywords, ad_potential)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (trend_id, market_id) DO NOTHING
            "#,
        )
        .bind(market_match.trend_id)
        .bind(&market_match.market_id)
        .bind(&market_match.market_slug)
        .bind(&market_match.market_question)
        .bind(market_match.match_score)
        .bind(serde_json::to_value(&market_match.matched_keywords).unwrap_or_default())
        .bind(market_match.ad_potential.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_market(&self, market: &Market) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO markets
                (id, question, description, slug, end_date, volume, liquidity,
                 current_odds, category, tags, active, closed, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (id) DO UPDATE SET
                question = EXCLUDED.question,
                description = EXCLUDED.description,
                slug = EXCLUDED.slug,
                end_date = EXCLUDED.end_date,
                volume = EXCLUDED.volume,
                liquidity = EXCLUDED.liquidity,
                current_odds = EXCLUDED.current_odds,
                category = EXCLUDED.category,
                tags = EXCLUDED.tags,
                active = EXCLUDED.active,
                closed = EXCLUDED.closed,
                updated_at = NOW()
            "#,
        )
        .bind(&market.id)
        .bind(&market.question)
        .bind(&market.description)
        .bind(&market.slug)
        .bind(market.end_date)
        .bind(market.volume)
        .bind(market.liquidity)
        .bind(market.current_odds)
        .bind(&market.category)
        .bind(
            market
                .tags
                .as_ref()
                .map(|tags| serde_json::to_value(tags).unwrap_or_default()),
        )
        .bind(market.active)
        .bind(market.closed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_source_metadata(
        &self,
        source: Source,
        scanned_at: DateTime<Utc>,
        status: &str,
        trends_found: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO source_metadata
                (source, last_scan_at, last_scan_status, trends_found, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (source) DO UPDATE SET
                last_scan_at = EXCLUDED.last_scan_at,
                last_scan_status = EXCLUDED.last_scan_status,
                trends_found = EXCLUDED.trends_found,
                updated_at = NOW()
            "#,
        )
        .bind(source.as_str())
        .bind(scanned_at)
        .bind(status)
        .bind(trends_found)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn source_metadata(&self) -> Result<Vec<SourceMetadata>, StoreError> {
        let rows: Vec<(String, Option<DateTime<Utc>>, Option<String>, i64, i64)> = sqlx::query_as(
            r#"
            SELECT source, last_scan_at, last_scan_status, trends_found, api_calls_today
              FROM source_metadata
             ORDER BY source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(source, last_scan_at, last_scan_status, found, calls)| {
                let source = source.parse::<Source>().ok()?;
                Some(SourceMetadata {
                    source,
                    last_scan_at,
                    last_scan_status,
                    trends_found: found,
                    api_calls_today: calls,
                })
            })
            .collect())
    }

    async fn reset_api_call_counters(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE source_metadata SET api_calls_today = 0, updated_at = NOW()")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_stale_trends(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        sqlx::query(
            r#"
            DELETE FROM analyses
             WHERE market_potential IN ('low', 'none')
               AND trend_id IN (
                   SELECT id FROM trends
                    WHERE detected_at < $1
                      AND status IN ('analyzed', 'dismissed')
               )
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query(
            "DELETE FROM trends WHERE detected_at < $1 AND status IN ('analyzed', 'dismissed')",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load_all(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        let rows: Vec<(String, serde_json::Value)> =
            sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Settings cache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CacheState {
    snapshot: HashMap<String, serde_json::Value>,
    loaded_at: Option<Instant>,
}

/// TTL-bounded read cache over a [`SettingsStore`]. When the store is
/// unreachable the last-known-good snapshot keeps serving reads. Writers must
/// call [`SettingsCache::invalidate`] after a successful `set`.
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn SettingsStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut state = self.state.lock().await;
        let fresh = state
            .loaded_at
            .map(|at| at.elapsed() < self.ttl)
            .unwrap_or(false);
        if !fresh {
            match self.store.load_all().await {
                Ok(snapshot) => {
                    state.snapshot = snapshot;
                    state.loaded_at = Some(Instant::now());
                }
                Err(err) => {
                    warn!(%err, "settings reload failed, serving last-known-good values");
                }
            }
        }
        state.snapshot.get(key).cloned()
    }

    /// Typed read with a fallback for missing or malformed values.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key).await {
            Some(value) => serde_json::from_value(value).unwrap_or(default),
            None => default,
        }
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.loaded_at = None;
        state.snapshot.clear();
    }

    /// Threshold overrides merged over the built-in defaults.
    pub async fn thresholds(&self) -> EngagementThresholds {
        let defaults = EngagementThresholds::default();
        EngagementThresholds {
            forum: trendscan_core::ForumThresholds {
                min_upvotes: self
                    .get_or("threshold_forum_upvotes", defaults.forum.min_upvotes)
                    .await,
                min_comments: self
                    .get_or("threshold_forum_comments", defaults.forum.min_comments)
                    .await,
                min_ratio: self
                    .get_or("threshold_forum_ratio", defaults.forum.min_ratio)
                    .await,
            },
            microblog: trendscan_core::MicroblogThresholds {
                min_likes: self
                    .get_or("threshold_microblog_likes", defaults.microblog.min_likes)
                    .await,
                min_retweets: self
                    .get_or(
                        "threshold_microblog_retweets",
                        defaults.microblog.min_retweets,
                    )
                    .await,
            },
            web: trendscan_core::WebThresholds {
                min_score: self
                    .get_or("threshold_web_score", defaults.web.min_score)
                    .await,
            },
        }
    }

    /// Keyword list overrides; empty or absent lists fall back to the
    /// built-in ones.
    pub async fn keyword_filter(&self) -> KeywordFilter {
        let inclusion: Vec<String> = self.get_or("keywords_inclusion", Vec::new()).await;
        let exclusion: Vec<String> = self.get_or("keywords_exclusion", Vec::new()).await;
        let defaults = KeywordFilter::default();
        if inclusion.is_empty() && exclusion.is_empty() {
            return defaults;
        }
        let inclusion = if inclusion.is_empty() {
            trendscan_core::INCLUSION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect()
        } else {
            inclusion
        };
        let exclusion = if exclusion.is_empty() {
            trendscan_core::EXCLUSION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect()
        } else {
            exclusion
        };
        KeywordFilter::new(inclusion, exclusion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSettingsStore {
        values: std::sync::Mutex<HashMap<String, serde_json::Value>>,
        loads: AtomicUsize,
        fail: AtomicBool,
    }

    impl FakeSettingsStore {
        fn with(values: &[(&str, serde_json::Value)]) -> Self {
            let store = Self::default();
            {
                let mut guard = store.values.lock().unwrap();
                for (k, v) in values {
                    guard.insert(k.to_string(), v.clone());
                }
            }
            store
        }
    }

    #[async_trait]
    impl SettingsStore for FakeSettingsStore {
        async fn load_all(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Sqlx(sqlx::Error::PoolClosed));
            }
            Ok(self.values.lock().unwrap().clone())
        }

        async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cache_serves_repeat_reads_from_one_load() {
        let store = Arc::new(FakeSettingsStore::with(&[(
            "threshold_forum_upvotes",
            serde_json::json!(75),
        )]));
        let cache = SettingsCache::new(store.clone(), Duration::from_secs(60));

        assert_eq!(cache.get_or("threshold_forum_upvotes", 0i64).await, 75);
        assert_eq!(cache.get_or("threshold_forum_upvotes", 0i64).await, 75);
        assert_eq!(cache.get_or("missing_key", 7i64).await, 7);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let store = Arc::new(FakeSettingsStore::with(&[(
            "threshold_web_score",
            serde_json::json!(0.5),
        )]));
        let cache = SettingsCache::new(store.clone(), Duration::from_secs(60));

        assert_eq!(cache.get_or("threshold_web_score", 0.0).await, 0.5);
        store
            .set("threshold_web_score", serde_json::json!(0.9))
            .await
            .unwrap();
        // Still the cached value until the writer invalidates.
        assert_eq!(cache.get_or("threshold_web_score", 0.0).await, 0.5);
        cache.invalidate().await;
        assert_eq!(cache.get_or("threshold_web_score", 0.0).await, 0.9);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_store_serves_last_known_good() {
        let store = Arc::new(FakeSettingsStore::with(&[(
            "threshold_microblog_likes",
            serde_json::json!(250),
        )]));
        let cache = SettingsCache::new(store.clone(), Duration::ZERO);

        assert_eq!(cache.get_or("threshold_microblog_likes", 0i64).await, 250);
        store.fail.store(true, Ordering::SeqCst);
        // TTL zero means every read retries the store; the failed reload must
        // not wipe the snapshot.
        assert_eq!(cache.get_or("threshold_microblog_likes", 0i64).await, 250);
        assert!(store.loads.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn thresholds_merge_overrides_with_defaults() {
        let store = Arc::new(FakeSettingsStore::with(&[
            ("threshold_forum_upvotes", serde_json::json!(100)),
            ("threshold_microblog_retweets", serde_json::json!(10)),
        ]));
        let cache = SettingsCache::new(store, Duration::from_secs(60));

        let thresholds = cache.thresholds().await;
        assert_eq!(thresholds.forum.min_upvotes, 100);
        assert_eq!(thresholds.forum.min_comments, 5);
        assert_eq!(thresholds.microblog.min_retweets, 10);
        assert_eq!(thresholds.microblog.min_likes, 500);
        assert_eq!(thresholds.web.min_score, 0.5);
    }

    #[tokio::test]
    async fn keyword_overrides_replace_only_the_supplied_list() {
        let store = Arc::new(FakeSettingsStore::with(&[(
            "keywords_inclusion",
            serde_json::json!(["moonshot"]),
        )]));
        let cache = SettingsCache::new(store, Duration::from_secs(60));

        let filter = cache.keyword_filter().await;
        assert!(filter.is_relevant("a moonshot idea"));
        assert!(!filter.is_relevant("election night"));
        // Built-in exclusions still apply.
        assert!(!filter.is_relevant("moonshot nsfw"));
    }
}
