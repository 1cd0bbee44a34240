//! Axum + Askama dashboard over the persisted trends, markets, and settings.

use std::str::FromStr;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tokio::net::TcpListener;
use trendscan_core::Source;
use trendscan_storage::{PgStore, SettingsStore};

pub const CRATE_NAME: &str = "trendscan-web";

#[derive(Clone, Default)]
pub struct AppState {
    pub database_url: Option<String>,
}

impl AppState {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendRow {
    pub id: String,
    pub source: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub engagement_score: f64,
    pub detected_at: String,
    pub status: String,
    pub market_potential: String,
    pub confidence_percent: i64,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketRow {
    pub id: String,
    pub question: String,
    pub slug: String,
    pub volume: f64,
    pub liquidity: f64,
    pub category: String,
    pub end_date: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketMatchRow {
    pub market_question: String,
    pub market_slug: String,
    pub match_score: f64,
    pub ad_potential: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatusRow {
    pub source: String,
    pub last_scan_at: String,
    pub last_scan_status: String,
    pub trends_found: i64,
    pub api_calls_today: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrendsQuery {
    pub source: Option<String>,
    pub potential: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MarketsQuery {
    pub category: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SettingUpdate {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    total_trends: i64,
    high_potential: i64,
    total_markets: i64,
    sources: Vec<SourceStatusRow>,
}

#[derive(Template)]
#[template(path = "trends.html")]
struct TrendsTemplate {
    selected_source: String,
    selected_potential: String,
    trends: Vec<TrendRow>,
}

#[derive(Template)]
#[template(path = "trend_detail.html")]
struct TrendDetailTemplate {
    trend: TrendRow,
    reasoning: String,
    keywords: String,
    matches: Vec<MarketMatchRow>,
}

#[derive(Template)]
#[template(path = "markets.html")]
struct MarketsTemplate {
    selected_category: String,
    selected_sort: String,
    markets: Vec<MarketRow>,
}

#[derive(Template)]
#[template(path = "sources.html")]
struct SourcesTemplate {
    sources: Vec<SourceStatusRow>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/trends", get(trends_page_handler))
        .route("/trends/{id}", get(trend_detail_handler))
        .route("/markets", get(markets_page_handler))
        .route("/sources", get(sources_page_handler))
        .route("/api/trends", get(api_trends_handler))
        .route("/api/markets", get(api_markets_handler))
        .route(
            "/api/settings",
            get(api_settings_get_handler).post(api_settings_post_handler),
        )
        .route("/api/scan/{source}", post(api_scan_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("TRENDSCAN_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(AppState::from_env())).await?;
    Ok(())
}

async fn connect(state: &AppState) -> Option<PgPool> {
    let url = state.database_url.as_deref()?;
    PgPool::connect(url).await.ok()
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

fn fmt_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let pool = connect(&state).await;
    let (total_trends, high_potential, total_markets) = match &pool {
        Some(pool) => load_counts(pool).await.unwrap_or((0, 0, 0)),
        None => (0, 0, 0),
    };
    let sources = match &pool {
        Some(pool) => load_source_status(pool).await.unwrap_or_default(),
        None => Vec::new(),
    };
    render_html(IndexTemplate {
        total_trends,
        high_potential,
        total_markets,
        sources,
    })
}

async fn trends_page_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Response {
    let trends = match connect(&state).await {
        Some(pool) => load_trends(&pool, &query).await.unwrap_or_default(),
        None => Vec::new(),
    };
    render_html(TrendsTemplate {
        selected_source: query.source.unwrap_or_default(),
        selected_potential: query.potential.unwrap_or_default(),
        trends,
    })
}

async fn trend_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let Some(pool) = connect(&state).await else {
        return (StatusCode::NOT_FOUND, Html("Trend not found".to_string())).into_response();
    };
    match load_trend_detail(&pool, &id).await {
        Ok(Some(tpl)) => render_html(tpl),
        Ok(None) => (StatusCode::NOT_FOUND, Html("Trend not found".to_string())).into_response(),
        Err(err) => server_error(err),
    }
}

async fn markets_page_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketsQuery>,
) -> Response {
    let markets = match connect(&state).await {
        Some(pool) => load_markets(&pool, &query).await.unwrap_or_default(),
        None => Vec::new(),
    };
    render_html(MarketsTemplate {
        selected_category: query.category.unwrap_or_default(),
        selected_sort: query.sort.unwrap_or_else(|| "volume".to_string()),
        markets,
    })
}

async fn sources_page_handler(State(state): State<Arc<AppState>>) -> Response {
    let sources = match connect(&state).await {
        Some(pool) => load_source_status(&pool).await.unwrap_or_default(),
        None => Vec::new(),
    };
    render_html(SourcesTemplate { sources })
}

// ---------------------------------------------------------------------------
// JSON API
// ---------------------------------------------------------------------------

async fn api_trends_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Response {
    let trends = match connect(&state).await {
        Some(pool) => match load_trends(&pool, &query).await {
            Ok(rows) => rows,
            Err(err) => return server_error(err),
        },
        None => Vec::new(),
    };
    Json(serde_json::json!({ "trends": trends })).into_response()
}

async fn api_markets_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketsQuery>,
) -> Response {
    let markets = match connect(&state).await {
        Some(pool) => match load_markets(&pool, &query).await {
            Ok(rows) => rows,
            Err(err) => return server_error(err),
        },
        None => Vec::new(),
    };
    Json(serde_json::json!({ "markets": markets })).into_response()
}

async fn api_settings_get_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(pool) = connect(&state).await else {
        return Json(serde_json::json!({ "settings": {} })).into_response();
    };
    match PgStore::from_pool(pool).load_all().await {
        Ok(settings) => Json(serde_json::json!({ "settings": settings })).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err)),
    }
}

async fn api_settings_post_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingUpdate>,
) -> Response {
    let Some(pool) = connect(&state).await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "datastore unavailable" })),
        )
            .into_response();
    };
    match PgStore::from_pool(pool).set(&update.key, update.value.clone()).await {
        Ok(()) => Json(serde_json::json!({
            "setting": { "key": update.key, "value": update.value },
        }))
        .into_response(),
        Err(err) => server_error(anyhow::anyhow!(err)),
    }
}

async fn api_scan_handler(AxumPath(source): AxumPath<String>) -> Response {
    let source = match Source::from_str(&source) {
        Ok(source) => source,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };
    match trendscan_scan::run_scan_from_env(Some(source)).await {
        Ok(outcomes) => Json(serde_json::json!({ "success": true, "outcomes": outcomes }))
            .into_response(),
        Err(err) => server_error(err),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

async fn load_counts(pool: &PgPool) -> anyhow::Result<(i64, i64, i64)> {
    let trends: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trends")
        .fetch_one(pool)
        .await?;
    let high: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM analyses WHERE market_potential = 'high'")
            .fetch_one(pool)
            .await?;
    let markets: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM markets")
        .fetch_one(pool)
        .await?;
    Ok((trends.0, high.0, markets.0))
}

async fn load_trends(pool: &PgPool, query: &TrendsQuery) -> anyhow::Result<Vec<TrendRow>> {
    let source = normalize_filter(&query.source);
    let potential = normalize_filter(&query.potential);
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let rows = sqlx::query(
        r#"
        SELECT t.id::text AS id,
               t.source,
               t.title,
               t.url,
               t.author,
               t.engagement_score,
               t.detected_at,
               t.status,
               a.market_potential,
               a.confidence_score,
               a.summary
          FROM trends t
          LEFT JOIN analyses a ON a.trend_id = t.id
         WHERE ($1::text IS NULL OR t.source = $1)
           AND ($2::text IS NULL OR a.market_potential = $2)
         ORDER BY t.detected_at DESC
         LIMIT $3
        "#,
    )
    .bind(source)
    .bind(potential)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let detected_at: DateTime<Utc> = row.try_get("detected_at")?;
        let confidence: Option<f64> = row.try_get("confidence_score")?;
        out.push(TrendRow {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            author: row.try_get("author")?,
            engagement_score: row.try_get("engagement_score")?,
            detected_at: fmt_time(Some(detected_at)),
            status: row.try_get("status")?,
            market_potential: row
                .try_get::<Option<String>, _>("market_potential")?
                .unwrap_or_else(|| "none".to_string()),
            confidence_percent: (confidence.unwrap_or(0.0) * 100.0).round() as i64,
            summary: row
                .try_get::<Option<String>, _>("summary")?
                .unwrap_or_default(),
        });
    }
    Ok(out)
}

async fn load_trend_detail(
    pool: &PgPool,
    id: &str,
) -> anyhow::Result<Option<TrendDetailTemplate>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id::text AS id,
               t.source,
               t.title,
               t.url,
               t.author,
               t.engagement_score,
               t.detected_at,
               t.status,
               a.market_potential,
               a.confidence_score,
               a.summary,
               a.reasoning,
               a.keywords
          FROM trends t
          LEFT JOIN analyses a ON a.trend_id = t.id
         WHERE t.id::text = $1
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };

    let detected_at: DateTime<Utc> = row.try_get("detected_at")?;
    let confidence: Option<f64> = row.try_get("confidence_score")?;
    let keywords: Option<serde_json::Value> = row.try_get("keywords")?;
    let keywords = keywords
        .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
        .unwrap_or_default()
        .join(", ");

    let trend = TrendRow {
        id: row.try_get("id")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        author: row.try_get("author")?,
        engagement_score: row.try_get("engagement_score")?,
        detected_at: fmt_time(Some(detected_at)),
        status: row.try_get("status")?,
        market_potential: row
            .try_get::<Option<String>, _>("market_potential")?
            .unwrap_or_else(|| "none".to_string()),
        confidence_percent: (confidence.unwrap_or(0.0) * 100.0).round() as i64,
        summary: row
            .try_get::<Option<String>, _>("summary")?
            .unwrap_or_default(),
    };
    let reasoning: String = row
        .try_get::<Option<String>, _>("reasoning")?
        .unwrap_or_default();

    let match_rows = sqlx::query(
        r#"
        SELECT market_question, market_slug, match_score, ad_potential
          FROM market_matches
         WHERE trend_id::text = $1
         ORDER BY match_score DESC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let mut matches = Vec::with_capacity(match_rows.len());
    for row in match_rows {
        let slug: String = row.try_get("market_slug")?;
        matches.push(MarketMatchRow {
            market_question: row.try_get("market_question")?,
            match_score: row.try_get("match_score")?,
            ad_potential: row.try_get("ad_potential")?,
            url: format!("https://polymarket.com/event/{slug}"),
            market_slug: slug,
        });
    }

    Ok(Some(TrendDetailTemplate {
        trend,
        reasoning,
        keywords,
        matches,
    }))
}

async fn load_markets(pool: &PgPool, query: &MarketsQuery) -> anyhow::Result<Vec<MarketRow>> {
    let category = normalize_filter(&query.category);
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let order = match query.sort.as_deref() {
        Some("updated_at") => "updated_at DESC",
        Some("end_date") => "end_date ASC NULLS LAST",
        _ => "volume DESC",
    };

    let sql = format!(
        r#"
        SELECT id, question, slug, volume, liquidity, category, end_date
          FROM markets
         WHERE ($1::text IS NULL OR category ILIKE '%' || $1 || '%')
         ORDER BY {order}
         LIMIT $2
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(category)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let end_date: Option<DateTime<Utc>> = row.try_get("end_date")?;
        let slug: String = row.try_get("slug")?;
        out.push(MarketRow {
            id: row.try_get("id")?,
            question: row.try_get("question")?,
            volume: row.try_get("volume")?,
            liquidity: row.try_get("liquidity")?,
            category: row
                .try_get::<Option<String>, _>("category")?
                .unwrap_or_default(),
            end_date: fmt_time(end_date),
            url: format!("https://polymarket.com/event/{slug}"),
            slug,
        });
    }
    Ok(out)
}

async fn load_source_status(pool: &PgPool) -> anyhow::Result<Vec<SourceStatusRow>> {
    let rows = sqlx::query(
        r#"
        SELECT source, last_scan_at, last_scan_status, trends_found, api_calls_today
          FROM source_metadata
         ORDER BY source
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let last_scan_at: Option<DateTime<Utc>> = row.try_get("last_scan_at")?;
        out.push(SourceStatusRow {
            source: row.try_get("source")?,
            last_scan_at: fmt_time(last_scan_at),
            last_scan_status: row
                .try_get::<Option<String>, _>("last_scan_status")?
                .unwrap_or_else(|| "never".to_string()),
            trends_found: row.try_get("trends_found")?,
            api_calls_today: row.try_get("api_calls_today")?,
        });
    }
    Ok(out)
}

fn normalize_filter(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != "all")
        .map(ToString::to_string)
}
