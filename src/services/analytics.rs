// Analytics engine
// Read-only report builders over aggregate SQL on click_logs and links.
// Every call recomputes from the database bounded by a date range; there is
// no incremental or streaming computation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::DieselPool;
use crate::models::user::User;
use crate::schema::{click_logs, links};
use crate::utils::service_error::ServiceError;

/// Longest report range accepted
pub const MAX_REPORT_DAYS: i64 = 365;

/// Trending is capped to a shorter horizon
pub const MAX_TRENDING_DAYS: i64 = 30;

// =============================================================================
// ROW TYPES FOR AGGREGATE QUERIES
// =============================================================================

#[derive(Debug, QueryableByName)]
struct DayCountRow {
    #[diesel(sql_type = diesel::sql_types::Date)]
    day: NaiveDate,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct HourCountRow {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    hour: i32,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct LabelCountRow {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    label: Option<String>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct GeoCountRow {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    country: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    city: Option<String>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct BestTimeRow {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    hour: i32,
    #[diesel(sql_type = diesel::sql_types::Integer)]
    day_of_week: i32,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

#[derive(Debug, QueryableByName)]
struct TrendingLinkRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    title: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    short_code: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    recent_clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct ActiveUserRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = diesel::sql_types::Text)]
    username: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    full_name: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    recent_clicks: i64,
}

#[derive(Debug, QueryableByName)]
struct LatestClickRow {
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    clicked_at: DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    title: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    short_code: String,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    country: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    device_type: Option<String>,
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyCount {
    pub hour: i32,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoCount {
    pub country: String,
    pub city: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BestPostingTime {
    pub hour: i32,
    pub day_of_week: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUrlSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub short_code: String,
    pub click_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_urls: i64,
    pub active_urls: i64,
    pub expired_urls: i64,
    pub total_clicks: i64,
    pub period_clicks: i64,
    pub new_urls: i64,
    pub click_through_rate: f64,
    pub top_urls: Vec<TopUrlSummary>,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlDetailedStats {
    pub url_id: Uuid,
    pub title: Option<String>,
    pub short_code: String,
    pub total_clicks: i32,
    pub period_clicks: i64,
    pub daily_average: f64,
    pub unique_visitors: i64,
    pub daily_clicks: Vec<DailyCount>,
    pub geographic_stats: Vec<GeoCount>,
    pub device_stats: Vec<LabelCount>,
    pub browser_stats: Vec<LabelCount>,
    pub referrer_stats: Vec<LabelCount>,
    pub peak_hours: Vec<HourlyCount>,
    pub created_at: DateTime<Utc>,
    pub last_clicked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUrlWithStats {
    #[serde(flatten)]
    pub summary: TopUrlSummary,
    pub stats: UrlDetailedStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPerformance {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub total_urls: i64,
    pub active_urls: i64,
    pub total_clicks: i64,
    pub period_clicks: i64,
    pub avg_clicks_per_url: f64,
    pub performance_score: f64,
    pub daily_activity: Vec<DailyCount>,
    pub top_urls: Vec<TopUrlWithStats>,
    pub period_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub total_users: usize,
    pub total_urls: i64,
    pub total_clicks: i64,
    pub average_performance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparativeAnalysis {
    pub users: Vec<UserPerformance>,
    pub group_stats: GroupStats,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingUrl {
    pub id: Uuid,
    pub title: Option<String>,
    pub short_code: String,
    pub recent_clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveUserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub recent_clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingAnalysis {
    pub trending_urls: Vec<TrendingUrl>,
    pub active_users: Vec<ActiveUserSummary>,
    pub hourly_trends: Vec<HourlyCount>,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub report_period: ReportPeriod,
    pub dashboard_stats: DashboardStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_performance: Option<UserPerformance>,
    pub trending_analysis: TrendingAnalysis,
    pub best_posting_times: Vec<BestPostingTime>,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub kind: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub performance: UserPerformance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub group_stats: Option<GroupStats>,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestClick {
    pub clicked_at: DateTime<Utc>,
    pub url_title: Option<String>,
    pub short_code: String,
    pub country: String,
    pub device_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeStats {
    pub recent_clicks_1h: i64,
    pub recent_clicks_24h: i64,
    pub active_users_15m: i64,
    pub latest_clicks: Vec<LatestClick>,
    pub last_updated: DateTime<Utc>,
}

// =============================================================================
// SCORE AND RECOMMENDATIONS (pure functions)
// =============================================================================

/// 0-100 weighted score: productivity (link count), effectiveness (clicks),
/// activity ratio and recent daily average, each capped.
pub fn performance_score(
    total_urls: i64,
    total_clicks: i64,
    active_urls: i64,
    period_clicks: i64,
    days: i64,
) -> f64 {
    let mut score = 0.0;

    if total_urls > 0 {
        score += (total_urls as f64 * 2.0).min(20.0);
    }

    if total_clicks > 0 {
        score += (total_clicks as f64 / 10.0).min(30.0);
    }

    if total_urls > 0 {
        score += (active_urls as f64 / total_urls as f64) * 20.0;
    }

    if days > 0 {
        let daily_avg = period_clicks as f64 / days as f64;
        score += (daily_avg * 2.0).min(30.0);
    }

    ((score * 100.0).round() / 100.0).min(100.0)
}

/// Rule-based improvement recommendations
pub fn build_recommendations(
    dashboard: &DashboardStats,
    user_performance: Option<&UserPerformance>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if dashboard.click_through_rate < 5.0 {
        recommendations.push(Recommendation {
            kind: "improvement".to_string(),
            title: "Improve click-through rate".to_string(),
            description: "The click-through rate is low; better link titles and descriptions \
                          usually help"
                .to_string(),
            priority: "high".to_string(),
        });
    }

    if dashboard.expired_urls > dashboard.active_urls {
        recommendations.push(Recommendation {
            kind: "maintenance".to_string(),
            title: "Renew expired links".to_string(),
            description: "More links have expired than remain active; consider renewing them"
                .to_string(),
            priority: "medium".to_string(),
        });
    }

    if let Some(perf) = user_performance {
        if perf.performance_score < 50.0 {
            recommendations.push(Recommendation {
                kind: "training".to_string(),
                title: "Raise the performance score".to_string(),
                description: "The performance score is low; more activity and better link \
                              quality raise it"
                    .to_string(),
                priority: "high".to_string(),
            });
        }

        if perf.avg_clicks_per_url < 10.0 {
            recommendations.push(Recommendation {
                kind: "strategy".to_string(),
                title: "Improve sharing strategy".to_string(),
                description: "Average clicks per link are low; sharing links at better times \
                              tends to help"
                    .to_string(),
                priority: "medium".to_string(),
            });
        }
    }

    recommendations
}

/// Rank badge for a leaderboard entry
pub fn badge_for(rank: usize, score: f64) -> Option<Badge> {
    match rank {
        1 => Some(Badge {
            kind: "gold".to_string(),
            title: "First place".to_string(),
        }),
        2 => Some(Badge {
            kind: "silver".to_string(),
            title: "Second place".to_string(),
        }),
        3 => Some(Badge {
            kind: "bronze".to_string(),
            title: "Third place".to_string(),
        }),
        _ if score >= 80.0 => Some(Badge {
            kind: "star".to_string(),
            title: "Excellent performance".to_string(),
        }),
        _ if score >= 60.0 => Some(Badge {
            kind: "thumbs-up".to_string(),
            title: "Good performance".to_string(),
        }),
        _ => None,
    }
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Zero-fill a day series over [start, end]
fn zero_filled_days(
    counts: &HashMap<NaiveDate, i64>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyCount> {
    let mut series = Vec::new();
    let mut day = start;
    while day <= end {
        series.push(DailyCount {
            date: day,
            clicks: counts.get(&day).copied().unwrap_or(0),
        });
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    series
}

// =============================================================================
// ANALYTICS ENGINE
// =============================================================================

pub struct AnalyticsEngine {
    pool: DieselPool,
}

impl AnalyticsEngine {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.diesel_pool.clone(),
        }
    }

    async fn conn(&self) -> Result<crate::db::PooledConn<'_>, ServiceError> {
        self.pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))
    }

    /// Dashboard stats, optionally scoped to one user's links
    pub async fn dashboard_stats(
        &self,
        user_id: Option<Uuid>,
        days: i64,
    ) -> Result<DashboardStats, ServiceError> {
        let days = days.clamp(1, MAX_REPORT_DAYS);
        let end = Utc::now();
        let start = end - Duration::days(days);
        let mut conn = self.conn().await?;

        // Select clauses are fixed before boxing; the optional user filter
        // lands on the boxed query
        let total_urls: i64 = {
            let mut q = links::table
                .count()
                .into_boxed()
                .filter(links::deleted_at.is_null());
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result(&mut conn).await?
        };

        let active_urls: i64 = {
            let mut q = links::table
                .count()
                .into_boxed()
                .filter(links::deleted_at.is_null())
                .filter(links::is_active.eq(true))
                .filter(
                    links::expires_at
                        .is_null()
                        .or(links::expires_at.gt(Utc::now())),
                );
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result(&mut conn).await?
        };

        let expired_urls: i64 = {
            let mut q = links::table
                .count()
                .into_boxed()
                .filter(links::deleted_at.is_null())
                .filter(links::expires_at.is_not_null())
                .filter(links::expires_at.le(Utc::now()));
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result(&mut conn).await?
        };

        let total_clicks: i64 = {
            let mut q = links::table
                .select(diesel::dsl::sum(links::click_count))
                .into_boxed()
                .filter(links::deleted_at.is_null());
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result::<Option<i64>>(&mut conn).await?.unwrap_or(0)
        };

        let period_clicks: i64 = {
            let mut q = click_logs::table
                .inner_join(links::table)
                .count()
                .into_boxed()
                .filter(click_logs::clicked_at.ge(start))
                .filter(click_logs::clicked_at.le(end))
                .filter(links::deleted_at.is_null());
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result(&mut conn).await?
        };

        let new_urls: i64 = {
            let mut q = links::table
                .count()
                .into_boxed()
                .filter(links::deleted_at.is_null())
                .filter(links::created_at.ge(start))
                .filter(links::created_at.le(end));
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.get_result(&mut conn).await?
        };

        let ctr = if total_urls > 0 {
            (period_clicks as f64 / total_urls as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        let top_urls: Vec<TopUrlSummary> = {
            let mut q = links::table
                .into_boxed()
                .filter(links::deleted_at.is_null())
                .order(links::click_count.desc())
                .limit(5);
            if let Some(uid) = user_id {
                q = q.filter(links::user_id.eq(uid));
            }
            q.load::<crate::models::link::Link>(&mut conn).await?
        }
        .into_iter()
            .map(|link| TopUrlSummary {
                id: link.id,
                title: link.title,
                short_code: link.short_code,
                click_count: link.click_count,
                created_at: link.created_at,
            })
            .collect();

        Ok(DashboardStats {
            total_urls,
            active_urls,
            expired_urls,
            total_clicks,
            period_clicks,
            new_urls,
            click_through_rate: ctr,
            top_urls,
            period_days: days,
        })
    }

    /// Per-user performance with daily activity and a 0-100 score
    pub async fn user_performance(
        &self,
        user_id: Uuid,
        days: i64,
    ) -> Result<UserPerformance, ServiceError> {
        let days = days.clamp(1, MAX_REPORT_DAYS);
        let end = Utc::now();
        let start = end - Duration::days(days);
        let mut conn = self.conn().await?;

        let user = User::find_by_id(&mut conn, user_id)
            .await
            .map_err(|_| ServiceError::NotFound)?;

        let total_urls: i64 = links::table
            .filter(links::user_id.eq(user_id))
            .filter(links::deleted_at.is_null())
            .count()
            .get_result(&mut conn)
            .await?;

        let active_urls: i64 = links::table
            .filter(links::user_id.eq(user_id))
            .filter(links::deleted_at.is_null())
            .filter(links::is_active.eq(true))
            .filter(
                links::expires_at
                    .is_null()
                    .or(links::expires_at.gt(Utc::now())),
            )
            .count()
            .get_result(&mut conn)
            .await?;

        let total_clicks: i64 = links::table
            .filter(links::user_id.eq(user_id))
            .filter(links::deleted_at.is_null())
            .select(diesel::dsl::sum(links::click_count))
            .get_result::<Option<i64>>(&mut conn)
            .await?
            .unwrap_or(0);

        let period_clicks: i64 = click_logs::table
            .inner_join(links::table)
            .filter(links::user_id.eq(user_id))
            .filter(links::deleted_at.is_null())
            .filter(click_logs::clicked_at.ge(start))
            .filter(click_logs::clicked_at.le(end))
            .count()
            .get_result(&mut conn)
            .await?;

        let avg_clicks_per_url = if total_urls > 0 {
            ((total_clicks as f64 / total_urls as f64) * 100.0).round() / 100.0
        } else {
            0.0
        };

        let daily_rows = diesel::sql_query(
            "SELECT cl.clicked_at::date AS day, COUNT(*) AS clicks \
             FROM click_logs cl JOIN links l ON l.id = cl.link_id \
             WHERE l.user_id = $1 AND l.deleted_at IS NULL \
               AND cl.clicked_at >= $2 AND cl.clicked_at <= $3 \
             GROUP BY 1 ORDER BY 1",
        )
        .bind::<diesel::sql_types::Uuid, _>(user_id)
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<DayCountRow>(&mut conn)
        .await?;

        let counts: HashMap<NaiveDate, i64> =
            daily_rows.into_iter().map(|r| (r.day, r.clicks)).collect();
        let daily_activity = zero_filled_days(&counts, start.date_naive(), end.date_naive());

        let top_links = links::table
            .filter(links::user_id.eq(user_id))
            .filter(links::deleted_at.is_null())
            .order(links::click_count.desc())
            .limit(10)
            .load::<crate::models::link::Link>(&mut conn)
            .await?;
        drop(conn);

        let mut top_urls = Vec::with_capacity(top_links.len());
        for link in top_links {
            let stats = self.url_detailed_stats(link.id, days).await?;
            top_urls.push(TopUrlWithStats {
                summary: TopUrlSummary {
                    id: link.id,
                    title: link.title.clone(),
                    short_code: link.short_code.clone(),
                    click_count: link.click_count,
                    created_at: link.created_at,
                },
                stats,
            });
        }

        let score = performance_score(total_urls, total_clicks, active_urls, period_clicks, days);

        Ok(UserPerformance {
            user_id,
            username: user.username,
            full_name: user.full_name,
            total_urls,
            active_urls,
            total_clicks,
            period_clicks,
            avg_clicks_per_url,
            performance_score: score,
            daily_activity,
            top_urls,
            period_days: days,
            rank: None,
        })
    }

    /// Detailed stats for a single link
    pub async fn url_detailed_stats(
        &self,
        url_id: Uuid,
        days: i64,
    ) -> Result<UrlDetailedStats, ServiceError> {
        let days = days.clamp(1, MAX_REPORT_DAYS);
        let end = Utc::now();
        let start = end - Duration::days(days);
        let mut conn = self.conn().await?;

        let link = crate::models::link::Link::find_by_id(&mut conn, url_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let period_clicks: i64 = click_logs::table
            .filter(click_logs::link_id.eq(url_id))
            .filter(click_logs::clicked_at.ge(start))
            .filter(click_logs::clicked_at.le(end))
            .count()
            .get_result(&mut conn)
            .await?;

        let daily_rows = diesel::sql_query(
            "SELECT clicked_at::date AS day, COUNT(*) AS clicks FROM click_logs \
             WHERE link_id = $1 AND clicked_at >= $2 AND clicked_at <= $3 \
             GROUP BY 1 ORDER BY 1",
        )
        .bind::<diesel::sql_types::Uuid, _>(url_id)
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<DayCountRow>(&mut conn)
        .await?;
        let counts: HashMap<NaiveDate, i64> =
            daily_rows.into_iter().map(|r| (r.day, r.clicks)).collect();
        let daily_clicks = zero_filled_days(&counts, start.date_naive(), end.date_naive());

        let geographic_stats = diesel::sql_query(
            "SELECT country, city, COUNT(*) AS clicks FROM click_logs \
             WHERE link_id = $1 AND clicked_at >= $2 AND clicked_at <= $3 \
             GROUP BY country, city ORDER BY clicks DESC LIMIT 20",
        )
        .bind::<diesel::sql_types::Uuid, _>(url_id)
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<GeoCountRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| GeoCount {
            country: r.country.unwrap_or_else(|| "unknown".to_string()),
            city: r.city.unwrap_or_else(|| "unknown".to_string()),
            clicks: r.clicks,
        })
        .collect();

        let device_stats = self
            .label_breakdown(&mut conn, url_id, "device_type", start, end, None)
            .await?;
        let browser_stats = self
            .label_breakdown(&mut conn, url_id, "browser", start, end, None)
            .await?;
        let referrer_stats = self
            .label_breakdown(&mut conn, url_id, "referrer", start, end, Some(10))
            .await?
            .into_iter()
            .map(|mut r| {
                if r.label == "unknown" {
                    r.label = "direct".to_string();
                }
                r
            })
            .collect();

        let peak_hours = diesel::sql_query(
            "SELECT EXTRACT(HOUR FROM clicked_at)::int AS hour, COUNT(*) AS clicks \
             FROM click_logs \
             WHERE link_id = $1 AND clicked_at >= $2 AND clicked_at <= $3 \
             GROUP BY 1 ORDER BY 1",
        )
        .bind::<diesel::sql_types::Uuid, _>(url_id)
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<HourCountRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| HourlyCount {
            hour: r.hour,
            clicks: r.clicks,
        })
        .collect();

        let unique_visitors = diesel::sql_query(
            "SELECT COUNT(DISTINCT ip_address) AS count FROM click_logs \
             WHERE link_id = $1 AND clicked_at >= $2 AND clicked_at <= $3",
        )
        .bind::<diesel::sql_types::Uuid, _>(url_id)
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .get_result::<CountRow>(&mut conn)
        .await?
        .count;

        let daily_average = ((period_clicks as f64 / days as f64) * 100.0).round() / 100.0;

        Ok(UrlDetailedStats {
            url_id,
            title: link.title.clone(),
            short_code: link.short_code.clone(),
            total_clicks: link.click_count,
            period_clicks,
            daily_average,
            unique_visitors,
            daily_clicks,
            geographic_stats,
            device_stats,
            browser_stats,
            referrer_stats,
            peak_hours,
            created_at: link.created_at,
            last_clicked: link.last_accessed_at,
        })
    }

    async fn label_breakdown(
        &self,
        conn: &mut AsyncPgConnection,
        url_id: Uuid,
        column: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<LabelCount>, ServiceError> {
        // `column` is one of a fixed set of identifiers, never user input
        let limit_clause = limit
            .map(|l| format!(" LIMIT {}", l))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {column} AS label, COUNT(*) AS clicks FROM click_logs \
             WHERE link_id = $1 AND clicked_at >= $2 AND clicked_at <= $3 \
             GROUP BY {column} ORDER BY clicks DESC{limit_clause}"
        );

        let rows = diesel::sql_query(sql)
            .bind::<diesel::sql_types::Uuid, _>(url_id)
            .bind::<diesel::sql_types::Timestamptz, _>(start)
            .bind::<diesel::sql_types::Timestamptz, _>(end)
            .load::<LabelCountRow>(conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| LabelCount {
                label: r.label.unwrap_or_else(|| "unknown".to_string()),
                clicks: r.clicks,
            })
            .collect())
    }

    /// Ranked comparison of several users
    pub async fn comparative_analysis(
        &self,
        user_ids: &[Uuid],
        days: i64,
    ) -> Result<ComparativeAnalysis, ServiceError> {
        let days = days.clamp(1, MAX_REPORT_DAYS);

        let mut performances = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            match self.user_performance(*user_id, days).await {
                Ok(performance) => performances.push(performance),
                Err(ServiceError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        performances.sort_by(|a, b| {
            b.performance_score
                .partial_cmp(&a.performance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (idx, performance) in performances.iter_mut().enumerate() {
            performance.rank = Some(idx + 1);
        }

        let total_urls = performances.iter().map(|p| p.total_urls).sum();
        let total_clicks = performances.iter().map(|p| p.total_clicks).sum();
        let average_performance = if performances.is_empty() {
            0.0
        } else {
            let sum: f64 = performances.iter().map(|p| p.performance_score).sum();
            ((sum / performances.len() as f64) * 100.0).round() / 100.0
        };

        Ok(ComparativeAnalysis {
            group_stats: GroupStats {
                total_users: performances.len(),
                total_urls,
                total_clicks,
                average_performance,
            },
            users: performances,
            period_days: days,
        })
    }

    /// Trending links and most active users over a short horizon
    pub async fn trending_analysis(&self, days: i64) -> Result<TrendingAnalysis, ServiceError> {
        let days = days.clamp(1, MAX_TRENDING_DAYS);
        let end = Utc::now();
        let start = end - Duration::days(days);
        let mut conn = self.conn().await?;

        let trending_urls = diesel::sql_query(
            "SELECT l.id AS id, l.title AS title, l.short_code AS short_code, \
                    COUNT(cl.id) AS recent_clicks \
             FROM links l JOIN click_logs cl ON cl.link_id = l.id \
             WHERE cl.clicked_at >= $1 AND cl.clicked_at <= $2 AND l.deleted_at IS NULL \
             GROUP BY l.id, l.title, l.short_code \
             ORDER BY recent_clicks DESC LIMIT 10",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<TrendingLinkRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| TrendingUrl {
            id: r.id,
            title: r.title,
            short_code: r.short_code,
            recent_clicks: r.recent_clicks,
        })
        .collect();

        let active_users = diesel::sql_query(
            "SELECT u.id AS id, u.username AS username, u.full_name AS full_name, \
                    COUNT(cl.id) AS recent_clicks \
             FROM users u \
             JOIN links l ON l.user_id = u.id \
             JOIN click_logs cl ON cl.link_id = l.id \
             WHERE cl.clicked_at >= $1 AND cl.clicked_at <= $2 \
               AND l.deleted_at IS NULL AND u.deleted_at IS NULL \
             GROUP BY u.id, u.username, u.full_name \
             ORDER BY recent_clicks DESC LIMIT 10",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<ActiveUserRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| ActiveUserSummary {
            id: r.id,
            username: r.username,
            full_name: r.full_name,
            recent_clicks: r.recent_clicks,
        })
        .collect();

        let hourly_trends = diesel::sql_query(
            "SELECT EXTRACT(HOUR FROM cl.clicked_at)::int AS hour, COUNT(*) AS clicks \
             FROM click_logs cl JOIN links l ON l.id = cl.link_id \
             WHERE cl.clicked_at >= $1 AND cl.clicked_at <= $2 AND l.deleted_at IS NULL \
             GROUP BY 1 ORDER BY 1",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .bind::<diesel::sql_types::Timestamptz, _>(end)
        .load::<HourCountRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| HourlyCount {
            hour: r.hour,
            clicks: r.clicks,
        })
        .collect();

        Ok(TrendingAnalysis {
            trending_urls,
            active_users,
            hourly_trends,
            period_days: days,
        })
    }

    /// Best posting times: hour x weekday pairs with the most clicks
    pub async fn best_posting_times(
        &self,
        user_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BestPostingTime>, ServiceError> {
        let mut conn = self.conn().await?;

        let rows = if let Some(uid) = user_id {
            diesel::sql_query(
                "SELECT EXTRACT(HOUR FROM cl.clicked_at)::int AS hour, \
                        EXTRACT(DOW FROM cl.clicked_at)::int AS day_of_week, \
                        COUNT(*) AS clicks \
                 FROM click_logs cl JOIN links l ON l.id = cl.link_id \
                 WHERE l.user_id = $1 AND l.deleted_at IS NULL \
                   AND cl.clicked_at >= $2 AND cl.clicked_at <= $3 \
                 GROUP BY 1, 2 ORDER BY clicks DESC LIMIT 10",
            )
            .bind::<diesel::sql_types::Uuid, _>(uid)
            .bind::<diesel::sql_types::Timestamptz, _>(start)
            .bind::<diesel::sql_types::Timestamptz, _>(end)
            .load::<BestTimeRow>(&mut conn)
            .await?
        } else {
            diesel::sql_query(
                "SELECT EXTRACT(HOUR FROM cl.clicked_at)::int AS hour, \
                        EXTRACT(DOW FROM cl.clicked_at)::int AS day_of_week, \
                        COUNT(*) AS clicks \
                 FROM click_logs cl JOIN links l ON l.id = cl.link_id \
                 WHERE l.deleted_at IS NULL \
                   AND cl.clicked_at >= $1 AND cl.clicked_at <= $2 \
                 GROUP BY 1, 2 ORDER BY clicks DESC LIMIT 10",
            )
            .bind::<diesel::sql_types::Timestamptz, _>(start)
            .bind::<diesel::sql_types::Timestamptz, _>(end)
            .load::<BestTimeRow>(&mut conn)
            .await?
        };

        Ok(rows
            .into_iter()
            .map(|r| BestPostingTime {
                hour: r.hour,
                day_of_week: WEEKDAY_NAMES
                    .get(r.day_of_week as usize)
                    .copied()
                    .unwrap_or("unknown")
                    .to_string(),
                clicks: r.clicks,
            })
            .collect())
    }

    /// Full performance report composed of the other builders
    pub async fn performance_report(
        &self,
        user_id: Option<Uuid>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<PerformanceReport, ServiceError> {
        let end = end_date.unwrap_or_else(Utc::now);
        let start = start_date.unwrap_or_else(|| end - Duration::days(30));
        if start >= end {
            return Err(ServiceError::ValidationError(
                "start_date must be before end_date".to_string(),
            ));
        }
        let days = (end - start).num_days().clamp(1, MAX_REPORT_DAYS);

        let dashboard_stats = self.dashboard_stats(user_id, days).await?;

        let user_performance = match user_id {
            Some(uid) => match self.user_performance(uid, days).await {
                Ok(performance) => Some(performance),
                Err(ServiceError::NotFound) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let trending_analysis = self.trending_analysis(days.min(7)).await?;
        let best_posting_times = self.best_posting_times(user_id, start, end).await?;
        let recommendations = build_recommendations(&dashboard_stats, user_performance.as_ref());

        Ok(PerformanceReport {
            report_period: ReportPeriod {
                start_date: start,
                end_date: end,
                days,
            },
            dashboard_stats,
            user_performance,
            trending_analysis,
            best_posting_times,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    /// Leaderboard across every active user
    pub async fn team_leaderboard(&self, days: i64) -> Result<Leaderboard, ServiceError> {
        let days = days.clamp(1, MAX_REPORT_DAYS);
        let mut conn = self.conn().await?;

        let user_ids: Vec<Uuid> = User::list_active(&mut conn)
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?
            .into_iter()
            .map(|user| user.id)
            .collect();
        drop(conn);

        if user_ids.is_empty() {
            return Ok(Leaderboard {
                leaderboard: Vec::new(),
                group_stats: None,
                period_days: days,
            });
        }

        let comparison = self.comparative_analysis(&user_ids, days).await?;
        let group_stats = comparison.group_stats;

        let leaderboard = comparison
            .users
            .into_iter()
            .map(|performance| {
                let badge = badge_for(
                    performance.rank.unwrap_or(usize::MAX),
                    performance.performance_score,
                );
                LeaderboardEntry { performance, badge }
            })
            .collect();

        Ok(Leaderboard {
            leaderboard,
            group_stats: Some(group_stats),
            period_days: days,
        })
    }

    /// Clicks in the last hour / day, latest clicks, users active recently
    pub async fn realtime_stats(&self) -> Result<RealtimeStats, ServiceError> {
        let now = Utc::now();
        let mut conn = self.conn().await?;

        let recent_clicks_1h: i64 = click_logs::table
            .inner_join(links::table)
            .filter(click_logs::clicked_at.ge(now - Duration::hours(1)))
            .filter(links::deleted_at.is_null())
            .count()
            .get_result(&mut conn)
            .await?;

        let recent_clicks_24h: i64 = click_logs::table
            .inner_join(links::table)
            .filter(click_logs::clicked_at.ge(now - Duration::days(1)))
            .filter(links::deleted_at.is_null())
            .count()
            .get_result(&mut conn)
            .await?;

        let active_users_15m = diesel::sql_query(
            "SELECT COUNT(DISTINCT l.user_id) AS count \
             FROM click_logs cl JOIN links l ON l.id = cl.link_id \
             WHERE cl.clicked_at >= $1 AND l.deleted_at IS NULL AND l.user_id IS NOT NULL",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(now - Duration::minutes(15))
        .get_result::<CountRow>(&mut conn)
        .await?
        .count;

        let latest_clicks = diesel::sql_query(
            "SELECT cl.clicked_at AS clicked_at, l.title AS title, \
                    l.short_code AS short_code, cl.country AS country, \
                    cl.device_type AS device_type \
             FROM click_logs cl JOIN links l ON l.id = cl.link_id \
             WHERE l.deleted_at IS NULL \
             ORDER BY cl.clicked_at DESC LIMIT 10",
        )
        .load::<LatestClickRow>(&mut conn)
        .await?
        .into_iter()
        .map(|r| LatestClick {
            clicked_at: r.clicked_at,
            url_title: r.title,
            short_code: r.short_code,
            country: r.country.unwrap_or_else(|| "unknown".to_string()),
            device_type: r.device_type.unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

        Ok(RealtimeStats {
            recent_clicks_1h,
            recent_clicks_24h,
            active_users_15m,
            latest_clicks,
            last_updated: now,
        })
    }
}

// =============================================================================
// CSV EXPORT
// =============================================================================

/// Flatten a performance report into CSV bytes
pub fn report_to_csv(report: &PerformanceReport) -> Result<Vec<u8>, ServiceError> {
    // Rows vary in width, so the writer must be flexible
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let write =
        |writer: &mut csv::Writer<Vec<u8>>, row: &[String]| -> Result<(), ServiceError> {
            writer
                .write_record(row)
                .map_err(|e| ServiceError::DatabaseError(e.to_string()))
        };

    write(
        &mut writer,
        &["Report".to_string(), "Rafah performance report".to_string()],
    )?;
    write(
        &mut writer,
        &[
            "Report period".to_string(),
            format!(
                "{} to {}",
                report.report_period.start_date.to_rfc3339(),
                report.report_period.end_date.to_rfc3339()
            ),
        ],
    )?;
    write(
        &mut writer,
        &[
            "Generated at".to_string(),
            report.generated_at.to_rfc3339(),
        ],
    )?;
    write(&mut writer, &[])?;

    let stats = &report.dashboard_stats;
    write(&mut writer, &["Overview".to_string()])?;
    write(
        &mut writer,
        &["Total links".to_string(), stats.total_urls.to_string()],
    )?;
    write(
        &mut writer,
        &["Active links".to_string(), stats.active_urls.to_string()],
    )?;
    write(
        &mut writer,
        &["Expired links".to_string(), stats.expired_urls.to_string()],
    )?;
    write(
        &mut writer,
        &["Total clicks".to_string(), stats.total_clicks.to_string()],
    )?;
    write(
        &mut writer,
        &[
            "Clicks in period".to_string(),
            stats.period_clicks.to_string(),
        ],
    )?;
    write(
        &mut writer,
        &[
            "Click-through rate".to_string(),
            format!("{}%", stats.click_through_rate),
        ],
    )?;
    write(&mut writer, &[])?;

    if let Some(ref perf) = report.user_performance {
        write(&mut writer, &["User performance".to_string()])?;
        write(
            &mut writer,
            &["Username".to_string(), perf.username.clone()],
        )?;
        write(
            &mut writer,
            &["Full name".to_string(), perf.full_name.clone()],
        )?;
        write(
            &mut writer,
            &[
                "Performance score".to_string(),
                perf.performance_score.to_string(),
            ],
        )?;
        write(
            &mut writer,
            &[
                "Average clicks per link".to_string(),
                perf.avg_clicks_per_url.to_string(),
            ],
        )?;
        write(&mut writer, &[])?;
    }

    if !stats.top_urls.is_empty() {
        write(&mut writer, &["Top links".to_string()])?;
        write(
            &mut writer,
            &[
                "Title".to_string(),
                "Short code".to_string(),
                "Clicks".to_string(),
            ],
        )?;
        for url in &stats.top_urls {
            write(
                &mut writer,
                &[
                    url.title.clone().unwrap_or_default(),
                    url.short_code.clone(),
                    url.click_count.to_string(),
                ],
            )?;
        }
        write(&mut writer, &[])?;
    }

    if !report.recommendations.is_empty() {
        write(&mut writer, &["Recommendations".to_string()])?;
        write(
            &mut writer,
            &[
                "Type".to_string(),
                "Title".to_string(),
                "Description".to_string(),
                "Priority".to_string(),
            ],
        )?;
        for rec in &report.recommendations {
            write(
                &mut writer,
                &[
                    rec.kind.clone(),
                    rec.title.clone(),
                    rec.description.clone(),
                    rec.priority.clone(),
                ],
            )?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_score_caps() {
        // Each component saturates at its cap: 20 + 30 + 20 + 30 = 100
        assert_eq!(performance_score(1000, 10000, 1000, 10000, 30), 100.0);

        // No activity at all
        assert_eq!(performance_score(0, 0, 0, 0, 30), 0.0);

        // Productivity component alone: 3 urls -> 6 points, plus full
        // activity ratio -> 20 points
        assert_eq!(performance_score(3, 0, 3, 0, 30), 26.0);
    }

    #[test]
    fn test_performance_score_partial() {
        // 5 urls (10) + 100 clicks (10) + all active (20) + 15 clicks over
        // 30 days (1.0 avg -> 1 point... 0.5*2 = 1.0)
        let score = performance_score(5, 100, 5, 15, 30);
        assert_eq!(score, 41.0);
    }

    #[test]
    fn test_zero_filled_days_covers_range() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let mut counts = HashMap::new();
        counts.insert(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), 7);

        let series = zero_filled_days(&counts, start, end);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].clicks, 0);
        assert_eq!(series[2].clicks, 7);
        assert_eq!(series[4].clicks, 0);
    }

    #[test]
    fn test_badges_by_rank_and_score() {
        assert_eq!(badge_for(1, 10.0).unwrap().kind, "gold");
        assert_eq!(badge_for(2, 10.0).unwrap().kind, "silver");
        assert_eq!(badge_for(3, 10.0).unwrap().kind, "bronze");
        assert_eq!(badge_for(4, 85.0).unwrap().kind, "star");
        assert_eq!(badge_for(9, 65.0).unwrap().kind, "thumbs-up");
        assert!(badge_for(9, 30.0).is_none());
    }

    fn empty_dashboard() -> DashboardStats {
        DashboardStats {
            total_urls: 0,
            active_urls: 0,
            expired_urls: 0,
            total_clicks: 0,
            period_clicks: 0,
            new_urls: 0,
            click_through_rate: 0.0,
            top_urls: Vec::new(),
            period_days: 30,
        }
    }

    #[test]
    fn test_recommendations_low_ctr() {
        let dashboard = empty_dashboard();
        let recs = build_recommendations(&dashboard, None);
        assert!(recs.iter().any(|r| r.kind == "improvement"));
    }

    #[test]
    fn test_recommendations_expired_links() {
        let mut dashboard = empty_dashboard();
        dashboard.click_through_rate = 50.0;
        dashboard.expired_urls = 5;
        dashboard.active_urls = 2;
        let recs = build_recommendations(&dashboard, None);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, "maintenance");
    }

    #[test]
    fn test_csv_export_contains_sections() {
        let report = PerformanceReport {
            report_period: ReportPeriod {
                start_date: Utc::now() - Duration::days(30),
                end_date: Utc::now(),
                days: 30,
            },
            dashboard_stats: DashboardStats {
                total_urls: 3,
                active_urls: 2,
                expired_urls: 1,
                total_clicks: 40,
                period_clicks: 12,
                new_urls: 1,
                click_through_rate: 12.5,
                top_urls: vec![TopUrlSummary {
                    id: Uuid::new_v4(),
                    title: Some("Launch page".to_string()),
                    short_code: "abc123".to_string(),
                    click_count: 40,
                    created_at: Utc::now(),
                }],
                period_days: 30,
            },
            user_performance: None,
            trending_analysis: TrendingAnalysis {
                trending_urls: Vec::new(),
                active_users: Vec::new(),
                hourly_trends: Vec::new(),
                period_days: 7,
            },
            best_posting_times: Vec::new(),
            recommendations: Vec::new(),
            generated_at: Utc::now(),
        };

        let bytes = report_to_csv(&report).expect("CSV export failed");
        let text = String::from_utf8(bytes).expect("CSV should be valid UTF-8");
        assert!(text.contains("Rafah performance report"));
        assert!(text.contains("Total links,3"));
        assert!(text.contains("abc123"));
    }
}
