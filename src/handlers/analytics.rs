// Analytics handlers: dashboards, performance, trends, reports and export

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, security::ClientInfo},
    models::audit_log::{AuditEventType, AuditSeverity},
    services::{
        analytics::{report_to_csv, AnalyticsEngine},
        audit::AuditEntry,
        link::LinkService,
    },
    utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    pub days: Option<i64>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ComparativeRequest {
    pub user_ids: Vec<Uuid>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub user_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// GET /api/v1/analytics/dashboard-stats
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<PeriodParams>,
) -> Response {
    let days = params.days.unwrap_or(30);

    // Viewing another user's dashboard needs the all-reports permission
    let user_id = match params.user_id {
        Some(requested) if requested != auth_user.user_id => {
            if let Err(e) = auth_user.require_permission("reports.view_all") {
                return e.into_response();
            }
            Some(requested)
        },
        Some(own) => Some(own),
        None => Some(auth_user.user_id),
    };

    let engine = AnalyticsEngine::new(&state);
    match engine.dashboard_stats(user_id, days).await {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/analytics/my-performance
pub async fn my_performance(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<PeriodParams>,
) -> Response {
    let engine = AnalyticsEngine::new(&state);
    match engine
        .user_performance(auth_user.user_id, params.days.unwrap_or(30))
        .await
    {
        Ok(performance) => Json(json!({ "success": true, "data": performance })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/analytics/user-performance/{id}
pub async fn user_performance(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PeriodParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.view_all") {
        return e.into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine
        .user_performance(user_id, params.days.unwrap_or(30))
        .await
    {
        Ok(performance) => Json(json!({ "success": true, "data": performance })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/analytics/url-stats/{id}
pub async fn url_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(url_id): Path<Uuid>,
    Query(params): Query<PeriodParams>,
) -> Response {
    // Ownership check mirrors the link stats endpoint
    let link_service = LinkService::new(&state);
    let link = match link_service.get_link(url_id).await {
        Ok(link) => link,
        Err(e) => return e.into_response(),
    };

    let is_owner = link.user_id == Some(auth_user.user_id);
    let can_view = auth_user.has_permission("reports.view_all")
        || (auth_user.has_permission("reports.view_own") && is_owner);
    if !can_view {
        return ServiceError::Forbidden.into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine
        .url_detailed_stats(url_id, params.days.unwrap_or(30))
        .await
    {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/analytics/comparative-analysis
pub async fn comparative_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<ComparativeRequest>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.view_all") {
        return e.into_response();
    }

    if request.user_ids.len() < 2 {
        return ServiceError::ValidationError(
            "At least two users are required for comparison".to_string(),
        )
        .into_response();
    }
    if request.user_ids.len() > 10 {
        return ServiceError::ValidationError(
            "At most 10 users can be compared at once".to_string(),
        )
        .into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine
        .comparative_analysis(&request.user_ids, request.days.unwrap_or(30))
        .await
    {
        Ok(comparison) => {
            if comparison.users.len() != request.user_ids.len() {
                return ServiceError::ValidationError(
                    "Some of the requested users do not exist".to_string(),
                )
                .into_response();
            }
            Json(json!({ "success": true, "data": comparison })).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/analytics/trending
pub async fn trending(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<PeriodParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.view_all") {
        return e.into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine.trending_analysis(params.days.unwrap_or(7)).await {
        Ok(trends) => Json(json!({ "success": true, "data": trends })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/analytics/performance-report
pub async fn performance_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<ReportRequest>,
) -> Response {
    let user_id = match resolve_report_user(&auth_user, request.user_id) {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    let engine = AnalyticsEngine::new(&state);
    match engine
        .performance_report(user_id, request.start_date, request.end_date)
        .await
    {
        Ok(report) => Json(json!({ "success": true, "data": report })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/analytics/export-report
pub async fn export_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<ReportRequest>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.export") {
        return e.into_response();
    }

    let user_id = match resolve_report_user(&auth_user, request.user_id) {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    let engine = AnalyticsEngine::new(&state);
    let report = match engine
        .performance_report(user_id, request.start_date, request.end_date)
        .await
    {
        Ok(report) => report,
        Err(e) => return e.into_response(),
    };

    let csv_bytes = match report_to_csv(&report) {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::DataExport)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .additional_data(json!({
                    "format": "csv",
                    "user_id": user_id,
                })),
            &client.request_context("/api/v1/analytics/export-report", "POST"),
        )
        .await;

    let filename = format!(
        "performance_report_{}.csv",
        report.generated_at.format("%Y%m%d_%H%M%S")
    );

    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv_bytes,
    )
        .into_response()
}

/// GET /api/v1/analytics/team-leaderboard
pub async fn team_leaderboard(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<PeriodParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.view_all") {
        return e.into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine.team_leaderboard(params.days.unwrap_or(30)).await {
        Ok(leaderboard) => Json(json!({ "success": true, "data": leaderboard })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/analytics/realtime
pub async fn realtime_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    if let Err(e) = auth_user.require_permission("reports.view_all") {
        return e.into_response();
    }

    let engine = AnalyticsEngine::new(&state);
    match engine.realtime_stats().await {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// A report over someone else's data needs the all-reports permission;
/// otherwise the report defaults to the caller.
fn resolve_report_user(
    auth_user: &AuthenticatedUser,
    requested: Option<Uuid>,
) -> Result<Option<Uuid>, ServiceError> {
    match requested {
        Some(user_id) if user_id != auth_user.user_id => {
            auth_user.require_permission("reports.view_all")?;
            Ok(Some(user_id))
        },
        Some(own) => Ok(Some(own)),
        None => Ok(Some(auth_user.user_id)),
    }
}
