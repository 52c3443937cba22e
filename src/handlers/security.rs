// Security and audit handlers: audit logs, security status, IP blocking
// and runtime security settings

use axum::{
    extract::{Extension, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    app::AppState,
    app_config::SecuritySettings,
    middleware::{auth::AuthenticatedUser, security::ClientInfo},
    models::audit_log::{AuditEventType, AuditLogFilters, AuditSeverity},
    services::audit::AuditEntry,
    utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct AuditStatsParams {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BlockIpRequest {
    pub ip_address: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockIpRequest {
    pub ip_address: String,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub days_to_keep: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub max_login_attempts: Option<u32>,
    pub lockout_duration: Option<u64>,
    pub rate_limit_requests: Option<u32>,
    pub rate_limit_window: Option<u64>,
    pub password_min_length: Option<usize>,
    pub require_strong_password: Option<bool>,
}

/// GET /api/v1/security/audit-logs
pub async fn audit_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(filters): Query<AuditLogFilters>,
) -> Response {
    if let Err(e) = auth_user.require_permission("audit.view") {
        return e.into_response();
    }

    match state.audit_logger.query(&filters).await {
        Ok(page) => Json(json!({ "success": true, "data": page })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/security/audit-statistics
pub async fn audit_statistics(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<AuditStatsParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("audit.view") {
        return e.into_response();
    }

    match state
        .audit_logger
        .statistics(params.days.unwrap_or(30))
        .await
    {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/security/status
pub async fn security_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    match security_status_inner(&state, &auth_user).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn security_status_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("security.view")?;

    let week_ago = Utc::now() - Duration::days(7);

    let failed_logins = state
        .audit_logger
        .count_events(AuditEventType::LoginFailed, week_ago)
        .await?;
    let security_violations = state
        .audit_logger
        .count_events(AuditEventType::SecurityViolation, week_ago)
        .await?;
    let suspicious_activities = state
        .audit_logger
        .count_events(AuditEventType::SuspiciousActivity, week_ago)
        .await?;

    let blocked_ips_count = state.security_manager.blocked_ip_count();
    let top_suspicious_ips: Vec<serde_json::Value> = state
        .security_manager
        .top_failing_ips(10)
        .into_iter()
        .map(|(ip, attempts)| json!({ "ip": ip, "attempts": attempts }))
        .collect();

    // Simple weighted deductions from a perfect score
    let mut security_score: i64 = 100;
    if failed_logins > 50 {
        security_score -= 20;
    } else if failed_logins > 20 {
        security_score -= 10;
    }
    if security_violations > 0 {
        security_score -= 30;
    }
    if suspicious_activities > 10 {
        security_score -= 15;
    }
    if blocked_ips_count > 10 {
        security_score -= 10;
    }
    let security_score = security_score.max(0);

    let security_level = if security_score >= 70 {
        "high"
    } else if security_score >= 50 {
        "medium"
    } else {
        "low"
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "security_score": security_score,
            "security_level": security_level,
            "failed_logins_count": failed_logins,
            "security_violations_count": security_violations,
            "suspicious_activities_count": suspicious_activities,
            "blocked_ips_count": blocked_ips_count,
            "top_suspicious_ips": top_suspicious_ips,
            "last_updated": Utc::now().to_rfc3339(),
        }
    }))
    .into_response())
}

/// POST /api/v1/security/block-ip
pub async fn block_ip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<BlockIpRequest>,
) -> Response {
    if let Err(e) = auth_user.require_permission("security.manage") {
        return e.into_response();
    }

    if request.ip_address.parse::<std::net::IpAddr>().is_err() {
        return ServiceError::ValidationError("A valid IP address is required".to_string())
            .into_response();
    }

    state.security_manager.block_ip(&request.ip_address);

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::IpBlocked)
                .severity(AuditSeverity::High)
                .actor(auth_user.user_id, &auth_user.username)
                .additional_data(json!({
                    "blocked_ip": request.ip_address,
                    "reason": request.reason.clone().unwrap_or_else(|| "manual block".to_string()),
                })),
            &client.request_context("/api/v1/security/block-ip", "POST"),
        )
        .await;

    Json(json!({
        "success": true,
        "message": format!("IP address {} blocked successfully", request.ip_address),
    }))
    .into_response()
}

/// POST /api/v1/security/unblock-ip
pub async fn unblock_ip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<UnblockIpRequest>,
) -> Response {
    if let Err(e) = auth_user.require_permission("security.manage") {
        return e.into_response();
    }

    state.security_manager.unblock_ip(&request.ip_address);

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::IpUnblocked)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .additional_data(json!({ "unblocked_ip": request.ip_address })),
            &client.request_context("/api/v1/security/unblock-ip", "POST"),
        )
        .await;

    Json(json!({
        "success": true,
        "message": format!("IP address {} unblocked successfully", request.ip_address),
    }))
    .into_response()
}

/// GET /api/v1/security/blocked-ips
pub async fn blocked_ips(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    if let Err(e) = auth_user.require_permission("security.view") {
        return e.into_response();
    }

    let details = state.security_manager.blocked_ip_details();
    Json(json!({
        "success": true,
        "data": {
            "total_count": details.len(),
            "blocked_ips": details,
        }
    }))
    .into_response()
}

/// POST /api/v1/security/cleanup-audit-logs
pub async fn cleanup_audit_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<CleanupRequest>,
) -> Response {
    match cleanup_inner(&state, &auth_user, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn cleanup_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    request: CleanupRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("audit.manage")?;

    let days_to_keep = request.days_to_keep.unwrap_or(365);
    if days_to_keep < 30 {
        return Err(ServiceError::ValidationError(
            "Audit logs must be kept for at least 30 days".to_string(),
        ));
    }

    let deleted_count = state.audit_logger.cleanup_old_logs(days_to_keep).await?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::AuditLogCleanup)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .additional_data(json!({
                    "days_to_keep": days_to_keep,
                    "deleted_count": deleted_count,
                })),
            &client.request_context("/api/v1/security/cleanup-audit-logs", "POST"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {} old audit logs", deleted_count),
        "deleted_count": deleted_count,
    }))
    .into_response())
}

/// GET /api/v1/security/settings
pub async fn get_security_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    if let Err(e) = auth_user.require_permission("security.view") {
        return e.into_response();
    }

    Json(json!({
        "success": true,
        "data": state.security_manager.settings(),
    }))
    .into_response()
}

/// PUT /api/v1/security/settings
pub async fn update_security_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Response {
    match update_settings_inner(&state, &auth_user, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn update_settings_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    request: UpdateSettingsRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("security.manage")?;

    let old_settings: SecuritySettings = state.security_manager.settings();
    let mut settings = old_settings.clone();

    if let Some(value) = request.max_login_attempts {
        if !(1..=20).contains(&value) {
            return Err(ServiceError::ValidationError(
                "max_login_attempts must be between 1 and 20".to_string(),
            ));
        }
        settings.max_login_attempts = value;
    }

    if let Some(value) = request.lockout_duration {
        if !(60..=86400).contains(&value) {
            return Err(ServiceError::ValidationError(
                "lockout_duration must be between 60 and 86400 seconds".to_string(),
            ));
        }
        settings.lockout_duration = value;
    }

    if let Some(value) = request.rate_limit_requests {
        if !(10..=1000).contains(&value) {
            return Err(ServiceError::ValidationError(
                "rate_limit_requests must be between 10 and 1000".to_string(),
            ));
        }
        settings.rate_limit_requests = value;
    }

    if let Some(value) = request.rate_limit_window {
        if !(60..=86400).contains(&value) {
            return Err(ServiceError::ValidationError(
                "rate_limit_window must be between 60 and 86400 seconds".to_string(),
            ));
        }
        settings.rate_limit_window = value;
    }

    if let Some(value) = request.password_min_length {
        if !(6..=50).contains(&value) {
            return Err(ServiceError::ValidationError(
                "password_min_length must be between 6 and 50".to_string(),
            ));
        }
        settings.password_min_length = value;
    }

    if let Some(value) = request.require_strong_password {
        settings.require_strong_password = value;
    }

    state.security_manager.update_settings(settings.clone());

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::SystemConfigChanged)
                .severity(AuditSeverity::High)
                .actor(auth_user.user_id, &auth_user.username)
                .old_values(serde_json::to_value(&old_settings).unwrap_or_default())
                .new_values(serde_json::to_value(&settings).unwrap_or_default())
                .additional_data(json!({ "config_type": "security_settings" })),
            &client.request_context("/api/v1/security/settings", "PUT"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Security settings updated successfully",
        "data": settings,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialize_shape() {
        let settings = SecuritySettings::default();
        let value = serde_json::to_value(&settings).expect("serialize settings");
        assert_eq!(value["max_login_attempts"], 5);
        assert_eq!(value["rate_limit_window"], 3600);
    }
}
