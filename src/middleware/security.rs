// Security middleware, run before every API request
// Order of checks: IP blocklist, rate limit, header sanity, CSRF for
// mutating methods. Also stashes the client info for handlers and the
// audit logger.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::warn;

use crate::{
    app::AppState,
    models::audit_log::{AuditEventType, AuditSeverity},
    services::audit::{AuditEntry, RequestContext},
    utils::client_ip::extract_client_ip,
};

/// Per-request client information, available to handlers as an Extension
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn request_context(&self, endpoint: &str, method: &str) -> RequestContext {
        RequestContext {
            ip_address: Some(self.ip_address.clone()),
            user_agent: self.user_agent.clone(),
            endpoint: Some(endpoint.to_string()),
            method: Some(method.to_string()),
        }
    }
}

const MUTATING_METHODS: &[Method] = &[Method::POST, Method::PUT, Method::DELETE, Method::PATCH];

/// Paths where no CSRF session can exist yet
const CSRF_EXEMPT_PATHS: &[&str] = &[
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/refresh",
];

pub async fn security_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Health probes bypass the pipeline entirely
    if path == "/health" {
        return next.run(request).await;
    }

    let client_ip = extract_client_ip(&headers, addr.ip());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let client_info = ClientInfo {
        ip_address: client_ip.clone(),
        user_agent: user_agent.clone(),
    };

    // Blocked IP check
    if state.security_manager.is_ip_blocked(&client_ip) {
        warn!("Rejected request from blocked IP: {}", client_ip);
        let blocked_until = state
            .security_manager
            .block_expiry(&client_ip)
            .map(|t| t.to_rfc3339());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Your IP address is temporarily blocked due to suspicious activity",
                "blocked_until": blocked_until
            })),
        )
            .into_response();
    }

    // Sliding-window rate limit
    let rate_limit = state.security_manager.check_rate_limit(&client_ip);
    if !rate_limit.allowed {
        let context = client_info.request_context(&path, method.as_str());
        state
            .audit_logger
            .log_event(
                AuditEntry::new(AuditEventType::RateLimitExceeded)
                    .severity(AuditSeverity::Medium)
                    .failure("rate limit exceeded"),
                &context,
            )
            .await;
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded, please try again later",
                "retry_after": rate_limit.retry_after
            })),
        )
            .into_response();
    }

    // Minimal header sanity: a plausible User-Agent is required
    let ua_ok = user_agent.as_ref().map(|ua| ua.len() >= 10).unwrap_or(false);
    if !ua_ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Unsafe request" })),
        )
            .into_response();
    }

    // Bodied mutating requests must declare a content type
    if MUTATING_METHODS.contains(&method) {
        let has_body = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|len| len > 0)
            .unwrap_or(false);
        if has_body && !request.headers().contains_key(header::CONTENT_TYPE) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Unsafe request" })),
            )
                .into_response();
        }

        // CSRF validation. Disabled in development and test environments,
        // and skipped on endpoints that establish the session in the first
        // place.
        let csrf_applies = !(state.config.is_development() || state.config.is_test())
            && !CSRF_EXEMPT_PATHS.contains(&path.as_str());
        if csrf_applies {
            let session_id = headers
                .get("x-session-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let token = headers
                .get("x-csrf-token")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            if session_id.is_empty()
                || token.is_empty()
                || !state.security_manager.validate_csrf(session_id, token)
            {
                let context = client_info.request_context(&path, method.as_str());
                state
                    .audit_logger
                    .log_event(
                        AuditEntry::new(AuditEventType::SecurityViolation)
                            .severity(AuditSeverity::High)
                            .failure("invalid CSRF token"),
                        &context,
                    )
                    .await;
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Invalid CSRF token" })),
                )
                    .into_response();
            }
        }
    }

    request.extensions_mut().insert(client_info);

    next.run(request).await
}
