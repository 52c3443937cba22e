// Redirect handler: turns short codes into 302 redirects with click logging

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::{
    app::AppState,
    services::link::LinkService,
    utils::{client_ip::extract_client_ip, service_error::ServiceError},
};

/// GET /{short_code}
pub async fn redirect_to_url(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(short_code): Path<String>,
) -> Response {
    let link_service = LinkService::new(&state);

    let ip_address = extract_client_ip(&headers, addr.ip());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let referrer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match link_service
        .process_redirect(&short_code, Some(ip_address), user_agent, referrer)
        .await
    {
        Ok(original_url) => {
            info!("Redirecting {} to {}", short_code, original_url);
            // Plain 302 Found; axum's Redirect helpers only cover 303/307/308
            match HeaderValue::from_str(&original_url) {
                Ok(location) => {
                    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
                },
                Err(_) => ServiceError::InternalError.into_response(),
            }
        },
        Err(ServiceError::NotFound) => {
            warn!("Short code not found: {}", short_code);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Link not found" })),
            )
                .into_response()
        },
        Err(ServiceError::Expired) => {
            warn!("Link expired: {}", short_code);
            (
                StatusCode::GONE,
                Json(json!({ "error": "This link has expired" })),
            )
                .into_response()
        },
        Err(e) => {
            warn!("Error processing redirect for {}: {:?}", short_code, e);
            e.into_response()
        },
    }
}

/// GET /{short_code}/info — link metadata without redirecting
pub async fn link_info(
    State(state): State<AppState>,
    Path(short_code): Path<String>,
) -> Response {
    let link_service = LinkService::new(&state);

    match link_service.get_link_by_code(&short_code).await {
        Ok(Some(link)) => Json(json!({
            "success": true,
            "data": {
                "short_code": link.short_code,
                "original_url": link.original_url,
                "title": link.title,
                "description": link.description,
                "clicks": link.click_count,
                "is_expired": link.is_expired(),
                "expires_at": link.expires_at,
                "created_at": link.created_at,
            }
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Link not found" })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
