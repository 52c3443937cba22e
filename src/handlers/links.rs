// Link management handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, security::ClientInfo},
    models::{
        audit_log::{AuditEventType, AuditSeverity},
        link::{CreateLinkRequest, UpdateLinkRequest},
    },
    services::{analytics::AnalyticsEngine, audit::AuditEntry, link::LinkService},
    utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct ListLinksParams {
    #[serde(default)]
    pub include_deleted: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub days: Option<i64>,
}

/// POST /api/v1/links
pub async fn create_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<CreateLinkRequest>,
) -> Response {
    if let Err(e) = auth_user.require_permission("urls.create") {
        return e.into_response();
    }

    let link_service = LinkService::new(&state);
    match link_service.create_link(auth_user.user_id, request).await {
        Ok(response) => {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::UrlCreated)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("url", response.id)
                        .new_values(json!({
                            "short_code": response.short_code,
                            "original_url": response.original_url,
                        })),
                    &client.request_context("/api/v1/links", "POST"),
                )
                .await;

            (
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": "Short link created successfully",
                    "data": response,
                })),
            )
                .into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/links (permission-gated view of every link)
pub async fn list_all_links(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<ListLinksParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("urls.view_all") {
        return e.into_response();
    }

    let link_service = LinkService::new(&state);
    let result = match params.user_id {
        Some(user_id) => {
            link_service
                .list_user_links(user_id, params.include_deleted)
                .await
        },
        None => link_service.list_all_links(params.include_deleted).await,
    };

    match result {
        Ok(links) => Json(json!({ "success": true, "data": links })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/links/mine
pub async fn list_my_links(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<ListLinksParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("urls.view_own") {
        return e.into_response();
    }

    let link_service = LinkService::new(&state);
    match link_service
        .list_user_links(auth_user.user_id, params.include_deleted)
        .await
    {
        Ok(links) => Json(json!({ "success": true, "data": links })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/links/{id}
pub async fn get_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(link_id): Path<Uuid>,
) -> Response {
    let link_service = LinkService::new(&state);

    let link = match link_service.get_link(link_id).await {
        Ok(link) => link,
        Err(e) => return e.into_response(),
    };

    let is_owner = link.user_id == Some(auth_user.user_id);
    if !auth_user.has_permission("urls.view_all") && !is_owner {
        return ServiceError::Forbidden.into_response();
    }

    Json(json!({
        "success": true,
        "data": link.to_response(link_service.base_url()),
    }))
    .into_response()
}

/// PUT /api/v1/links/{id}
pub async fn update_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(link_id): Path<Uuid>,
    Json(request): Json<UpdateLinkRequest>,
) -> Response {
    let link_service = LinkService::new(&state);

    let link = match link_service.get_link(link_id).await {
        Ok(link) => link,
        Err(e) => return e.into_response(),
    };

    let is_owner = link.user_id == Some(auth_user.user_id);
    let can_edit = auth_user.has_permission("urls.edit_all")
        || (auth_user.has_permission("urls.edit_own") && is_owner);
    if !can_edit {
        return ServiceError::Forbidden.into_response();
    }

    match link_service.update_link(link_id, request).await {
        Ok(response) => {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::UrlUpdated)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("url", link_id)
                        .old_values(json!({
                            "original_url": link.original_url,
                            "title": link.title,
                            "is_active": link.is_active,
                        }))
                        .new_values(json!({
                            "original_url": response.original_url,
                            "title": response.title,
                            "is_active": response.is_active,
                        })),
                    &client.request_context("/api/v1/links", "PUT"),
                )
                .await;

            Json(json!({
                "success": true,
                "message": "Link updated successfully",
                "data": response,
            }))
            .into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/v1/links/{id}
pub async fn delete_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(link_id): Path<Uuid>,
) -> Response {
    let link_service = LinkService::new(&state);

    let link = match link_service.get_link(link_id).await {
        Ok(link) => link,
        Err(e) => return e.into_response(),
    };

    let is_owner = link.user_id == Some(auth_user.user_id);
    let can_delete = auth_user.has_permission("urls.delete_all")
        || (auth_user.has_permission("urls.delete_own") && is_owner);
    if !can_delete {
        return ServiceError::Forbidden.into_response();
    }

    match link_service.soft_delete_link(link_id).await {
        Ok(()) => {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::UrlDeleted)
                        .severity(AuditSeverity::Medium)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("url", link_id)
                        .old_values(json!({
                            "short_code": link.short_code,
                            "original_url": link.original_url,
                        })),
                    &client.request_context("/api/v1/links", "DELETE"),
                )
                .await;

            Json(json!({
                "success": true,
                "message": "Link deleted successfully",
            }))
            .into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/links/{id}/restore
pub async fn restore_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(link_id): Path<Uuid>,
) -> Response {
    if let Err(e) = auth_user.require_permission("urls.delete_all") {
        return e.into_response();
    }

    let link_service = LinkService::new(&state);
    match link_service.restore_link(link_id).await {
        Ok(response) => {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::UrlRestored)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("url", link_id),
                    &client.request_context("/api/v1/links", "POST"),
                )
                .await;

            Json(json!({
                "success": true,
                "message": "Link restored successfully",
                "data": response,
            }))
            .into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/links/{id}/stats
pub async fn get_link_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(link_id): Path<Uuid>,
    Query(params): Query<StatsParams>,
) -> Response {
    let link_service = LinkService::new(&state);

    let link = match link_service.get_link(link_id).await {
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
        .url_detailed_stats(link_id, params.days.unwrap_or(30))
        .await
    {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(e) => e.into_response(),
    }
}
