// Role and permission management handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, security::ClientInfo},
    models::{
        audit_log::{AuditEventType, AuditSeverity},
        role::{NewRole, Permission, Role, RoleError, RoleResponse, RoleUpdate},
    },
    services::audit::AuditEntry,
    utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct ListRolesParams {
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub include_permissions: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 2, max = 80, message = "Role name must be 2-80 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 120, message = "Display name is required"))]
    pub display_name: String,

    pub description: Option<String>,

    /// Permission names to attach
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 120, message = "Display name must be 1-120 characters"))]
    pub display_name: Option<String>,

    pub description: Option<String>,
    pub is_active: Option<bool>,

    /// When present, replaces the role's permission set
    pub permissions: Option<Vec<String>>,
}

fn map_role_error(error: RoleError) -> ServiceError {
    match error {
        RoleError::NotFound => ServiceError::NotFound,
        RoleError::SystemRole => {
            ServiceError::ValidationError("System roles cannot be deleted".to_string())
        },
        RoleError::Database(e) => ServiceError::DatabaseError(e.to_string()),
    }
}

/// GET /api/v1/roles
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<ListRolesParams>,
) -> Response {
    match list_roles_inner(&state, &auth_user, params).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn list_roles_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    params: ListRolesParams,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("roles.view")?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let roles = Role::list(&mut conn, params.include_deleted)
        .await
        .map_err(map_role_error)?;

    let mut data = Vec::with_capacity(roles.len());
    for role in &roles {
        let mut response = RoleResponse::from(role);
        if params.include_permissions {
            let permissions = role.permissions(&mut conn).await.map_err(map_role_error)?;
            response = response.with_permissions(permissions);
        }
        data.push(response);
    }

    Ok(Json(json!({ "success": true, "data": data })).into_response())
}

/// POST /api/v1/roles
pub async fn create_role(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<CreateRoleRequest>,
) -> Response {
    match create_role_inner(&state, &auth_user, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn create_role_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    request: CreateRoleRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("roles.create")?;
    request.validate()?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    if Role::find_by_name(&mut conn, &request.name)
        .await
        .map_err(map_role_error)?
        .is_some()
    {
        return Err(ServiceError::Conflict("A role with this name".to_string()));
    }

    let role = Role::create(
        &mut conn,
        NewRole {
            name: request.name.clone(),
            display_name: request.display_name.clone(),
            description: request.description.clone(),
            is_system: false,
        },
    )
    .await
    .map_err(map_role_error)?;

    let permissions = Permission::find_by_names(&mut conn, &request.permissions)
        .await
        .map_err(map_role_error)?;
    let permission_ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();
    Role::set_permissions(&mut conn, role.id, permission_ids)
        .await
        .map_err(map_role_error)?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::RoleCreated)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("role", role.id)
                .new_values(json!({
                    "name": role.name,
                    "display_name": role.display_name,
                    "permissions": request.permissions,
                })),
            &client.request_context("/api/v1/roles", "POST"),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Role created successfully",
            "data": RoleResponse::from(&role).with_permissions(permissions),
        })),
    )
        .into_response())
}

/// PUT /api/v1/roles/{id}
pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(role_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Response {
    match update_role_inner(&state, &auth_user, &client, role_id, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn update_role_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    role_id: Uuid,
    request: UpdateRoleRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("roles.edit")?;
    request.validate()?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let role = Role::find_by_id(&mut conn, role_id)
        .await
        .map_err(map_role_error)?;

    let old_permissions: Vec<String> = role
        .permissions(&mut conn)
        .await
        .map_err(map_role_error)?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let updated = Role::update(
        &mut conn,
        role_id,
        RoleUpdate {
            display_name: request.display_name.clone(),
            description: request.description.clone().map(Some),
            is_active: request.is_active,
            ..Default::default()
        },
    )
    .await
    .map_err(map_role_error)?;

    let context = client.request_context("/api/v1/roles", "PUT");

    if let Some(ref permission_names) = request.permissions {
        let permissions = Permission::find_by_names(&mut conn, permission_names)
            .await
            .map_err(map_role_error)?;
        let permission_ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();
        Role::set_permissions(&mut conn, role_id, permission_ids)
            .await
            .map_err(map_role_error)?;

        let granted: Vec<&String> = permission_names
            .iter()
            .filter(|name| !old_permissions.contains(name))
            .collect();
        let revoked: Vec<&String> = old_permissions
            .iter()
            .filter(|name| !permission_names.contains(name))
            .collect();

        if !granted.is_empty() {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::PermissionGranted)
                        .severity(AuditSeverity::Medium)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("role", role_id)
                        .additional_data(json!({ "granted": granted })),
                    &context,
                )
                .await;
        }
        if !revoked.is_empty() {
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::PermissionRevoked)
                        .severity(AuditSeverity::Medium)
                        .actor(auth_user.user_id, &auth_user.username)
                        .resource("role", role_id)
                        .additional_data(json!({ "revoked": revoked })),
                    &context,
                )
                .await;
        }
    }

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::RoleUpdated)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("role", updated.id)
                .old_values(json!({
                    "display_name": role.display_name,
                    "is_active": role.is_active,
                    "permissions": old_permissions,
                }))
                .new_values(json!({
                    "display_name": updated.display_name,
                    "is_active": updated.is_active,
                })),
            &context,
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Role updated successfully",
        "data": RoleResponse::from(&updated),
    }))
    .into_response())
}

/// DELETE /api/v1/roles/{id}
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(role_id): Path<Uuid>,
) -> Response {
    match delete_role_inner(&state, &auth_user, &client, role_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn delete_role_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    role_id: Uuid,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("roles.delete")?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let deleted = Role::soft_delete(&mut conn, role_id)
        .await
        .map_err(map_role_error)?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::RoleDeleted)
                .severity(AuditSeverity::High)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("role", deleted.id)
                .old_values(json!({ "name": deleted.name })),
            &client.request_context("/api/v1/roles", "DELETE"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Role deleted successfully",
    }))
    .into_response())
}

/// POST /api/v1/roles/{id}/restore
pub async fn restore_role(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(role_id): Path<Uuid>,
) -> Response {
    match restore_role_inner(&state, &auth_user, &client, role_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn restore_role_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    role_id: Uuid,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("roles.restore")?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let role = Role::find_by_id(&mut conn, role_id)
        .await
        .map_err(map_role_error)?;
    if role.deleted_at.is_none() {
        return Err(ServiceError::ValidationError(
            "Role is not deleted".to_string(),
        ));
    }

    let restored = Role::restore(&mut conn, role_id)
        .await
        .map_err(map_role_error)?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::RoleRestored)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("role", restored.id),
            &client.request_context("/api/v1/roles", "POST"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Role restored successfully",
        "data": RoleResponse::from(&restored),
    }))
    .into_response())
}

/// GET /api/v1/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    if let Err(e) = auth_user.require_permission("roles.view") {
        return e.into_response();
    }

    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return ServiceError::DatabaseError(e.to_string()).into_response(),
    };

    match Permission::list_active(&mut conn).await {
        Ok(permissions) => {
            // Grouped by category, the way the admin UI renders them
            let mut categories: serde_json::Map<String, serde_json::Value> =
                serde_json::Map::new();
            for permission in permissions {
                let entry = categories
                    .entry(permission.category.clone())
                    .or_insert_with(|| serde_json::Value::Array(Vec::new()));
                if let serde_json::Value::Array(items) = entry {
                    items.push(serde_json::to_value(&permission).unwrap_or_default());
                }
            }
            Json(json!({ "success": true, "data": categories })).into_response()
        },
        Err(e) => map_role_error(e).into_response(),
    }
}
