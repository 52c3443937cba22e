// Admin user management handlers

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
        role::Role,
        user::{NewUser, User, UserResponse, UserUpdate},
    },
    services::audit::AuditEntry,
    utils::{
        password::{hash_password, validate_password_strength},
        service_error::ServiceError,
    },
};

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 80, message = "Username must be 3-80 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,

    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: Option<String>,

    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(params): Query<ListUsersParams>,
) -> Response {
    if let Err(e) = auth_user.require_permission("users.view") {
        return e.into_response();
    }

    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return ServiceError::DatabaseError(e.to_string()).into_response(),
    };

    match User::list(&mut conn, params.include_deleted).await {
        Ok(users) => {
            let data: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();
            Json(json!({ "success": true, "data": data })).into_response()
        },
        Err(e) => ServiceError::DatabaseError(e.to_string()).into_response(),
    }
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    match create_user_inner(&state, &auth_user, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn create_user_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    request: CreateUserRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("users.create")?;
    request.validate()?;

    validate_password_strength(&request.password, &state.security_manager.settings())
        .map_err(ServiceError::ValidationError)?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    if User::exists_by_username_or_email(&mut conn, &request.username, &request.email)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?
    {
        return Err(ServiceError::Conflict(
            "A user with this username or email".to_string(),
        ));
    }

    if let Some(role_id) = request.role_id {
        Role::find_by_id(&mut conn, role_id)
            .await
            .map_err(|_| ServiceError::ValidationError("Unknown role".to_string()))?;
    }

    let user = User::create(
        &mut conn,
        NewUser {
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: hash_password(&request.password)?,
            full_name: request.full_name.clone(),
            phone: request.phone.clone(),
            department: request.department.clone(),
            position: request.position.clone(),
            is_admin: request.is_admin,
            role_id: request.role_id,
        },
    )
    .await
    .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserCreated)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("user", user.id)
                .new_values(json!({
                    "username": user.username,
                    "email": user.email,
                    "is_admin": user.is_admin,
                    "role_id": user.role_id,
                })),
            &client.request_context("/api/v1/users", "POST"),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "data": UserResponse::from(&user),
        })),
    )
        .into_response())
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Response {
    match update_user_inner(&state, &auth_user, &client, user_id, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn update_user_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    user_id: Uuid,
    request: UpdateUserRequest,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("users.edit")?;
    request.validate()?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_by_id(&mut conn, user_id)
        .await
        .map_err(|_| ServiceError::NotFound)?;

    let role_changed = request.role_id.is_some() && request.role_id != user.role_id;
    if let Some(role_id) = request.role_id {
        Role::find_by_id(&mut conn, role_id)
            .await
            .map_err(|_| ServiceError::ValidationError("Unknown role".to_string()))?;
    }

    let password_hash = match request.password {
        Some(ref password) => {
            validate_password_strength(password, &state.security_manager.settings())
                .map_err(ServiceError::ValidationError)?;
            Some(hash_password(password)?)
        },
        None => None,
    };

    let old_values = json!({
        "email": user.email,
        "full_name": user.full_name,
        "is_admin": user.is_admin,
        "is_active": user.is_active,
        "role_id": user.role_id,
    });

    let updated = User::update(
        &mut conn,
        user_id,
        UserUpdate {
            email: request.email,
            password_hash,
            full_name: request.full_name,
            phone: request.phone.map(Some),
            department: request.department.map(Some),
            position: request.position.map(Some),
            is_admin: request.is_admin,
            is_active: request.is_active,
            role_id: request.role_id.map(Some),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| match e {
        crate::models::user::UserError::NotFound => ServiceError::NotFound,
        other => ServiceError::DatabaseError(other.to_string()),
    })?;

    let context = client.request_context("/api/v1/users", "PUT");

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserUpdated)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("user", updated.id)
                .old_values(old_values)
                .new_values(json!({
                    "email": updated.email,
                    "full_name": updated.full_name,
                    "is_admin": updated.is_admin,
                    "is_active": updated.is_active,
                    "role_id": updated.role_id,
                })),
            &context,
        )
        .await;

    if role_changed {
        state
            .audit_logger
            .log_event(
                AuditEntry::new(AuditEventType::UserRoleChanged)
                    .severity(AuditSeverity::Medium)
                    .actor(auth_user.user_id, &auth_user.username)
                    .resource("user", updated.id)
                    .additional_data(json!({ "role_id": updated.role_id })),
                &context,
            )
            .await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "data": UserResponse::from(&updated),
    }))
    .into_response())
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match delete_user_inner(&state, &auth_user, &client, user_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn delete_user_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    user_id: Uuid,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("users.delete")?;

    if auth_user.user_id == user_id {
        return Err(ServiceError::ValidationError(
            "You cannot delete your own account".to_string(),
        ));
    }

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_by_id(&mut conn, user_id)
        .await
        .map_err(|_| ServiceError::NotFound)?;

    let deleted = User::soft_delete(&mut conn, user_id)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserDeleted)
                .severity(AuditSeverity::High)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("user", deleted.id)
                .old_values(json!({
                    "username": user.username,
                    "email": user.email,
                    "is_active": user.is_active,
                })),
            &client.request_context("/api/v1/users", "DELETE"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    }))
    .into_response())
}

/// POST /api/v1/users/{id}/restore
pub async fn restore_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match restore_user_inner(&state, &auth_user, &client, user_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn restore_user_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    user_id: Uuid,
) -> Result<Response, ServiceError> {
    auth_user.require_permission("users.restore")?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_by_id(&mut conn, user_id)
        .await
        .map_err(|_| ServiceError::NotFound)?;

    if user.deleted_at.is_none() {
        return Err(ServiceError::ValidationError(
            "User is not deleted".to_string(),
        ));
    }

    let restored = User::restore(&mut conn, user_id)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserRestored)
                .severity(AuditSeverity::Medium)
                .actor(auth_user.user_id, &auth_user.username)
                .resource("user", restored.id),
            &client.request_context("/api/v1/users", "POST"),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "User restored successfully",
        "data": UserResponse::from(&restored),
    }))
    .into_response())
}
