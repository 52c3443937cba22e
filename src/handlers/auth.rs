// Authentication handlers: register, login, refresh, logout, profile

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{auth::AuthenticatedUser, security::ClientInfo},
    models::{
        audit_log::{AuditEventType, AuditSeverity},
        role::{seed_default_roles_and_permissions, Role},
        user::{NewUser, User, UserResponse, UserUpdate},
    },
    services::audit::AuditEntry,
    utils::{
        password::{hash_password, validate_password_strength, verify_password},
        service_error::ServiceError,
        validation::{trim_and_validate_field, trim_optional_field},
    },
};
use crate::config::permissions::DEFAULT_NEW_USER_ROLE;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
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
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,

    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match register_inner(&state, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn register_inner(
    state: &AppState,
    client: &ClientInfo,
    mut request: RegisterRequest,
) -> Result<Response, ServiceError> {
    request.username =
        trim_and_validate_field(&request.username, "username").map_err(ServiceError::ValidationError)?;
    request.email =
        trim_and_validate_field(&request.email, "email").map_err(ServiceError::ValidationError)?;
    request.full_name = trim_and_validate_field(&request.full_name, "full_name")
        .map_err(ServiceError::ValidationError)?;
    request.phone = trim_optional_field(request.phone.as_deref());
    request.department = trim_optional_field(request.department.as_deref());
    request.position = trim_optional_field(request.position.as_deref());
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

    let password_hash = hash_password(&request.password)?;

    // The first account becomes the admin and seeds the role catalog
    let user_count = User::count_all(&mut conn)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;
    let is_first_user = user_count == 0;

    let role_id = if is_first_user {
        None
    } else {
        Role::find_by_name(&mut conn, DEFAULT_NEW_USER_ROLE)
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?
            .map(|role| role.id)
    };

    let user = User::create(
        &mut conn,
        NewUser {
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
            full_name: request.full_name.clone(),
            phone: request.phone.clone(),
            department: request.department.clone(),
            position: request.position.clone(),
            is_admin: is_first_user,
            role_id,
        },
    )
    .await
    .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    if is_first_user {
        seed_default_roles_and_permissions(&mut conn)
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;
        info!("Seeded default roles and permissions for first user");
    }

    let permissions = user
        .resolve_permissions(&mut conn)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserCreated)
                .severity(AuditSeverity::Medium)
                .actor(user.id, &user.username)
                .resource("user", user.id)
                .new_values(json!({
                    "username": user.username,
                    "email": user.email,
                    "is_admin": user.is_admin,
                })),
            &client.request_context("/api/v1/auth/register", "POST"),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created successfully",
            "user": UserResponse::from(&user).with_permissions(permissions),
        })),
    )
        .into_response())
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match login_inner(&state, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn login_inner(
    state: &AppState,
    client: &ClientInfo,
    request: LoginRequest,
) -> Result<Response, ServiceError> {
    let context = client.request_context("/api/v1/auth/login", "POST");

    if request.username.is_empty() || request.password.is_empty() {
        return Err(ServiceError::ValidationError(
            "Username and password are required".to_string(),
        ));
    }

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_by_username_or_email(&mut conn, &request.username)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = match user {
        Some(user) => user,
        None => {
            state.security_manager.record_failed_login(&client.ip_address);
            state
                .audit_logger
                .log_event(
                    AuditEntry::new(AuditEventType::LoginFailed)
                        .severity(AuditSeverity::Medium)
                        .failure("unknown user")
                        .additional_data(json!({ "identifier": request.username })),
                    &context,
                )
                .await;
            return Err(ServiceError::Unauthorized);
        },
    };

    if !verify_password(&request.password, &user.password_hash)? {
        state.security_manager.record_failed_login(&client.ip_address);
        state
            .audit_logger
            .log_event(
                AuditEntry::new(AuditEventType::LoginFailed)
                    .severity(AuditSeverity::Medium)
                    .actor(user.id, &user.username)
                    .failure("wrong password"),
                &context,
            )
            .await;
        return Err(ServiceError::Unauthorized);
    }

    if !user.is_active || user.deleted_at.is_some() {
        state
            .audit_logger
            .log_event(
                AuditEntry::new(AuditEventType::LoginFailed)
                    .severity(AuditSeverity::Medium)
                    .actor(user.id, &user.username)
                    .failure("account inactive or deleted"),
                &context,
            )
            .await;
        return Err(ServiceError::Unauthorized);
    }

    User::touch_last_login(&mut conn, user.id)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;
    state.security_manager.clear_failed_attempts(&client.ip_address);

    let permissions = user
        .resolve_permissions(&mut conn)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let tokens = state
        .jwt_service
        .issue_token_pair(&user, permissions.clone())?;
    let (session_id, csrf_token) = state.security_manager.create_csrf_session();

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::LoginSuccess)
                .actor(user.id, &user.username)
                .additional_data(json!({ "login_time": Utc::now().to_rfc3339() })),
            &context,
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Logged in successfully",
        "user": UserResponse::from(&user).with_permissions(permissions),
        "tokens": tokens,
        "session_id": session_id,
        "csrf_token": csrf_token,
    }))
    .into_response())
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Response {
    match refresh_inner(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn refresh_inner(state: &AppState, request: RefreshRequest) -> Result<Response, ServiceError> {
    let claims = state
        .jwt_service
        .validate_refresh_token(&request.refresh_token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::Unauthorized)?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_active_by_id(&mut conn, user_id)
        .await
        .map_err(|_| ServiceError::Unauthorized)?;

    let permissions = user
        .resolve_permissions(&mut conn)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let (access_token, expires_in) = state.jwt_service.issue_access_token(&user, permissions)?;

    Ok(Json(json!({
        "success": true,
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    }))
    .into_response())
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<LogoutRequest>,
) -> Response {
    if let Some(ref session_id) = request.session_id {
        state.security_manager.drop_csrf_session(session_id);
    }

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::Logout).actor(auth_user.user_id, &auth_user.username),
            &client.request_context("/api/v1/auth/logout", "POST"),
        )
        .await;

    Json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
    .into_response()
}

/// GET /api/v1/auth/me
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Response {
    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return ServiceError::DatabaseError(e.to_string()).into_response(),
    };

    let user = match User::find_active_by_id(&mut conn, auth_user.user_id).await {
        Ok(user) => user,
        Err(_) => return ServiceError::Unauthorized.into_response(),
    };

    let permissions = match user.resolve_permissions(&mut conn).await {
        Ok(permissions) => permissions,
        Err(e) => return ServiceError::DatabaseError(e.to_string()).into_response(),
    };

    Json(json!({
        "success": true,
        "user": UserResponse::from(&user).with_permissions(permissions),
    }))
    .into_response()
}

/// PUT /api/v1/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientInfo>,
    Json(request): Json<ProfileUpdateRequest>,
) -> Response {
    match update_profile_inner(&state, &auth_user, &client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn update_profile_inner(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    client: &ClientInfo,
    request: ProfileUpdateRequest,
) -> Result<Response, ServiceError> {
    request.validate()?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let user = User::find_active_by_id(&mut conn, auth_user.user_id)
        .await
        .map_err(|_| ServiceError::Unauthorized)?;

    if let Some(ref email) = request.email {
        if email != &user.email {
            let taken = User::exists_by_username_or_email(&mut conn, "", email)
                .await
                .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;
            if taken {
                return Err(ServiceError::Conflict(
                    "Another user with this email".to_string(),
                ));
            }
        }
    }

    let mut update = UserUpdate {
        email: request.email.clone(),
        full_name: request.full_name.clone(),
        phone: request.phone.clone().map(Some),
        department: request.department.clone().map(Some),
        position: request.position.clone().map(Some),
        ..Default::default()
    };

    let mut password_changed = false;
    if let (Some(current), Some(new_password)) =
        (request.current_password.as_ref(), request.new_password.as_ref())
    {
        if !verify_password(current, &user.password_hash)? {
            return Err(ServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password_strength(new_password, &state.security_manager.settings())
            .map_err(ServiceError::ValidationError)?;
        update.password_hash = Some(hash_password(new_password)?);
        password_changed = true;
    }

    let old_values = json!({
        "email": user.email,
        "full_name": user.full_name,
        "phone": user.phone,
        "department": user.department,
        "position": user.position,
    });

    let updated = User::update(&mut conn, user.id, update)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    let context = client.request_context("/api/v1/auth/profile", "PUT");

    state
        .audit_logger
        .log_event(
            AuditEntry::new(AuditEventType::UserUpdated)
                .severity(AuditSeverity::Medium)
                .actor(updated.id, &updated.username)
                .resource("user", updated.id)
                .old_values(old_values)
                .new_values(json!({
                    "email": updated.email,
                    "full_name": updated.full_name,
                    "phone": updated.phone,
                    "department": updated.department,
                    "position": updated.position,
                })),
            &context,
        )
        .await;

    if password_changed {
        state
            .audit_logger
            .log_event(
                AuditEntry::new(AuditEventType::PasswordChanged)
                    .severity(AuditSeverity::Medium)
                    .actor(updated.id, &updated.username)
                    .resource("user", updated.id),
                &context,
            )
            .await;
    }

    let permissions = updated
        .resolve_permissions(&mut conn)
        .await
        .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": UserResponse::from(&updated).with_permissions(permissions),
    }))
    .into_response())
}
