// HTTP handlers and route assembly

pub mod analytics;
pub mod auth;
pub mod links;
pub mod redirect;
pub mod roles;
pub mod security;
pub mod users;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    app::AppState,
    db,
    middleware::{auth_middleware::auth_middleware, security::security_middleware},
};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let (overall_healthy, postgres_health) = match db::check_diesel_health(&state.diesel_pool).await
    {
        Ok(_) => (
            true,
            serde_json::json!({
                "status": "healthy",
                "error": null
            }),
        ),
        Err(e) => (
            false,
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            }),
        ),
    };

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "rafah-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Assemble the full application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token));

    let protected_auth = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::get_current_user))
        .route("/profile", put(auth::update_profile))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/{id}/restore", post(users::restore_user))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let role_routes = Router::new()
        .route("/", get(roles::list_roles).post(roles::create_role))
        .route(
            "/{id}",
            put(roles::update_role).delete(roles::delete_role),
        )
        .route("/{id}/restore", post(roles::restore_role))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let link_routes = Router::new()
        .route("/", post(links::create_link).get(links::list_all_links))
        .route("/mine", get(links::list_my_links))
        .route(
            "/{id}",
            get(links::get_link)
                .put(links::update_link)
                .delete(links::delete_link),
        )
        .route("/{id}/restore", post(links::restore_link))
        .route("/{id}/stats", get(links::get_link_stats))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let analytics_routes = Router::new()
        .route("/dashboard-stats", get(analytics::dashboard_stats))
        .route("/my-performance", get(analytics::my_performance))
        .route("/user-performance/{id}", get(analytics::user_performance))
        .route("/url-stats/{id}", get(analytics::url_stats))
        .route(
            "/comparative-analysis",
            post(analytics::comparative_analysis),
        )
        .route("/trending", get(analytics::trending))
        .route("/performance-report", post(analytics::performance_report))
        .route("/export-report", post(analytics::export_report))
        .route("/team-leaderboard", get(analytics::team_leaderboard))
        .route("/realtime", get(analytics::realtime_stats))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let security_routes = Router::new()
        .route("/audit-logs", get(security::audit_logs))
        .route("/audit-statistics", get(security::audit_statistics))
        .route("/status", get(security::security_status))
        .route("/block-ip", post(security::block_ip))
        .route("/unblock-ip", post(security::unblock_ip))
        .route("/blocked-ips", get(security::blocked_ips))
        .route("/cleanup-audit-logs", post(security::cleanup_audit_logs))
        .route(
            "/settings",
            get(security::get_security_settings).put(security::update_security_settings),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let permission_routes = Router::new()
        .route("/", get(roles::list_permissions))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .nest("/auth", public_auth.merge(protected_auth))
        .nest("/users", user_routes)
        .nest("/roles", role_routes)
        .nest("/permissions", permission_routes)
        .nest("/links", link_routes)
        .nest("/analytics", analytics_routes)
        .nest("/security", security_routes);

    // The security pipeline wraps everything, redirects included; only the
    // health probe opts out inside the middleware itself
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .route("/{short_code}", get(redirect::redirect_to_url))
        .route("/{short_code}/info", get(redirect::link_info))
        .layer(from_fn_with_state(state.clone(), security_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = &state.config.cors_allowed_origins;

    if origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
