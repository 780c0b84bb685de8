use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true behind HTTPS
        .with_http_only(true);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart framing needs a little room above the CSV limit itself
    let upload_limit = DefaultBodyLimit::max(state.config.upload.max_csv_size + 64 * 1024);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/user/current", get(handlers::auth::current_user))
        .route("/user/profile", put(handlers::auth::update_profile))
        .route("/user/change-password", post(handlers::auth::change_password))
        .route("/user/preferences", put(handlers::auth::update_preferences))
        // User routes
        .route("/users", get(handlers::user::list_users).post(handlers::user::create_user))
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/users/:id/role", put(handlers::user::assign_role))
        // Role routes
        .route("/roles", get(handlers::role::list_roles).post(handlers::role::create_role))
        .route(
            "/roles/:id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route("/permissions", get(handlers::role::list_permissions))
        // Location routes
        .route(
            "/locations",
            get(handlers::location::list_locations).post(handlers::location::create_location),
        )
        .route("/locations/tree", get(handlers::location::location_tree))
        .route("/locations/generate-pods", post(handlers::location::generate_pods))
        .route("/locations/export", get(handlers::location::export_locations))
        .route(
            "/locations/import",
            post(handlers::location::import_locations).layer(upload_limit.clone()),
        )
        .route(
            "/locations/:id",
            get(handlers::location::get_location)
                .put(handlers::location::update_location)
                .delete(handlers::location::delete_location),
        )
        .route("/sites", get(handlers::location::list_sites))
        // Customer routes
        .route(
            "/customers",
            get(handlers::location::list_customers).post(handlers::location::create_customer),
        )
        .route(
            "/customers/:id",
            get(handlers::location::get_customer)
                .put(handlers::location::update_customer)
                .delete(handlers::location::delete_customer),
        )
        // Equipment routes
        .route(
            "/equipment",
            get(handlers::equipment::list_equipment).post(handlers::equipment::create_equipment),
        )
        .route(
            "/equipment/categories",
            get(handlers::equipment::list_categories).post(handlers::equipment::create_category),
        )
        .route("/equipment/export", get(handlers::equipment::export_equipment))
        .route(
            "/equipment/import",
            post(handlers::equipment::import_equipment).layer(upload_limit),
        )
        .route(
            "/equipment/:id",
            get(handlers::equipment::get_equipment)
                .put(handlers::equipment::update_equipment)
                .delete(handlers::equipment::delete_equipment),
        )
        .route("/equipment/:id/components", post(handlers::equipment::add_component))
        .route(
            "/equipment/:id/components/:component_id",
            put(handlers::equipment::update_component).delete(handlers::equipment::delete_component),
        )
        .route("/equipment/:id/timeline", get(handlers::calendar::equipment_timeline))
        // Maintenance routes
        .route(
            "/maintenance/types",
            get(handlers::maintenance::list_types).post(handlers::maintenance::create_type),
        )
        .route(
            "/maintenance/types/:id",
            get(handlers::maintenance::get_type)
                .put(handlers::maintenance::update_type)
                .delete(handlers::maintenance::delete_type),
        )
        .route(
            "/maintenance/activities",
            get(handlers::maintenance::list_activities).post(handlers::maintenance::create_activity),
        )
        .route(
            "/maintenance/activities/:id",
            get(handlers::maintenance::get_activity)
                .put(handlers::maintenance::update_activity)
                .delete(handlers::maintenance::delete_activity),
        )
        .route("/maintenance/activities/:id/start", post(handlers::maintenance::start_activity))
        .route(
            "/maintenance/activities/:id/complete",
            post(handlers::maintenance::complete_activity),
        )
        .route(
            "/maintenance/activities/:id/checklist",
            post(handlers::maintenance::add_checklist_item),
        )
        .route(
            "/maintenance/activities/:id/checklist/:item_id",
            axum::routing::delete(handlers::maintenance::delete_checklist_item),
        )
        .route(
            "/maintenance/activities/:id/checklist/:item_id/complete",
            post(handlers::maintenance::complete_checklist_item),
        )
        .route("/maintenance/overdue", get(handlers::maintenance::list_overdue))
        .route("/maintenance/report", get(handlers::maintenance::maintenance_report))
        .route(
            "/maintenance/schedules",
            get(handlers::maintenance::list_schedules).post(handlers::maintenance::create_schedule),
        )
        .route(
            "/maintenance/schedules/generate",
            post(handlers::maintenance::generate_all_schedules),
        )
        .route(
            "/maintenance/schedules/:id",
            get(handlers::maintenance::get_schedule)
                .put(handlers::maintenance::update_schedule)
                .delete(handlers::maintenance::delete_schedule),
        )
        .route(
            "/maintenance/schedules/:id/generate",
            post(handlers::maintenance::generate_schedule),
        )
        // Calendar routes
        .route(
            "/calendar/events",
            get(handlers::calendar::list_events).post(handlers::calendar::create_event),
        )
        .route(
            "/calendar/events/:id",
            get(handlers::calendar::get_event)
                .put(handlers::calendar::update_event)
                .delete(handlers::calendar::delete_event),
        )
        .route("/calendar/events/:id/complete", post(handlers::calendar::complete_event))
        .route("/calendar/events/:id/comments", post(handlers::calendar::add_comment))
        .route(
            "/calendar/events/:id/comments/:comment_id",
            axum::routing::delete(handlers::calendar::delete_comment),
        )
        // Dashboard
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        // Settings routes
        .route(
            "/settings/branding",
            get(handlers::settings::get_branding).put(handlers::settings::update_branding),
        )
        .route("/settings/branding/reset", post(handlers::settings::reset_branding))
        .route(
            "/settings/dashboard",
            get(handlers::settings::get_dashboard_settings)
                .put(handlers::settings::update_dashboard_settings),
        )
        .route(
            "/settings/dashboard/reset",
            post(handlers::settings::reset_dashboard_settings),
        )
        // Admin routes
        .route("/admin/reset", post(handlers::admin::reset_data))
        .route("/admin/demo", post(handlers::admin::populate_demo))
        .route("/admin/jobs", get(handlers::admin::list_jobs))
        .route("/admin/jobs/:name/run", post(handlers::admin::run_job))
        .route(
            "/admin/webhook",
            get(handlers::webhook::show_config).put(handlers::webhook::update_config),
        )
        .route("/admin/webhook/test", post(handlers::webhook::test_config))
        .route("/admin/webhook/trigger", post(handlers::webhook::trigger))
        .route("/admin/webhook/rotate-secret", post(handlers::webhook::rotate_secret))
        // Audit log routes
        .route("/oplog/query", get(handlers::audit::query_oplog))
        .route("/oplog/delete", post(handlers::audit::delete_oplog))
        // Inbound redeploy, authenticated by the secret header
        .route("/webhook/redeploy", post(handlers::webhook::redeploy));

    // Static frontend, falling back to index.html for client-side routing
    let index_file = state.config.static_dir.join("index.html");
    let serve_dir = ServeDir::new(&state.config.static_dir).not_found_service(ServeFile::new(index_file));

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(serve_dir)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let app = create_router(test_state().await);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_public_routes_skip_auth() {
        assert_eq!(status_of("GET", "/api/health").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/api/settings/branding").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        assert_eq!(status_of("GET", "/api/equipment").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/api/dashboard").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_redeploy_without_config_is_unavailable() {
        assert_eq!(
            status_of("POST", "/api/webhook/redeploy").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
