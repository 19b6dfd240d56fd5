use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::auth::auth_middleware;
use super::handlers::*;
use super::state::AppState;

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/refresh", post(refresh))

        // Users
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:user_id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:user_id/role", patch(update_user_role))

        // Projects
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:project_id/members", get(list_members).post(add_member))
        .route(
            "/projects/:project_id/members/:user_id",
            axum::routing::delete(remove_member),
        )

        // Backlog
        .route(
            "/projects/:project_id/backlog",
            get(list_backlog).post(create_backlog_item),
        )
        .route(
            "/backlog/:item_id",
            get(get_backlog_item).patch(update_backlog_item).delete(delete_backlog_item),
        )

        // Sprints
        .route("/projects/:project_id/sprints", get(list_sprints).post(create_sprint))
        .route(
            "/sprints/:sprint_id",
            get(get_sprint).patch(update_sprint).delete(delete_sprint),
        )
        .route("/sprints/:sprint_id/tasks", get(list_sprint_tasks).post(create_task))

        // Tasks
        .route("/tasks", get(list_tasks))
        .route(
            "/tasks/:task_id",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/:task_id/status", put(set_task_status))

        // Performance
        .route("/performance", post(create_performance_log))
        .route("/performance/me", get(my_performance))
        .route("/performance/users/:user_id", get(user_performance))
        .route("/performance/projects/:project_id", get(project_performance))

        // Chat
        .route("/chat/:project_id", get(list_chat).post(post_chat_message))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    app.layer(cors_layer(cors_origins))
}

/// Any origin when none are configured, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
