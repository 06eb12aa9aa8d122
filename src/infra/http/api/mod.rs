pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::{ApiState, signing_key};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

/// Routes under `/api/demo`, guarded so they all refuse service in production.
pub fn build_api_router(state: ApiState) -> Router<ApiState> {
    Router::new()
        .route("/api/demo/now", get(handlers::now))
        .route("/api/demo/identity", get(handlers::identity))
        .route("/api/demo/login", post(handlers::login))
        .route("/api/demo/logout", post(handlers::logout))
        .route(
            "/api/demo",
            get(handlers::list_demos).post(handlers::create_demo),
        )
        .route("/api/demo/page", get(handlers::page_demos))
        .route("/api/demo/top/{count}", get(handlers::top_demos))
        .route("/api/demo/cached/{id}", get(handlers::get_demo_cached))
        .route(
            "/api/demo/{id}",
            get(handlers::get_demo)
                .put(handlers::update_demo)
                .delete(handlers::delete_demo),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::production_guard,
        ))
}
