pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router, signing_key};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware as axum_middleware};

use crate::application::error::HttpError;
use crate::application::repos::RepoError;

/// Full application router: the demo API, the health probe and the
/// request logging stack.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(build_api_router(state.clone()))
        .fallback(not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health(State(state): State<ApiState>) -> Response {
    store_health_response(state.demo.health_check().await)
}

fn store_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::health",
            StatusCode::SERVICE_UNAVAILABLE,
            "Store unavailable",
            &err,
        )
        .into_response(),
    }
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::new(
        "infra::http::fallback",
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no route for {}", uri.path()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::ErrorReport;

    #[test]
    fn unhealthy_store_reports_service_unavailable() {
        let response = store_health_response(Err(RepoError::Timeout));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }

    #[test]
    fn healthy_store_reports_no_content() {
        let response = store_health_response(Ok(()));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
