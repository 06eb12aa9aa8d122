use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::error::ApiError;
use super::state::ApiState;

/// Refuse every demo route when the service runs in production.
pub async fn production_guard(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.production {
        debug!(
            target = "scaffold::infra::http::api",
            path = %request.uri().path(),
            "demo route refused in production"
        );
        return ApiError::demo_disabled().into_response();
    }

    next.run(request).await
}
