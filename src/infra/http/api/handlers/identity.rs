//! Mock login backed by a signed cookie

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use scaffold_api_types::IdentityDto;
use tracing::info;

use crate::application::identity::IDENTITY_COOKIE;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn login(
    State(state): State<ApiState>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state.identity.login();
    let value = state
        .identity
        .encode(&claims)
        .ok_or_else(|| ApiError::serialization("identity claims could not be encoded"))?;

    let cookie = Cookie::build((IDENTITY_COOKIE, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(state.identity.cookie_max_age());

    info!(
        target = "scaffold::infra::http::api",
        sid = %claims.sid,
        "mock login issued"
    );
    Ok((jar.add(cookie), StatusCode::NO_CONTENT))
}

pub async fn logout(jar: SignedCookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(IDENTITY_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

pub async fn identity(
    State(state): State<ApiState>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let claims = jar
        .get(IDENTITY_COOKIE)
        .and_then(|cookie| state.identity.decode(cookie.value()))
        .ok_or_else(ApiError::unauthorized)?;

    Ok(Json(IdentityDto { id: claims.sid }))
}
