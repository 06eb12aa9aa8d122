use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use tracing::warn;

use crate::application::demo::DemoService;
use crate::application::identity::IdentityService;

#[derive(Clone)]
pub struct ApiState {
    pub demo: Arc<DemoService>,
    pub identity: Arc<IdentityService>,
    pub cookie_key: Key,
    /// When set, every demo route answers `403 demo_disabled`.
    pub production: bool,
}

impl FromRef<ApiState> for Key {
    fn from_ref(state: &ApiState) -> Self {
        state.cookie_key.clone()
    }
}

/// Derive the cookie signing key from configuration.
///
/// Without a configured secret a random key is generated, so cookies issued
/// by one process are not accepted after a restart.
pub fn signing_key(secret: Option<&str>) -> Key {
    match secret.map(|value| Key::try_from(value.as_bytes())) {
        Some(Ok(key)) => key,
        Some(Err(err)) => {
            warn!(
                target = "scaffold::infra::http",
                error = %err,
                "cookie secret unusable; generating a per-process key"
            );
            Key::generate()
        }
        None => Key::generate(),
    }
}
