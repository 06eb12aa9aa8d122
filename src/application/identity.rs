//! Mock cookie identity.
//!
//! Login always yields the configured subject. The HTTP layer stores the
//! encoded claims in a signed cookie; this module only decides what goes in
//! it and how to read it back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::application::json::JsonConverter;
use crate::domain::clock::Clock;

pub const IDENTITY_COOKIE: &str = "scaffold_identity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sid: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct IdentityService {
    subject: String,
    cookie_max_age: Duration,
    clock: Arc<dyn Clock>,
    json: JsonConverter,
}

impl IdentityService {
    pub fn new(subject: impl Into<String>, cookie_max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            subject: subject.into(),
            cookie_max_age,
            clock,
            json: JsonConverter,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn cookie_max_age(&self) -> Duration {
        self.cookie_max_age
    }

    /// Claims for a fresh mock login.
    pub fn login(&self) -> IdentityClaims {
        IdentityClaims {
            sid: self.subject.clone(),
            issued_at: self.clock.now(),
        }
    }

    pub fn encode(&self, claims: &IdentityClaims) -> Option<String> {
        self.json.to_json(claims)
    }

    /// Decode a cookie value. Malformed values are logged and read as anonymous.
    pub fn decode(&self, value: &str) -> Option<IdentityClaims> {
        self.json
            .to_object::<IdentityClaims>(value)
            .filter(|claims| !claims.sid.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use time::macros::datetime;

    fn service() -> IdentityService {
        IdentityService::new(
            "demo",
            Duration::days(3650),
            Arc::new(ManualClock::new(datetime!(2024-05-01 08:00:00 UTC))),
        )
    }

    #[test]
    fn login_issues_the_configured_subject() {
        let claims = service().login();
        assert_eq!(claims.sid, "demo");
        assert_eq!(claims.issued_at, datetime!(2024-05-01 08:00:00 UTC));
    }

    #[test]
    fn claims_survive_encoding() {
        let service = service();
        let claims = service.login();
        let encoded = service.encode(&claims).expect("encodes");
        assert_eq!(service.decode(&encoded), Some(claims));
    }

    #[test]
    fn garbage_and_empty_subjects_read_as_anonymous() {
        let service = service();
        assert_eq!(service.decode("not-json"), None);
        assert_eq!(
            service.decode(r#"{"sid":"","issued_at":"2024-05-01T08:00:00Z"}"#),
            None
        );
    }
}
