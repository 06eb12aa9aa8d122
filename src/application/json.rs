//! Soft-fail JSON conversion.
//!
//! Failures are logged with the offending payload and surface as `None`
//! instead of an error. Callers that need to distinguish a malformed payload
//! from an absent one should use `serde_json` directly.

use serde::{Serialize, de::DeserializeOwned};
use tracing::error;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Option<String> {
        match serde_json::to_string(value) {
            Ok(json) => Some(json),
            Err(err) => {
                error!(
                    target = "scaffold::json",
                    error = %err,
                    type_name = std::any::type_name::<T>(),
                    "failed to serialize value to json"
                );
                None
            }
        }
    }

    pub fn to_object<T: DeserializeOwned>(&self, json: &str) -> Option<T> {
        match serde_json::from_str(json) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(
                    target = "scaffold::json",
                    error = %err,
                    payload = json,
                    type_name = std::any::type_name::<T>(),
                    "failed to deserialize json payload"
                );
                None
            }
        }
    }
}
