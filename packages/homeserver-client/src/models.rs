//! Home-server response models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard Matrix error body, `{"errcode": "...", "error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixErrorBody {
    /// Machine-readable error code (e.g., M_UNKNOWN_TOKEN)
    pub errcode: Option<String>,
    /// Human-readable message
    pub error: Option<String>,
}

/// Pull the user ID out of a whoami body
///
/// Only a JSON object with a string `user_id` names a user. Every other
/// shape (null, arrays, numbers, a missing or non-string field) yields `None`.
pub(crate) fn user_id_from_whoami(body: &Value) -> Option<String> {
    body.as_object()?
        .get("user_id")?
        .as_str()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_present() {
        let body = json!({"user_id": "@fox:localhost", "device_id": "ABCDEF"});
        assert_eq!(user_id_from_whoami(&body), Some("@fox:localhost".to_string()));
    }

    #[test]
    fn test_user_id_not_transformed() {
        let body = json!({"user_id": "  @Fox:LocalHost  "});
        assert_eq!(
            user_id_from_whoami(&body),
            Some("  @Fox:LocalHost  ".to_string())
        );
    }

    #[test]
    fn test_user_id_missing_or_wrong_type() {
        assert_eq!(user_id_from_whoami(&json!({})), None);
        assert_eq!(user_id_from_whoami(&json!({"user_id": 42})), None);
        assert_eq!(user_id_from_whoami(&json!({"user_id": null})), None);
        assert_eq!(user_id_from_whoami(&json!(null)), None);
        assert_eq!(user_id_from_whoami(&json!(["@fox:localhost"])), None);
    }

    #[test]
    fn test_error_body_parsing() {
        let body: MatrixErrorBody =
            serde_json::from_str(r#"{"errcode": "M_UNKNOWN_TOKEN"}"#).unwrap();
        assert_eq!(body.errcode.as_deref(), Some("M_UNKNOWN_TOKEN"));
        assert_eq!(body.error, None);
    }
}
