use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::error::AuthError;

/// Token endpoint response as stored under the session key, plus the
/// locally computed absolute expiry.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct Session {
    /// Opaque bearer token; never decoded here.
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Lifetime of the access token in seconds.
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: i64,

    /// Unix time in milliseconds, `now + expires_in * 1000` at the moment the
    /// response was received.
    #[serde(default)]
    pub expires_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Anything else the provider returned (`scope`, `session_state`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// Parses a token endpoint body and stamps `expires_at`.
    pub fn from_token_response(body: &str) -> Result<Self, AuthError> {
        let mut session: Session = serde_json::from_str(body)?;
        session.expires_at = now_millis().saturating_add(session.expires_in.saturating_mul(1000));
        Ok(session)
    }

    pub fn is_expired(&self) -> bool {
        now_millis() >= self.expires_at
    }

    /// Check if the token will expire within five minutes
    pub fn expires_soon(&self) -> bool {
        now_millis().saturating_add(5 * 60 * 1000) >= self.expires_at
    }

    /// Claims carried in the id token payload. The signature is not checked.
    pub fn claims(&self) -> Result<Map<String, Value>, AuthError> {
        let id_token = self.id_token.as_deref().ok_or(AuthError::MissingIdToken)?;
        parse_id_token(id_token)
    }

    pub fn claim(&self, name: &str) -> Result<Option<Value>, AuthError> {
        Ok(self.claims()?.remove(name))
    }
}

// Some providers send the lifetime as a numeric string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lifetime {
        Integer(i64),
        Float(f64),
        Text(String),
    }

    match Lifetime::deserialize(deserializer)? {
        Lifetime::Integer(secs) => Ok(secs),
        Lifetime::Float(secs) => Ok(secs as i64),
        Lifetime::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn parse_id_token(jwt: &str) -> Result<Map<String, Value>, AuthError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidJwt);
    }

    // Providers differ on padding, so strip it before decoding
    let payload_b64 = parts[1].trim_end_matches('=');
    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_b64)?;

    match serde_json::from_slice::<Value>(&payload_bytes)? {
        Value::Object(claims) => Ok(claims),
        _ => Err(AuthError::InvalidJwt),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn make_jwt(payload: &Value) -> String {
        let header = json!({"alg": "none", "typ": "JWT"});
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(serde_json::to_vec(&header).unwrap()),
            engine.encode(serde_json::to_vec(payload).unwrap()),
            engine.encode(b"sig")
        )
    }

    #[test]
    fn test_from_token_response_computes_expiry() {
        let before = now_millis();
        let session = Session::from_token_response(
            r#"{"access_token":"t","expires_in":3600,"token_type":"Bearer","scope":"openid"}"#,
        )
        .unwrap();
        let after = now_millis();

        assert_eq!(session.access_token, "t");
        assert_eq!(session.token_type.as_deref(), Some("Bearer"));
        assert!(session.expires_at >= before + 3_600_000);
        assert!(session.expires_at <= after + 3_600_000);
        assert_eq!(session.extra.get("scope"), Some(&json!("openid")));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_from_token_response_huge_lifetime_saturates() {
        let session = Session::from_token_response(
            r#"{"access_token":"t","expires_in":9223372036854775}"#,
        )
        .unwrap();
        assert_eq!(session.expires_at, i64::MAX);
        assert!(!session.is_expired());
        assert!(!session.expires_soon());
    }

    #[test]
    fn test_from_token_response_string_lifetime() {
        let before = now_millis();
        let session =
            Session::from_token_response(r#"{"access_token":"t","expires_in":"3600"}"#).unwrap();

        assert_eq!(session.expires_in, 3600);
        assert!(session.expires_at >= before + 3_600_000);

        assert!(matches!(
            Session::from_token_response(r#"{"access_token":"t","expires_in":"soon"}"#),
            Err(AuthError::Json(_))
        ));
    }

    #[test]
    fn test_extra_fields_survive_storage_round_trip() {
        let session = Session::from_token_response(
            r#"{"access_token":"t","expires_in":60,"session_state":"abc","not-before-policy":0}"#,
        )
        .unwrap();
        let stored = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.extra.get("session_state"), Some(&json!("abc")));
    }

    #[test]
    fn test_expires_soon() {
        let session = Session {
            access_token: "t".to_string(),
            expires_at: now_millis() + 60_000,
            ..Default::default()
        };
        assert!(!session.is_expired());
        assert!(session.expires_soon());
    }

    #[test]
    fn test_parse_valid_jwt() {
        let jwt = make_jwt(&json!({
            "email": "test@example.com",
            "preferred_username": "test"
        }));
        let claims = parse_id_token(&jwt).unwrap();
        assert_eq!(claims.get("email"), Some(&json!("test@example.com")));
    }

    #[test]
    fn test_parse_invalid_jwt() {
        assert!(matches!(
            parse_id_token("not-a-jwt"),
            Err(AuthError::InvalidJwt)
        ));
        assert!(matches!(parse_id_token("a.!!!.c"), Err(AuthError::Base64(_))));
    }

    #[test]
    fn test_claim_lookup() {
        let session = Session {
            access_token: "t".to_string(),
            id_token: Some(make_jwt(&json!({"sub": "user-1"}))),
            ..Default::default()
        };
        assert_eq!(session.claim("sub").unwrap(), Some(json!("user-1")));
        assert_eq!(session.claim("email").unwrap(), None);

        let anonymous = Session::default();
        assert!(matches!(
            anonymous.claim("sub"),
            Err(AuthError::MissingIdToken)
        ));
    }
}
