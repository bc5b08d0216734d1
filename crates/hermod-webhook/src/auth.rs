//! Per-delivery authentication header construction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use hermod_core::error::{HermodError, HermodResult};
use hermod_core::models::webhook::WebhookAuth;

/// Claims minted into short-lived delivery JWTs.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DeliveryClaims {
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp, issued-at plus ten minutes).
    pub exp: i64,
    pub app: String,
    pub action: String,
}

const JWT_LIFETIME_SECS: i64 = 600;

/// Build the header pairs for a subscriber's authentication mode.
///
/// JWT mode mints a fresh HS256 token per delivery.
pub fn build_auth_headers(auth: &WebhookAuth) -> HermodResult<Vec<(String, String)>> {
    match auth {
        WebhookAuth::None => Ok(Vec::new()),
        WebhookAuth::Bearer { token } => {
            Ok(vec![("Authorization".into(), format!("Bearer {token}"))])
        }
        WebhookAuth::Basic { username, password } => {
            let credentials = STANDARD.encode(format!("{username}:{password}"));
            Ok(vec![(
                "Authorization".into(),
                format!("Basic {credentials}"),
            )])
        }
        WebhookAuth::ApiKey { token, header } => Ok(vec![(header.clone(), token.clone())]),
        WebhookAuth::Jwt { secret } => {
            let token = mint_delivery_jwt(secret)?;
            Ok(vec![("Authorization".into(), format!("Bearer {token}"))])
        }
    }
}

fn mint_delivery_jwt(secret: &str) -> HermodResult<String> {
    let now = Utc::now().timestamp();
    let claims = DeliveryClaims {
        iat: now,
        exp: now + JWT_LIFETIME_SECS,
        app: "hermod".into(),
        action: "webhook".into(),
    };

    let header = Header::new(Algorithm::HS256);
    jsonwebtoken::encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| HermodError::Internal(format!("JWT encode: {e}")))
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};

    use super::*;

    #[test]
    fn none_adds_nothing() {
        assert!(build_auth_headers(&WebhookAuth::None).unwrap().is_empty());
    }

    #[test]
    fn bearer_header() {
        let headers = build_auth_headers(&WebhookAuth::Bearer {
            token: "tok-123".into(),
        })
        .unwrap();
        assert_eq!(
            headers,
            vec![("Authorization".to_string(), "Bearer tok-123".to_string())]
        );
    }

    #[test]
    fn basic_header_is_base64_of_user_colon_pass() {
        let headers = build_auth_headers(&WebhookAuth::Basic {
            username: "user".into(),
            password: "pass".into(),
        })
        .unwrap();
        // base64("user:pass")
        assert_eq!(
            headers,
            vec![(
                "Authorization".to_string(),
                "Basic dXNlcjpwYXNz".to_string()
            )]
        );
    }

    #[test]
    fn api_key_uses_custom_header() {
        let headers = build_auth_headers(&WebhookAuth::ApiKey {
            token: "k-1".into(),
            header: "X-Api-Key".into(),
        })
        .unwrap();
        assert_eq!(headers, vec![("X-Api-Key".to_string(), "k-1".to_string())]);
    }

    #[test]
    fn jwt_mints_ten_minute_hs256_token() {
        let secret = "webhook-shared-secret";
        let headers = build_auth_headers(&WebhookAuth::Jwt {
            secret: secret.into(),
        })
        .unwrap();

        let (name, value) = &headers[0];
        assert_eq!(name, "Authorization");
        let token = value.strip_prefix("Bearer ").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iat"]);
        let decoded = jsonwebtoken::decode::<DeliveryClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.app, "hermod");
        assert_eq!(decoded.claims.action, "webhook");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 600);
    }
}
