use super::model::{AuthenticatedUser, Role};
use crate::core::config::AuthConfig;
use crate::core::error::AppError;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Validates HS256 access tokens signed by the identity provider
pub struct JwtValidator {
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    leeway: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,

    /// Display name; tokens without one fall back to `sub`
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: config.jwt_leeway.as_secs(),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|e| AppError::Auth(e.to_string()))?;

        if header.alg != Algorithm::HS256 {
            return Err(AppError::Auth(format!(
                "Unsupported algorithm: {:?}. Only HS256 is allowed",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Auth(e.to_string()))?
            .claims;

        let name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| claims.sub.clone());

        Ok(AuthenticatedUser {
            sub: claims.sub,
            name,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::Duration;

    const SECRET: &str = "test-secret";

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            issuer: "helpdesk-identity".to_string(),
            audience: "helpdesk-api".to_string(),
            jwt_leeway: Duration::from_secs(0),
        }
    }

    fn claims(role: Role, exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: "user-1".to_string(),
            iss: "helpdesk-identity".to_string(),
            aud: "helpdesk-api".to_string(),
            exp: (now + exp_offset) as u64,
            iat: Some(now as u64),
            name: Some("Maria Souza".to_string()),
            role,
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token should encode")
    }

    #[test]
    fn test_valid_token_resolves_user() {
        let validator = JwtValidator::new(&config());
        let token = sign(&claims(Role::Admin, 3600), SECRET);

        let user = validator.validate_token(&token).expect("token should validate");
        assert_eq!(user.sub, "user-1");
        assert_eq!(user.name, "Maria Souza");
        assert!(user.is_admin());
    }

    #[test]
    fn test_expired_token_rejected() {
        let validator = JwtValidator::new(&config());
        let token = sign(&claims(Role::User, -3600), SECRET);

        assert!(matches!(
            validator.validate_token(&token),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let validator = JwtValidator::new(&config());
        let token = sign(&claims(Role::User, 3600), "another-secret");

        assert!(matches!(
            validator.validate_token(&token),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn test_missing_name_falls_back_to_sub() {
        let validator = JwtValidator::new(&config());
        let mut c = claims(Role::User, 3600);
        c.name = None;
        let token = sign(&c, SECRET);

        let user = validator.validate_token(&token).expect("token should validate");
        assert_eq!(user.name, "user-1");
        assert_eq!(user.role, Role::User);
    }
}
