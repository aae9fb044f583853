use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Shared-secret HS256 validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims` against `issued_at`/`expires_at`.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccountType;
    use bazaar_core::UserId;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: UserId::new(9),
            email: "shop@example.com".into(),
            account_type: AccountType::Shop,
            issued_at: now - Duration::seconds(5),
            expires_at: now + Duration::minutes(5),
        }
    }

    #[test]
    fn round_trips_signed_token() {
        let c = claims();
        let token = mint("secret", &c);
        let validator = Hs256JwtValidator::new("secret");
        assert_eq!(validator.validate(&token, Utc::now()).unwrap(), c);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint("secret", &claims());
        let validator = Hs256JwtValidator::new("other");
        assert!(matches!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_signed_token() {
        let c = claims();
        let token = mint("secret", &c);
        let validator = Hs256JwtValidator::new("secret");
        let later = c.expires_at + Duration::seconds(1);
        assert_eq!(validator.validate(&token, later), Err(TokenValidationError::Expired));
    }
}
