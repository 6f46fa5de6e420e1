//! Access-token verification for the managed auth provider.
//!
//! Sign-in itself happens elsewhere; the gateway only checks the HS256
//! access token the provider hands to the browser and reads the member id
//! from its `sub` claim.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::GatewayError;

/// Claims the gateway reads from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Member id.
    pub sub: String,
    /// Expiry, unix seconds.
    pub exp: usize,
}

/// Verifies access tokens signed with the shared project secret.
#[derive(Clone)]
pub struct AuthVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerifier")
            .field("key", &"<redacted>")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl AuthVerifier {
    /// Creates a verifier for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifies `token` and returns the member it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if the token is malformed,
    /// expired, wrongly signed, or its subject is not a member id.
    pub fn verify(&self, token: &str) -> Result<UserId, GatewayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            GatewayError::Unauthorized
        })?;
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| GatewayError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let exp = usize::try_from(chrono::Utc::now().timestamp() + exp_offset).unwrap_or(0);
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        let Ok(token) = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        ) else {
            panic!("encoding should succeed");
        };
        token
    }

    #[test]
    fn valid_token_yields_member() {
        let id = uuid::Uuid::new_v4();
        let verifier = AuthVerifier::new("jwt-secret");
        let Ok(user) = verifier.verify(&token("jwt-secret", &id.to_string(), 3600)) else {
            panic!("token should verify");
        };
        assert_eq!(*user.as_uuid(), id);
    }

    #[test]
    fn wrong_secret_expired_or_bad_subject_is_unauthorized() {
        let verifier = AuthVerifier::new("jwt-secret");
        let id = uuid::Uuid::new_v4().to_string();
        for bad in [
            token("other-secret", &id, 3600),
            token("jwt-secret", &id, -3600),
            token("jwt-secret", "not-a-uuid", 3600),
            "garbage".to_string(),
        ] {
            assert!(matches!(verifier.verify(&bad), Err(GatewayError::Unauthorized)));
        }
    }
}
