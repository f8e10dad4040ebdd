//! Bearer credential verification.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::cache::IdentityCache;
use super::{AuthError, Identity};

/// Maps an opaque bearer token to a validated identity claim, or fails.
///
/// Verification may suspend (a profile lookup on cache miss in a full
/// deployment), so admission awaits it before any event is dispatched.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Claims carried by gateway bearer tokens. `exp` is validated by the
/// decoder; it does not need to be materialized here.
#[derive(Debug, Deserialize)]
struct Claims {
    id: i64,
    username: String,
    email: String,
}

/// HS256 verifier over a shared secret, fronted by the identity cache.
pub struct JwtVerifier {
    decoding: DecodingKey,
    validation: Validation,
    cache: IdentityCache,
}

impl JwtVerifier {
    pub fn new(secret: &str, cache: IdentityCache) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            cache,
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(?e, "token verification failed");
            AuthError::InvalidToken
        })?;
        let claims = data.claims;

        if let Some(cached) = self.cache.get(claims.id) {
            return Ok(cached);
        }

        // A full deployment resolves the user profile here on a cache miss;
        // the token's own claims are authoritative for the gateway.
        let identity = Identity {
            id: claims.id,
            username: claims.username,
            email: claims.email,
        };
        self.cache.insert(identity.clone());
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use super::*;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct TestClaims {
        id: i64,
        username: String,
        email: String,
        iat: i64,
        exp: i64,
    }

    fn mint(secret: &str, id: i64, username: &str, ttl_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            iat: now,
            exp: now + ttl_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode test token")
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET, IdentityCache::new(Duration::from_secs(300)))
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let token = mint(SECRET, 7, "alice", 3600);
        let identity = verifier().verify(&token).await.expect("verify");
        assert_eq!(identity.id, 7);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let token = mint(SECRET, 7, "alice", -7200);
        assert_eq!(
            verifier().verify(&token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let token = mint("other-secret", 7, "alice", 3600);
        assert_eq!(
            verifier().verify(&token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        assert_eq!(
            verifier().verify("not.a.jwt").await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn cache_serves_repeat_verifications() {
        let v = verifier();
        let first = mint(SECRET, 7, "alice", 3600);
        v.verify(&first).await.expect("first verify");

        // Second token for the same identity carries a different username;
        // the cached identity wins while the entry is fresh.
        let second = mint(SECRET, 7, "alice-renamed", 3600);
        let identity = v.verify(&second).await.expect("second verify");
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn cache_expiry_falls_back_to_claims() {
        let v = JwtVerifier::new(SECRET, IdentityCache::new(Duration::ZERO));
        v.verify(&mint(SECRET, 7, "alice", 3600)).await.expect("first");
        let identity = v
            .verify(&mint(SECRET, 7, "alice-renamed", 3600))
            .await
            .expect("second");
        assert_eq!(identity.username, "alice-renamed");
    }
}
