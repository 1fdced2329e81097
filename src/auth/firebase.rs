use crate::error::{AppError, AuthError, ProxyError};
use crate::proxy::fetcher::HttpFetcher;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const JWKS_TTL: Duration = Duration::from_secs(60 * 60);
const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Claims of a Firebase ID token that we use.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies Firebase ID tokens against Google's published signing keys.
pub struct FirebaseVerifier {
    project_id: Option<String>,
    jwks_url: String,
    fetcher: HttpFetcher,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: Option<String>, jwks_url: String, fetcher: HttpFetcher) -> Self {
        Self {
            project_id: project_id.filter(|p| !p.is_empty()),
            jwks_url,
            fetcher,
            cache: RwLock::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.project_id.is_some()
    }

    pub async fn verify(&self, id_token: &str) -> Result<FirebaseClaims, AppError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or_else(|| ProxyError::NotConfigured("Firebase sign-in".into()))?;

        let header = decode_header(id_token).map_err(|_| AuthError::InvalidToken)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken.into());
        }
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{}{}", ISSUER_PREFIX, project_id)]);

        let claims = decode::<FirebaseClaims>(id_token, &key, &validation)?.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken.into());
        }
        Ok(claims)
    }

    /// Key for `kid`, refreshing the cached set when it is stale or the
    /// key has rotated. Unknown ids refetch at most once per
    /// `JWKS_REFRESH_COOLDOWN`.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        if let Some(key) = cached_key(self.cache.read().await.as_ref(), kid)? {
            return Ok(key);
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(key) = cached_key(cache.as_ref(), kid)? {
            return Ok(key);
        }

        let keys: JwkSet = self.fetcher.get_json(&self.jwks_url, &[]).await?;
        info!("Refreshed Firebase signing keys ({} keys)", keys.keys.len());

        let key = keys.find(kid).map(DecodingKey::from_jwk).transpose()?;
        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| {
            warn!("Firebase token signed with unknown key id {}", kid);
            AppError::from(AuthError::InvalidToken)
        })
    }
}

/// `Some(key)` on a fresh hit, `None` when the set must be refetched, and
/// an error for an unknown id while refetching is on cooldown.
fn cached_key(cache: Option<&CachedKeys>, kid: &str) -> Result<Option<DecodingKey>, AppError> {
    let Some(cached) = cache else {
        return Ok(None);
    };
    let age = cached.fetched_at.elapsed();
    if age >= JWKS_TTL {
        return Ok(None);
    }

    match cached.keys.find(kid) {
        Some(jwk) => Ok(Some(DecodingKey::from_jwk(jwk)?)),
        None if age < JWKS_REFRESH_COOLDOWN => {
            debug!("Unknown Firebase key id {} within refresh cooldown", kid);
            Err(AuthError::InvalidToken.into())
        }
        None => Ok(None),
    }
}
