use std::collections::HashMap;
use std::env;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::logging::log_jwks_refresh;
use crate::auth::{AuthError, TokenVerifier, UserInfo};

/// Shared client for JWKS downloads
static JWKS_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
});

/// Auth0 tenant settings
#[derive(Debug, Clone, Default)]
pub struct Auth0Config {
    /// Tenant domain, e.g. `example.us.auth0.com`
    pub domain: Option<String>,
    /// API audience identifier
    pub audience: Option<String>,
    /// How long fetched signing keys stay cached
    pub jwks_cache_hours: u64,
}

impl Auth0Config {
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            audience: Some(audience.into()),
            jwks_cache_hours: 24,
        }
    }

    /// Read `AUTH0_DOMAIN`, `AUTH0_AUDIENCE` and `JWKS_CACHE_HOURS`
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            domain: non_empty("AUTH0_DOMAIN"),
            audience: non_empty("AUTH0_AUDIENCE"),
            jwks_cache_hours: env::var("JWKS_CACHE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.domain.is_some() && self.audience.is_some()
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> Option<String> {
        self.domain.as_ref().map(|domain| format!("https://{}/", domain))
    }

    pub fn jwks_url(&self) -> Option<String> {
        self.domain
            .as_ref()
            .map(|domain| format!("https://{}/.well-known/jwks.json", domain))
    }
}

/// Auth0 JWT claims used by the application
#[derive(Debug, Serialize, Deserialize)]
pub struct Auth0Claims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<Auth0Claims> for UserInfo {
    fn from(claims: Auth0Claims) -> Self {
        let mut permissions = claims.permissions.unwrap_or_default();
        if permissions.is_empty() {
            if let Some(scope) = &claims.scope {
                permissions = scope.split_whitespace().map(String::from).collect();
            }
        }

        UserInfo {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            permissions,
            auth_source: "auth0".to_string(),
        }
    }
}

/// Minimum time between refreshes forced by an unknown `kid`
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Signing keys cached per issuer
#[derive(Debug)]
pub struct JwksCache {
    keys: RwLock<HashMap<String, (JwkSet, Instant)>>,
    forced_refreshes: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
    min_refresh_interval: Duration,
}

impl JwksCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            forced_refreshes: RwLock::new(HashMap::new()),
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Store a key set for an issuer
    pub fn insert(&self, issuer: &str, jwks: JwkSet) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(issuer.to_string(), (jwks, Instant::now()));
        }
    }

    fn cached(&self, issuer: &str) -> Option<JwkSet> {
        let keys = self.keys.read().ok()?;
        keys.get(issuer)
            .filter(|(_, fetched_at)| fetched_at.elapsed() < self.ttl)
            .map(|(jwks, _)| jwks.clone())
    }

    /// Claims the forced-refresh slot for an issuer; false while throttled
    fn try_begin_forced_refresh(&self, issuer: &str) -> bool {
        let Ok(mut refreshes) = self.forced_refreshes.write() else {
            return false;
        };
        let throttled = refreshes
            .get(issuer)
            .map_or(false, |last| last.elapsed() < self.min_refresh_interval);
        if !throttled {
            refreshes.insert(issuer.to_string(), Instant::now());
        }
        !throttled
    }

    async fn fetch(&self, issuer: &str, url: &str) -> Result<JwkSet, AuthError> {
        debug!("Fetching JWKS from {}", url);

        let result = async {
            let response = JWKS_CLIENT.get(url).send().await?.error_for_status()?;
            response.json::<JwkSet>().await
        }
        .await;

        match result {
            Ok(jwks) => {
                log_jwks_refresh(issuer, true, None);
                self.insert(issuer, jwks.clone());
                Ok(jwks)
            }
            Err(e) => {
                log_jwks_refresh(issuer, false, Some(&e.to_string()));
                Err(AuthError::Unavailable(format!("Failed to fetch JWKS: {}", e)))
            }
        }
    }

    /// Key with the given `kid`. An unknown `kid` triggers a refresh at most
    /// once per `min_refresh_interval` for each issuer.
    pub async fn find_key(&self, issuer: &str, url: &str, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(jwks) = self.cached(issuer) {
            if let Some(jwk) = jwks.find(kid) {
                return Ok(jwk.clone());
            }
            if !self.try_begin_forced_refresh(issuer) {
                debug!("Key {} not in cached JWKS, refresh throttled", kid);
                return Err(AuthError::KeyNotFound);
            }
            debug!("Key {} not in cached JWKS, refreshing", kid);
            return match self.fetch(issuer, url).await {
                Ok(fresh) => fresh.find(kid).cloned().ok_or(AuthError::KeyNotFound),
                Err(_) => Err(AuthError::KeyNotFound),
            };
        }

        let jwks = self.fetch(issuer, url).await?;
        jwks.find(kid).cloned().ok_or(AuthError::KeyNotFound)
    }
}

/// RS256 verifier for Auth0 access tokens
#[derive(Debug)]
pub struct Auth0Verifier {
    config: Auth0Config,
    cache: JwksCache,
}

impl Auth0Verifier {
    pub fn new(config: Auth0Config) -> Self {
        let ttl = Duration::from_secs(config.jwks_cache_hours.saturating_mul(3600));
        Self {
            config,
            cache: JwksCache::new(ttl),
        }
    }

    /// Signing key cache, exposed for pre-seeding
    pub fn cache(&self) -> &JwksCache {
        &self.cache
    }

    pub fn config(&self) -> &Auth0Config {
        &self.config
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer | ErrorKind::ImmatureSignature => {
            AuthError::InvalidClaims
        }
        _ => AuthError::Unparseable,
    }
}

#[async_trait]
impl TokenVerifier for Auth0Verifier {
    async fn verify(&self, token: &str) -> Result<UserInfo, AuthError> {
        let (Some(issuer), Some(jwks_url), Some(audience)) = (
            self.config.issuer(),
            self.config.jwks_url(),
            self.config.audience.clone(),
        ) else {
            return Err(AuthError::Unavailable("Auth0 is not configured".to_string()));
        };

        let header = decode_header(token).map_err(|e| {
            debug!("Unable to decode token header: {}", e);
            AuthError::Unparseable
        })?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let jwk = self.cache.find_key(&issuer, &jwks_url, &kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            warn!("Unusable JWK {}: {}", kid, e);
            AuthError::Unparseable
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);

        let data = decode::<Auth0Claims>(token, &key, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            map_jwt_error(e.kind())
        })?;

        Ok(data.claims.into())
    }

    fn method(&self) -> &'static str {
        "auth0"
    }
}
