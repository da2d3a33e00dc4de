//! Access tokens for Google APIs.
//!
//! Service accounts authenticate with the OAuth 2.0 JWT bearer flow: a JWT
//! signed with the account's private key is exchanged at `token_uri` for an
//! access token that lives about an hour. Tokens are cached and refreshed
//! shortly before they expire.
//! Reference: https://developers.google.com/identity/protocols/oauth2/service-account#httprest

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::StoreError;

/// OAuth scope covering Firestore.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Google's token endpoint, used when the key file omits `token_uri`.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for store requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, StoreError>;
}

/// A fixed token, e.g. from `gcloud auth print-access-token`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

/// Fields of a service account key file that the token flow needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::Config(format!("invalid service account key: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read service account key {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Mints and caches access tokens for a service account.
pub struct ServiceAccountTokens {
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: &ServiceAccountKey, client: Client) -> Result<Self, StoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Config(format!("invalid service account private key: {}", e)))?;

        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    /// Signed JWT asking for a Firestore-scoped access token.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| StoreError::Auth(format!("cannot sign token assertion: {}", e)))
    }

    async fn fetch(&self) -> Result<CachedToken, StoreError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .client
            .post(&self.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "service_account_token_rejected");
            return Err(StoreError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokens {
    async fn token(&self) -> Result<String, StoreError> {
        // Held across the fetch so concurrent callers share one refresh
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let fresh = self.fetch().await?;
        info!(
            client_email = %self.client_email,
            expires_at = %fresh.expires_at,
            "service_account_token_refreshed"
        );

        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const TEST_PRIVATE_KEY: &str =
        include_str!("../../tests/fixtures/service_account_key.pem");

    pub(crate) fn test_key(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey::from_json(
            &json!({
                "type": "service_account",
                "project_id": "demo",
                "client_email": "deleter@demo.iam.gserviceaccount.com",
                "private_key": TEST_PRIVATE_KEY,
                "token_uri": token_uri
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            &json!({ "client_email": "a@b", "private_key": TEST_PRIVATE_KEY }).to_string(),
        )
        .unwrap();
        assert_eq!(key.token_uri, GOOGLE_TOKEN_URI);
        assert!(key.project_id.is_none());
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let mut key = test_key("http://localhost/token");
        key.private_key = "not a pem".to_string();
        assert!(matches!(
            ServiceAccountTokens::new(&key, Client::new()),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_assertion_claims() {
        let tokens =
            ServiceAccountTokens::new(&test_key("https://auth.example.com/token"), Client::new())
                .unwrap();
        let now = Utc::now();
        let jwt = tokens.assertion(now).unwrap();

        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");

        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["iss"], "deleter@demo.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], DATASTORE_SCOPE);
        assert_eq!(claims["aud"], "https://auth.example.com/token");
        assert_eq!(claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(), 3600);
    }

    #[tokio::test]
    async fn test_token_is_cached_while_fresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.first",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens =
            ServiceAccountTokens::new(&test_key(&format!("{}/token", server.uri())), Client::new())
                .unwrap();

        assert_eq!(tokens.token().await.unwrap(), "ya29.first");
        assert_eq!(tokens.token().await.unwrap(), "ya29.first");
    }

    #[tokio::test]
    async fn test_token_endpoint_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let tokens =
            ServiceAccountTokens::new(&test_key(&format!("{}/token", server.uri())), Client::new())
                .unwrap();

        match tokens.token().await {
            Err(StoreError::Auth(message)) => assert!(message.contains("invalid_grant")),
            Err(other) => panic!("Expected Auth error, got {:?}", other),
            Ok(token) => panic!("Expected error, got token {}", token),
        }
    }

    #[test]
    fn test_cached_token_freshness() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));

        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::seconds(600),
        };
        assert!(token.is_fresh(now));
    }
}
