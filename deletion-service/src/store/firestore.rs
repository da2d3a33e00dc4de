//! Cloud Firestore backend using the REST API.
//!
//! Documents are addressed as
//! `{base}/v1/projects/{project}/databases/{database}/documents/{collection}/{id}`.
//! Firestore wraps every field in a typed value (`stringValue`, `integerValue`, ...);
//! this module converts between those and plain JSON.
//! Reference: https://firebase.google.com/docs/firestore/reference/rest

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url::Url;

use super::auth::{ServiceAccountKey, ServiceAccountTokens, StaticToken, TokenProvider};
use super::{Document, DocumentStore, StoreError};
use crate::Config;

/// Production Firestore endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Firestore REST client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    documents_url: Url,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl FirestoreStore {
    /// Create a client for one Firestore database.
    ///
    /// Requests carry a bearer token from `tokens` when one is given.
    pub fn new(
        client: Client,
        base_url: &str,
        project_id: &str,
        database: &str,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self, StoreError> {
        let mut documents_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid base url {}: {}", base_url, e)))?;

        documents_url
            .path_segments_mut()
            .map_err(|_| StoreError::Config(format!("base url cannot be a base: {}", base_url)))?
            .pop_if_empty()
            .extend(["v1", "projects", project_id, "databases", database, "documents"]);

        Ok(Self {
            client,
            documents_url,
            tokens,
        })
    }

    /// Create a client from the service configuration.
    ///
    /// Credentials, in order: `FIRESTORE_ACCESS_TOKEN`, then no auth when
    /// `FIRESTORE_EMULATOR_HOST` is set, then the service account key at
    /// `GOOGLE_APPLICATION_CREDENTIALS`. The project id falls back to the key's.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.store_timeout_ms))
            .build()?;

        let key = match &config.google_application_credentials {
            Some(path) => Some(ServiceAccountKey::from_file(path)?),
            None => None,
        };

        let (tokens, auth): (Option<Arc<dyn TokenProvider>>, &str) =
            match (&config.firestore_access_token, &config.firestore_emulator_host, &key) {
                (Some(token), _, _) => {
                    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(token.clone()));
                    (Some(tokens), "static_token")
                }
                (None, Some(_), _) => (None, "none"),
                (None, None, Some(key)) => {
                    let tokens: Arc<dyn TokenProvider> =
                        Arc::new(ServiceAccountTokens::new(key, client.clone())?);
                    (Some(tokens), "service_account")
                }
                (None, None, None) => {
                    return Err(StoreError::Config(
                        "no Firestore credentials: set GOOGLE_APPLICATION_CREDENTIALS or FIRESTORE_ACCESS_TOKEN"
                            .to_string(),
                    ))
                }
            };

        let project_id = config
            .firestore_project_id
            .clone()
            .or_else(|| key.as_ref().and_then(|k| k.project_id.clone()))
            .ok_or_else(|| StoreError::Config("FIRESTORE_PROJECT_ID is not set".to_string()))?;

        let base_url = match &config.firestore_emulator_host {
            Some(host) => format!("http://{}", host),
            None => FIRESTORE_BASE_URL.to_string(),
        };

        info!(
            base_url = %base_url,
            project_id = %project_id,
            database = %config.firestore_database,
            auth = auth,
            "firestore_store_configured"
        );

        Self::new(
            client,
            &base_url,
            &project_id,
            &config.firestore_database,
            tokens,
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> Url {
        let mut url = self.documents_url.clone();
        // documents_url was validated as a base url in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(collection).push(id);
        }
        url
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.tokens {
            Some(tokens) => Ok(request.bearer_auth(tokens.token().await?)),
            None => Ok(request),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, id);
        let response = self.authorize(self.client.get(url)).await?.send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(collection = collection, id = id, "firestore_document_missing");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let body: Value = response.json().await?;
        let fields = body.get("fields").cloned().unwrap_or_else(|| json!({}));
        decode_fields(&fields).map(Some)
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        let body = json!({ "fields": encode_fields(&document) });
        let response = self
            .authorize(self.client.patch(url))
            .await?
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        let response = self.authorize(self.client.delete(url)).await?.send().await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(status_error(status, response).await);
        }
        Ok(())
    }
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> StoreError {
    let body = response.text().await.unwrap_or_default();
    StoreError::Status {
        status: status.as_u16(),
        body,
    }
}

/// Encode a JSON object as a Firestore `fields` map.
fn encode_fields(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore transports 64-bit integers as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a Firestore `fields` map into a JSON object.
fn decode_fields(fields: &Value) -> Result<Document, StoreError> {
    let fields = fields
        .as_object()
        .ok_or_else(|| StoreError::InvalidDocument("fields is not an object".to_string()))?;

    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect()
}

fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let typed = value
        .as_object()
        .and_then(|m| m.iter().next())
        .map(|(kind, v)| (kind.as_str(), v))
        .ok_or_else(|| StoreError::InvalidDocument(format!("untyped value: {}", value)))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", v @ Value::Bool(_)) => Ok(v.clone()),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| StoreError::InvalidDocument(format!("bad integerValue: {}", s))),
        ("integerValue", v @ Value::Number(_)) => Ok(v.clone()),
        ("doubleValue", v @ Value::Number(_)) => Ok(v.clone()),
        ("stringValue" | "timestampValue" | "referenceValue" | "bytesValue", v @ Value::String(_)) => {
            Ok(v.clone())
        }
        ("geoPointValue", v @ Value::Object(_)) => Ok(v.clone()),
        ("arrayValue", v) => v
            .get("values")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(Value::Array),
        ("mapValue", v) => match v.get("fields") {
            Some(fields) => decode_fields(fields).map(Value::Object),
            None => Ok(Value::Object(Map::new())),
        },
        (kind, v) => Err(StoreError::InvalidDocument(format!(
            "unsupported value {}: {}",
            kind, v
        ))),
    }
}
