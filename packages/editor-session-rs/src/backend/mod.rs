//! REST clients for the hosted backend: PostgREST for documents, GoTrue for auth.

mod auth;
mod store;

pub use auth::RestAuthClient;
pub use store::RestDocumentStore;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::ConfigError;

const REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Auth and document clients sharing one connection pool. The store reads the
/// signed-in session from the auth client.
pub struct Backend {
    pub auth: Arc<RestAuthClient>,
    pub store: Arc<RestDocumentStore>,
}

impl Backend {
    pub fn connect(config: BackendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .build()
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;

        let auth = Arc::new(RestAuthClient::new(client.clone(), config.clone()));
        let store = Arc::new(RestDocumentStore::new(client, config, auth.subscribe()));
        Ok(Self { auth, store })
    }
}

fn base_headers(anon_key: &str, bearer: &str) -> Result<HeaderMap, reqwest::header::InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("apikey", HeaderValue::from_str(anon_key)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {bearer}"))?,
    );
    Ok(headers)
}
