use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::watch;

use super::base_headers;
use crate::auth::AuthSession;
use crate::config::BackendConfig;
use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::store::DocumentStore;

/// Documents table behind PostgREST. Row-level security scopes every query to the
/// signed-in user, so requests carry the session token when there is one.
pub struct RestDocumentStore {
    client: reqwest::Client,
    config: BackendConfig,
    session: watch::Receiver<Option<AuthSession>>,
}

impl RestDocumentStore {
    pub fn new(
        client: reqwest::Client,
        config: BackendConfig,
        session: watch::Receiver<Option<AuthSession>>,
    ) -> Self {
        Self {
            client,
            config,
            session,
        }
    }

    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone());
        Ok(base_headers(&self.config.anon_key, &token)?)
    }

    fn user_id(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|session| session.user.id.clone())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.headers(self.headers()?).send().await?;
        check_status(response).await
    }
}

fn id_filter(id: &DocumentId) -> (&'static str, String) {
    ("id", format!("eq.{id}"))
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|error| StoreError::Decode(error.to_string()))
}

impl DocumentStore for RestDocumentStore {
    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let request = self
            .client
            .get(self.config.rest_url())
            .query(&[("select", "*"), ("order", "updated_at.desc")]);
        decode(self.send(request).await?).await
    }

    async fn fetch(&self, id: &DocumentId) -> Result<Document, StoreError> {
        let request = self
            .client
            .get(self.config.rest_url())
            .query(&[("select", "*".to_string()), id_filter(id)]);
        let rows: Vec<Document> = decode(self.send(request).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn create(&self, title: &str, content: &str) -> Result<Document, StoreError> {
        let user_id = self.user_id().ok_or(StoreError::Unauthenticated)?;
        let request = self
            .client
            .post(self.config.rest_url())
            .header("Prefer", HeaderValue::from_static("return=representation"))
            .json(&json!({ "title": title, "content": content, "user_id": user_id }));
        let rows: Vec<Document> = decode(self.send(request).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(
        &self,
        id: &DocumentId,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .patch(self.config.rest_url())
            .query(&[id_filter(id)])
            .json(&json!({ "content": content, "updated_at": updated_at }));
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.config.rest_url())
            .query(&[id_filter(id)]);
        self.send(request).await?;
        Ok(())
    }
}
