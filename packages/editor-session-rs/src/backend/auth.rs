use reqwest::Response;
use serde_json::{Value, json};
use tokio::sync::watch;

use super::base_headers;
use crate::auth::{AuthClient, AuthSession, extract_error_message, validate_credentials};
use crate::config::BackendConfig;
use crate::error::AuthError;

pub struct RestAuthClient {
    client: reqwest::Client,
    config: BackendConfig,
    session: watch::Sender<Option<AuthSession>>,
}

impl RestAuthClient {
    pub fn new(client: reqwest::Client, config: BackendConfig) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            client,
            config,
            session,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session.subscribe()
    }

    async fn post(&self, path: &str, bearer: &str, body: Value) -> Result<Value, AuthError> {
        let response = self
            .client
            .post(self.config.auth_url(path))
            .headers(base_headers(&self.config.anon_key, bearer)?)
            .json(&body)
            .send()
            .await?;
        read_auth_response(response).await
    }
}

impl AuthClient for RestAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        validate_credentials(email, password)?;
        let body = self
            .post(
                "token?grant_type=password",
                &self.config.anon_key,
                json!({ "email": email, "password": password }),
            )
            .await?;
        let session: AuthSession =
            serde_json::from_value(body).map_err(|error| AuthError::Decode(error.to_string()))?;
        tracing::info!(user_id = %session.user.id, "signed in");
        self.session.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthSession>, AuthError> {
        validate_credentials(email, password)?;
        let body = self
            .post(
                "signup",
                &self.config.anon_key,
                json!({ "email": email, "password": password }),
            )
            .await?;
        let session = parse_sign_up(body)?;
        match &session {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "signed up");
                self.session.send_replace(Some(session.clone()));
            }
            None => tracing::info!("sign-up pending email confirmation"),
        }
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone());
        self.session.send_replace(None);
        if let Some(token) = token {
            self.post("logout", &token, json!({})).await?;
        }
        tracing::info!("signed out");
        Ok(())
    }

    fn session(&self) -> watch::Receiver<Option<AuthSession>> {
        self.subscribe()
    }
}

async fn read_auth_response(response: Response) -> Result<Value, AuthError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    if status.is_success() {
        return Ok(body);
    }
    let message = extract_error_message(&body)
        .or_else(|| body.as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(AuthError::Rejected(message))
}

/// Sign-up answers with a full session when confirmation is disabled, or with the
/// bare user record while the confirmation email is outstanding.
fn parse_sign_up(body: Value) -> Result<Option<AuthSession>, AuthError> {
    if body.get("access_token").is_none() {
        return Ok(None);
    }
    serde_json::from_value(body)
        .map(Some)
        .map_err(|error| AuthError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_without_token_awaits_confirmation() {
        let body = json!({ "id": "user-1", "email": "a@b.c", "confirmation_sent_at": "2024-01-01T00:00:00Z" });
        assert_eq!(parse_sign_up(body).unwrap(), None);
    }

    #[test]
    fn sign_up_with_token_yields_session() {
        let body = json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "refresh_token": "refresh",
            "user": { "id": "user-1", "email": "a@b.c", "role": "authenticated" }
        });
        let session = parse_sign_up(body).unwrap().unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.expires_at, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn invalid_credentials_never_reach_the_network() {
        let config = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: "anon".to_string(),
            table: "documents".to_string(),
        };
        let client = RestAuthClient::new(reqwest::Client::new(), config);
        assert!(matches!(
            client.sign_in("", "secret").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            client.sign_up("a@b.c", "123").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(client.current_user().is_none());
    }
}
