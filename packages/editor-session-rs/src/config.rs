use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_REALTIME_BUFFER: usize = 64;
pub const DEFAULT_LOG_BUFFER_CAPACITY: usize = 512;
const DEFAULT_DOCUMENTS_TABLE: &str = "documents";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub autosave_debounce_ms: u64,
    pub history_capacity: usize,
    pub realtime_buffer: usize,
    pub log_buffer_capacity: usize,
    pub backend: Option<BackendConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            realtime_buffer: DEFAULT_REALTIME_BUFFER,
            log_buffer_capacity: DEFAULT_LOG_BUFFER_CAPACITY,
            backend: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "historyCapacity must be at least 1".to_string(),
            ));
        }
        if self.realtime_buffer == 0 {
            return Err(ConfigError::Invalid(
                "realtimeBuffer must be at least 1".to_string(),
            ));
        }
        if let Some(backend) = &self.backend {
            backend.validate()?;
        }
        Ok(())
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// Hosted backend endpoint: PostgREST under `/rest/v1`, auth under `/auth/v1`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_DOCUMENTS_TABLE.to_string()
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("SUPABASE_URL").map_err(|_| ConfigError::MissingEnv("SUPABASE_URL"))?;
        let anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::MissingEnv("SUPABASE_ANON_KEY"))?;
        let table = env::var("DOCUMENTS_TABLE").unwrap_or_else(|_| default_table());
        let config = Self {
            url,
            anon_key,
            table,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend url must be http(s): {}",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Invalid("anonKey is required".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid("table is required".to_string()));
        }
        Ok(())
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
