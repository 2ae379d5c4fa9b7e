pub mod auth;
pub mod autosave;
pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod history;
pub mod keymap;
pub mod logs;
pub mod realtime;
pub mod session;
pub mod store;

pub use auth::{AuthClient, AuthSession, User};
pub use autosave::AutosaveCoordinator;
pub use backend::{Backend, RestAuthClient, RestDocumentStore};
pub use config::{BackendConfig, SessionConfig};
pub use document::{Document, DocumentId};
pub use error::{AuthError, ConfigError, SessionError, StoreError};
pub use export::ExportedFile;
pub use history::HistoryManager;
pub use keymap::{HistoryCommand, KeyChord};
pub use logs::{LogBuffer, LogEntry};
pub use realtime::{BroadcastHub, DocumentChange, RealtimeFeed, RealtimeIngestor};
pub use session::{EditorSession, EditorSnapshot, ListTicket, LoadTicket};
pub use store::{DocumentStore, MemoryStore};

use napi::bindgen_prelude::{Buffer, Result as NapiResult};
use napi_derive::napi;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;

type NativeSession = EditorSession<RestDocumentStore, Arc<BroadcastHub>>;

fn to_napi_error(error: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(error.to_string())
}

fn parse_input<T: DeserializeOwned>(value: Value, label: &str) -> NapiResult<T> {
    serde_json::from_value(value).map_err(|error| to_napi_error(format!("Invalid {label}: {error}")))
}

fn to_value(value: &impl Serialize) -> NapiResult<Value> {
    serde_json::to_value(value).map_err(to_napi_error)
}

#[napi(object)]
pub struct ExportPayload {
    #[napi(js_name = "fileName")]
    pub file_name: String,
    #[napi(js_name = "mimeType")]
    pub mime_type: String,
    pub bytes: Buffer,
}

#[napi(js_name = "EditorSession")]
pub struct EditorSessionHandle {
    session: Arc<Mutex<NativeSession>>,
    store: Arc<RestDocumentStore>,
    auth: Arc<RestAuthClient>,
    hub: Arc<BroadcastHub>,
    logs: LogBuffer,
}

#[napi]
impl EditorSessionHandle {
    /// Backend settings come from `config.backend` or, when absent, from the environment.
    #[napi(constructor)]
    pub fn new(config: Option<Value>) -> napi::Result<Self> {
        let config: SessionConfig = match config {
            Some(value) => parse_input(value, "session config")?,
            None => SessionConfig::default(),
        };
        config.validate().map_err(to_napi_error)?;

        let logs = logs::install(config.log_buffer_capacity);
        let backend_config = match config.backend.clone() {
            Some(backend) => backend,
            None => BackendConfig::from_env().map_err(to_napi_error)?,
        };
        let backend = Backend::connect(backend_config).map_err(to_napi_error)?;
        let hub = Arc::new(BroadcastHub::new(config.realtime_buffer));
        let session = EditorSession::new(backend.store.clone(), hub.clone(), &config);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            store: backend.store,
            auth: backend.auth,
            hub,
            logs,
        })
    }

    #[napi(js_name = "signIn")]
    pub async fn sign_in(&self, email: String, password: String) -> NapiResult<Value> {
        let session = self
            .auth
            .sign_in(&email, &password)
            .await
            .map_err(to_napi_error)?;
        to_value(&session.user)
    }

    /// Resolves to `{ user, confirmationRequired }`.
    #[napi(js_name = "signUp")]
    pub async fn sign_up(&self, email: String, password: String) -> NapiResult<Value> {
        let session = self
            .auth
            .sign_up(&email, &password)
            .await
            .map_err(to_napi_error)?;
        Ok(json!({
            "user": session.as_ref().map(|session| &session.user),
            "confirmationRequired": session.is_none(),
        }))
    }

    #[napi(js_name = "signOut")]
    pub async fn sign_out(&self) -> NapiResult<()> {
        {
            let mut session = self.session.lock().await;
            session.close_document();
            session.clear_documents();
        }
        self.auth.sign_out().await.map_err(to_napi_error)
    }

    #[napi(js_name = "currentUser")]
    pub fn current_user(&self) -> NapiResult<Value> {
        to_value(&self.auth.current_user())
    }

    /// A fetch overtaken by a local change to the list (create, delete, sign-out)
    /// is dropped and the current list is returned instead.
    #[napi(js_name = "listDocuments")]
    pub async fn list_documents(&self) -> NapiResult<Value> {
        let ticket = self.session.lock().await.begin_list();
        let fetched = self.store.list().await;

        let mut session = self.session.lock().await;
        match session.finish_list(ticket, fetched) {
            Ok(_) | Err(SessionError::StaleList) => to_value(&session.documents()),
            Err(error) => Err(to_napi_error(error)),
        }
    }

    #[napi(js_name = "createDocument")]
    pub async fn create_document(&self, title: Option<String>) -> NapiResult<Value> {
        let mut session = self.session.lock().await;
        let document = session
            .create_document(title.as_deref().unwrap_or_default())
            .await
            .map_err(to_napi_error)?;
        to_value(&document)
    }

    /// Opens a document already held by the caller, e.g. a row of the list.
    #[napi(js_name = "openDocument")]
    pub async fn open_document(&self, document: Value) -> NapiResult<Value> {
        let document: Document = parse_input(document, "document")?;
        let mut session = self.session.lock().await;
        session.open_document(document);
        to_value(&session.snapshot())
    }

    /// Fetches and opens `documentId`. Resolves to `null` when another switch
    /// happened while the fetch was in flight.
    #[napi(js_name = "loadDocument")]
    pub async fn load_document(&self, document_id: String) -> NapiResult<Option<Value>> {
        let ticket = self
            .session
            .lock()
            .await
            .begin_load(DocumentId::new(document_id));
        let fetched = self.store.fetch(ticket.document_id()).await;

        let mut session = self.session.lock().await;
        match session.finish_load(ticket, fetched) {
            Ok(_) => to_value(&session.snapshot()).map(Some),
            Err(SessionError::StaleResponse(_)) => Ok(None),
            Err(error) => Err(to_napi_error(error)),
        }
    }

    #[napi(js_name = "closeDocument")]
    pub async fn close_document(&self) -> NapiResult<()> {
        self.session.lock().await.close_document();
        Ok(())
    }

    #[napi(js_name = "deleteDocument")]
    pub async fn delete_document(&self, document_id: String) -> NapiResult<()> {
        let mut session = self.session.lock().await;
        session
            .delete_document(&DocumentId::new(document_id))
            .await
            .map_err(to_napi_error)
    }

    #[napi]
    pub async fn edit(&self, content: String) -> NapiResult<bool> {
        self.session
            .lock()
            .await
            .edit(content)
            .map_err(to_napi_error)
    }

    #[napi(js_name = "applyFunctionCall")]
    pub async fn apply_function_call(&self, function_name: String, args: Value) -> NapiResult<Value> {
        let outcome = self
            .session
            .lock()
            .await
            .apply_function_call(&function_name, &args)
            .map_err(to_napi_error)?;
        to_value(&outcome)
    }

    #[napi]
    pub async fn undo(&self) -> NapiResult<bool> {
        Ok(self.session.lock().await.undo())
    }

    #[napi]
    pub async fn redo(&self) -> NapiResult<bool> {
        Ok(self.session.lock().await.redo())
    }

    /// Resolves to `"undo"`, `"redo"` or `null` when the chord is not bound.
    #[napi(js_name = "handleKey")]
    pub async fn handle_key(&self, chord: Value) -> NapiResult<Option<String>> {
        let chord: KeyChord = parse_input(chord, "key chord")?;
        let command = self.session.lock().await.handle_key(&chord);
        Ok(command.map(|command| match command {
            HistoryCommand::Undo => "undo".to_string(),
            HistoryCommand::Redo => "redo".to_string(),
        }))
    }

    #[napi(js_name = "getState")]
    pub async fn get_state(&self) -> NapiResult<Value> {
        to_value(&self.session.lock().await.snapshot())
    }

    #[napi(js_name = "exportDocument")]
    pub async fn export_document(&self) -> NapiResult<ExportPayload> {
        let file = self.session.lock().await.export().map_err(to_napi_error)?;
        Ok(ExportPayload {
            file_name: file.file_name,
            mime_type: file.mime_type,
            bytes: file.bytes.into(),
        })
    }

    /// Forwards a backend change event and folds it into the active document.
    /// Resolves to the number of updates that changed the buffer.
    #[napi(js_name = "publishRemoteUpdate")]
    pub async fn publish_remote_update(&self, document_id: String, content: String) -> NapiResult<u32> {
        self.hub.publish(DocumentChange {
            document_id: DocumentId::new(document_id),
            content,
        });
        let applied = self.session.lock().await.ingest_remote_updates();
        Ok(applied as u32)
    }

    #[napi(js_name = "drainLogs")]
    pub fn drain_logs(&self, after: Option<u32>, limit: Option<u32>) -> NapiResult<Value> {
        let entries = self.logs.drain(
            after.map(u64::from),
            limit.map_or(usize::MAX, |limit| limit as usize),
        );
        to_value(&entries)
    }
}
