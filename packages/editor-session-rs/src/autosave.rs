use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::document::DocumentId;
use crate::store::DocumentStore;

/// Persistence state of one document. `revision` orders completions so a slow write
/// can never overwrite the record of a newer one; `in_flight` counts writes that have
/// left the timer but not yet completed.
#[derive(Clone, Debug, Default)]
struct SaveState {
    revision: u64,
    content: Option<String>,
    in_flight: usize,
}

type SavedMap = Arc<Mutex<HashMap<DocumentId, SaveState>>>;

struct PendingSave {
    document_id: DocumentId,
    timer: JoinHandle<()>,
}

/// Debounced persistence of the active buffer.
///
/// At most one timer is armed at a time. When it fires the write is spawned as its
/// own task, so re-arming the timer never cancels a write already on the wire.
pub struct AutosaveCoordinator<S: DocumentStore> {
    store: Arc<S>,
    debounce: Duration,
    saved: SavedMap,
    pending: Option<PendingSave>,
    revision: u64,
}

impl<S: DocumentStore> AutosaveCoordinator<S> {
    pub fn new(store: Arc<S>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            saved: Arc::new(Mutex::new(HashMap::new())),
            pending: None,
            revision: 0,
        }
    }

    /// Marks `content` as already persisted, e.g. right after it was loaded.
    pub fn prime(&mut self, document_id: &DocumentId, content: &str) {
        self.revision += 1;
        if let Ok(mut saved) = self.saved.lock() {
            let state = saved.entry(document_id.clone()).or_default();
            state.revision = self.revision;
            state.content = Some(content.to_string());
        }
    }

    /// Re-arms the debounce timer for `content`. Returns `false` when the content is
    /// already persisted and no write for the document is still in flight.
    pub fn schedule(&mut self, document_id: &DocumentId, content: String) -> bool {
        self.cancel();

        if self.is_settled(document_id, &content) {
            tracing::debug!(document_id = %document_id, "autosave skipped, content unchanged");
            return false;
        }

        self.revision += 1;
        let revision = self.revision;
        let store = self.store.clone();
        let saved = self.saved.clone();
        let debounce = self.debounce;
        let id = document_id.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Ok(mut states) = saved.lock() {
                states.entry(id.clone()).or_default().in_flight += 1;
            }
            tokio::spawn(persist(store, saved, id, content, revision));
        });

        self.pending = Some(PendingSave {
            document_id: document_id.clone(),
            timer,
        });
        true
    }

    /// Disarms the pending timer, if any. In-flight writes are left alone.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }

    /// Drops every trace of `document_id`; completions still in flight are ignored.
    pub fn forget(&mut self, document_id: &DocumentId) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| &pending.document_id == document_id)
        {
            self.cancel();
        }
        self.revision += 1;
        if let Ok(mut saved) = self.saved.lock() {
            let state = saved.entry(document_id.clone()).or_default();
            state.revision = self.revision;
            state.content = None;
        }
    }

    pub fn last_saved(&self, document_id: &DocumentId) -> Option<String> {
        self.saved
            .lock()
            .ok()?
            .get(document_id)
            .and_then(|state| state.content.clone())
    }

    /// True when `content` is what the store holds and will keep holding: an older
    /// write still in flight could land after it and leave something else behind.
    fn is_settled(&self, document_id: &DocumentId, content: &str) -> bool {
        let Ok(saved) = self.saved.lock() else {
            return false;
        };
        saved.get(document_id).is_some_and(|state| {
            state.in_flight == 0 && state.content.as_deref() == Some(content)
        })
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.timer.is_finished())
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl<S: DocumentStore> Drop for AutosaveCoordinator<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn persist<S: DocumentStore>(
    store: Arc<S>,
    saved: SavedMap,
    document_id: DocumentId,
    content: String,
    revision: u64,
) {
    let result = store.update(&document_id, &content, Utc::now()).await;
    let Ok(mut saved) = saved.lock() else {
        return;
    };
    let state = saved.entry(document_id.clone()).or_default();
    state.in_flight = state.in_flight.saturating_sub(1);

    match result {
        Ok(()) if state.revision > revision => {
            tracing::debug!(document_id = %document_id, revision, "autosave completion superseded");
        }
        Ok(()) => {
            state.revision = revision;
            state.content = Some(content);
            tracing::info!(document_id = %document_id, revision, "autosave persisted");
        }
        Err(error) => {
            tracing::warn!(document_id = %document_id, revision, %error, "autosave failed");
        }
    }
}
