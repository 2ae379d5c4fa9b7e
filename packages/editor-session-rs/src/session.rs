use edit_executor_rs::{EditOutcome, execute, line_count};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::autosave::AutosaveCoordinator;
use crate::config::SessionConfig;
use crate::document::{Document, DocumentId, sort_by_recency};
use crate::error::{SessionError, StoreError};
use crate::export::{ExportedFile, export_document};
use crate::history::HistoryManager;
use crate::keymap::{HistoryCommand, KeyChord, resolve};
use crate::realtime::{RealtimeFeed, RealtimeIngestor};
use crate::store::DocumentStore;

const UNTITLED: &str = "Untitled";

/// Proof that a load was started. Only the ticket of the latest switch is honored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    epoch: u64,
    document_id: DocumentId,
}

impl LoadTicket {
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }
}

/// Issued before a list fetch. Any local change to the list invalidates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListTicket {
    generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub document_id: Option<DocumentId>,
    pub title: Option<String>,
    pub content: String,
    pub can_undo: bool,
    pub can_redo: bool,
    pub line_count: usize,
    pub history_len: usize,
    pub pending_save: bool,
}

/// Editing context for one user: the document list, the active document and the
/// history, autosave and realtime bindings that follow it.
///
/// Every switch of the active document bumps `epoch` and retires the old timer and
/// subscription before new ones are created.
pub struct EditorSession<S: DocumentStore, F: RealtimeFeed> {
    store: Arc<S>,
    history: HistoryManager,
    autosave: AutosaveCoordinator<S>,
    realtime: RealtimeIngestor<F>,
    documents: Vec<Document>,
    list_generation: u64,
    active: Option<Document>,
    epoch: u64,
}

impl<S: DocumentStore, F: RealtimeFeed> EditorSession<S, F> {
    pub fn new(store: Arc<S>, feed: F, config: &SessionConfig) -> Self {
        Self {
            autosave: AutosaveCoordinator::new(store.clone(), config.autosave_debounce()),
            store,
            history: HistoryManager::new(String::new(), config.history_capacity),
            realtime: RealtimeIngestor::new(feed),
            documents: Vec::new(),
            list_generation: 0,
            active: None,
            epoch: 0,
        }
    }

    pub fn store(&self) -> Arc<S> {
        self.store.clone()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.active.as_ref()
    }

    pub fn set_documents(&mut self, mut documents: Vec<Document>) {
        sort_by_recency(&mut documents);
        self.documents = documents;
        self.list_generation += 1;
    }

    /// Empties the list cache, e.g. on sign-out. Fetches already in flight are dropped.
    pub fn clear_documents(&mut self) {
        self.set_documents(Vec::new());
    }

    pub fn begin_list(&self) -> ListTicket {
        ListTicket {
            generation: self.list_generation,
        }
    }

    pub fn finish_list(
        &mut self,
        ticket: ListTicket,
        fetched: Result<Vec<Document>, StoreError>,
    ) -> Result<&[Document], SessionError> {
        if ticket.generation != self.list_generation {
            tracing::debug!("stale document list discarded");
            return Err(SessionError::StaleList);
        }
        self.set_documents(fetched?);
        Ok(&self.documents)
    }

    pub async fn list_documents(&mut self) -> Result<&[Document], SessionError> {
        let ticket = self.begin_list();
        let fetched = self.store.list().await;
        self.finish_list(ticket, fetched)
    }

    /// Creates an empty document, puts it at the top of the list and opens it.
    pub async fn create_document(&mut self, title: &str) -> Result<Document, SessionError> {
        let title = match title.trim() {
            "" => UNTITLED,
            trimmed => trimmed,
        };
        let document = self.store.create(title, "").await?;
        tracing::info!(document_id = %document.id, "document created");
        self.documents.insert(0, document.clone());
        self.list_generation += 1;
        self.open_document(document.clone());
        Ok(document)
    }

    /// Makes `document` active with its content as the only history entry.
    pub fn open_document(&mut self, document: Document) {
        self.retire();
        self.epoch += 1;
        self.history = HistoryManager::new(document.content.clone(), self.history.capacity());
        self.autosave.prime(&document.id, &document.content);
        self.realtime.bind(&document.id);
        tracing::info!(document_id = %document.id, epoch = self.epoch, "document opened");
        self.active = Some(document);
    }

    /// Leaves the current document and starts a switch to `document_id`. The fetch
    /// itself happens outside the session; hand its result to `finish_load`.
    pub fn begin_load(&mut self, document_id: DocumentId) -> LoadTicket {
        self.close_document();
        LoadTicket {
            epoch: self.epoch,
            document_id,
        }
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        fetched: Result<Document, StoreError>,
    ) -> Result<&Document, SessionError> {
        if ticket.epoch != self.epoch {
            tracing::debug!(document_id = %ticket.document_id, "stale load discarded");
            return Err(SessionError::StaleResponse(ticket.document_id));
        }
        let document = fetched?;
        if let Some(cached) = self
            .documents
            .iter_mut()
            .find(|cached| cached.id == document.id)
        {
            *cached = document.clone();
            self.list_generation += 1;
        }
        self.open_document(document);
        self.active.as_ref().ok_or(SessionError::NoActiveDocument)
    }

    pub async fn load_document(
        &mut self,
        document_id: DocumentId,
    ) -> Result<&Document, SessionError> {
        let ticket = self.begin_load(document_id);
        let fetched = self.store.fetch(ticket.document_id()).await;
        self.finish_load(ticket, fetched)
    }

    pub fn close_document(&mut self) {
        self.retire();
        self.epoch += 1;
        self.history.reset(String::new());
        if let Some(document) = self.active.take() {
            tracing::info!(document_id = %document.id, "document closed");
        }
    }

    /// Deletes remotely first; the list and active document only change on success.
    pub async fn delete_document(&mut self, document_id: &DocumentId) -> Result<(), SessionError> {
        self.store.delete(document_id).await?;
        self.documents.retain(|document| &document.id != document_id);
        self.list_generation += 1;
        self.autosave.forget(document_id);
        if self.active_id() == Some(document_id) {
            self.close_document();
        }
        tracing::info!(document_id = %document_id, "document deleted");
        Ok(())
    }

    /// Records typed content. Returns `false` when nothing changed.
    pub fn edit(&mut self, content: String) -> Result<bool, SessionError> {
        self.active_id().ok_or(SessionError::NoActiveDocument)?;
        if content == self.history.current() {
            return Ok(false);
        }
        self.commit(content);
        Ok(true)
    }

    /// Runs an AI tool call against the current buffer. Only successful calls
    /// touch history.
    pub fn apply_function_call(
        &mut self,
        function_name: &str,
        arguments: &Value,
    ) -> Result<EditOutcome, SessionError> {
        self.active_id().ok_or(SessionError::NoActiveDocument)?;
        let outcome = execute(function_name, arguments, self.history.current());
        match &outcome.new_content {
            Some(content) if outcome.success => self.commit(content.clone()),
            _ => {
                tracing::debug!(function = %function_name, error = ?outcome.error, "function call rejected")
            }
        }
        Ok(outcome)
    }

    pub fn undo(&mut self) -> bool {
        if self.active.is_none() || !self.history.undo() {
            return false;
        }
        self.settle_history_move();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.active.is_none() || !self.history.redo() {
            return false;
        }
        self.settle_history_move();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn current_content(&self) -> &str {
        self.history.current()
    }

    pub fn line_count(&self) -> usize {
        line_count(self.history.current())
    }

    pub fn export(&self) -> Result<ExportedFile, SessionError> {
        let document = self.active.as_ref().ok_or(SessionError::NoActiveDocument)?;
        Ok(export_document(&document.title, self.history.current()))
    }

    /// Applies the history command bound to `chord`, if any.
    pub fn handle_key(&mut self, chord: &KeyChord) -> Option<HistoryCommand> {
        let command = resolve(chord)?;
        match command {
            HistoryCommand::Undo => self.undo(),
            HistoryCommand::Redo => self.redo(),
        };
        Some(command)
    }

    /// Folds pending remote updates for the active document into history. Returns
    /// how many changed the buffer.
    pub fn ingest_remote_updates(&mut self) -> usize {
        let updates = self.realtime.drain();
        let Some(document_id) = self.active_id().cloned() else {
            return 0;
        };

        let mut applied = 0;
        for content in updates {
            if content == self.history.current() {
                continue;
            }
            self.history.push(content.clone());
            // already persisted remotely; a pending local write would overwrite it
            self.autosave.cancel();
            self.autosave.prime(&document_id, &content);
            applied += 1;
        }
        if applied > 0 {
            tracing::info!(document_id = %document_id, applied, "remote updates applied");
        }
        applied
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            document_id: self.active.as_ref().map(|document| document.id.clone()),
            title: self.active.as_ref().map(|document| document.title.clone()),
            content: self.history.current().to_string(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            line_count: self.line_count(),
            history_len: self.history.len(),
            pending_save: self.autosave.has_pending(),
        }
    }

    fn active_id(&self) -> Option<&DocumentId> {
        self.active.as_ref().map(|document| &document.id)
    }

    fn commit(&mut self, content: String) {
        let Some(document_id) = self.active_id().cloned() else {
            return;
        };
        self.history.push(content.clone());
        self.autosave.schedule(&document_id, content);
    }

    /// The surface echoes the restored snapshot back as a change; consume that echo
    /// here so the suppression flag never outlives the move.
    fn settle_history_move(&mut self) {
        let content = self.history.current().to_string();
        self.history.push(content.clone());
        if let Some(document_id) = self.active_id().cloned() {
            self.autosave.schedule(&document_id, content);
        }
    }

    fn retire(&mut self) {
        self.autosave.cancel();
        self.realtime.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{BroadcastHub, DocumentChange};
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use std::time::Duration;

    type TestSession = EditorSession<MemoryStore, Arc<BroadcastHub>>;

    fn document(id: &str, content: &str, age_minutes: i64) -> Document {
        let at = Utc::now() - ChronoDuration::minutes(age_minutes);
        Document {
            id: DocumentId::from(id),
            title: format!("Doc {id}"),
            content: content.to_string(),
            user_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn session_with(documents: Vec<Document>) -> (Arc<MemoryStore>, Arc<BroadcastHub>, TestSession) {
        let store = Arc::new(MemoryStore::with_documents(documents));
        let hub = Arc::new(BroadcastHub::new(16));
        let session = EditorSession::new(store.clone(), hub.clone(), &SessionConfig::default());
        (store, hub, session)
    }

    fn publish(hub: &BroadcastHub, id: &str, content: &str) {
        hub.publish(DocumentChange {
            document_id: DocumentId::from(id),
            content: content.to_string(),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn typing_is_saved_once_after_debounce() {
        let (store, _hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();

        session.edit("h".to_string()).unwrap();
        session.edit("he".to_string()).unwrap();
        session.edit("hey".to_string()).unwrap();
        assert!(session.snapshot().pending_save);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(store.writes().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].content, "hey");
        assert_eq!(store.get(&DocumentId::from("a")).unwrap().content, "hey");
    }

    #[tokio::test(start_paused = true)]
    async fn opening_a_document_does_not_save_it() {
        let (store, _hub, mut session) = session_with(vec![document("a", "loaded", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();
        assert!(!session.edit("loaded".to_string()).unwrap());
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_documents_cancels_pending_save() {
        let (store, hub, mut session) =
            session_with(vec![document("a", "", 5), document("b", "bee", 1)]);
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.edit("unsaved".to_string()).unwrap();

        session.load_document(DocumentId::from("b")).await.unwrap();
        assert_eq!(hub.subscriber_count(), 1);
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(store.writes().is_empty());
        assert_eq!(session.current_content(), "bee");
        assert!(!session.can_undo());
    }

    #[tokio::test]
    async fn stale_load_is_discarded() {
        let (store, _hub, mut session) =
            session_with(vec![document("a", "alpha", 5), document("b", "beta", 1)]);

        let slow = session.begin_load(DocumentId::from("a"));
        let slow_result = store.fetch(slow.document_id()).await;
        session.load_document(DocumentId::from("b")).await.unwrap();

        assert!(matches!(
            session.finish_load(slow, slow_result),
            Err(SessionError::StaleResponse(_))
        ));
        assert_eq!(session.active_document().unwrap().id.as_str(), "b");
        assert_eq!(session.current_content(), "beta");
    }

    #[tokio::test]
    async fn create_defaults_title_and_opens_document() {
        let (_store, _hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.list_documents().await.unwrap();

        let created = session.create_document("   ").await.unwrap();
        assert_eq!(created.title, "Untitled");
        assert_eq!(session.documents()[0].id, created.id);
        assert_eq!(session.documents().len(), 2);
        assert_eq!(session.active_document().unwrap().id, created.id);
        assert_eq!(session.current_content(), "");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (_store, _hub, mut session) =
            session_with(vec![document("old", "", 60), document("new", "", 1)]);
        let ids: Vec<&str> = session
            .list_documents()
            .await
            .unwrap()
            .iter()
            .map(|document| document.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn deleting_active_document_clears_session() {
        let (store, hub, mut session) = session_with(vec![document("a", "x", 5)]);
        session.list_documents().await.unwrap();
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.edit("xy".to_string()).unwrap();

        session.delete_document(&DocumentId::from("a")).await.unwrap();
        assert!(session.active_document().is_none());
        assert!(session.documents().is_empty());
        assert_eq!(session.current_content(), "");
        assert!(!session.can_undo());
        assert_eq!(hub.subscriber_count(), 0);
        assert!(store.get(&DocumentId::from("a")).is_none());
        assert!(matches!(
            session.edit("z".to_string()),
            Err(SessionError::NoActiveDocument)
        ));
    }

    #[tokio::test]
    async fn function_calls_only_record_successes() {
        let (_store, _hub, mut session) = session_with(vec![document("a", "a\nb\nc", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();

        let outcome = session
            .apply_function_call(
                "replace_line_range",
                &json!({ "start_line": 2, "end_line": 2, "new_content": "B" }),
            )
            .unwrap();
        assert!(outcome.success);
        assert_eq!(session.current_content(), "a\nB\nc");

        let rejected = session
            .apply_function_call(
                "replace_line_range",
                &json!({ "start_line": 5, "end_line": 2, "new_content": "z" }),
            )
            .unwrap();
        assert!(!rejected.success);
        assert_eq!(session.current_content(), "a\nB\nc");
        assert_eq!(session.snapshot().history_len, 2);

        assert!(session.undo());
        assert_eq!(session.current_content(), "a\nb\nc");
    }

    #[tokio::test]
    async fn undo_then_typing_records_the_new_branch() {
        let (_store, _hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.edit("one".to_string()).unwrap();
        session.edit("two".to_string()).unwrap();

        assert!(session.undo());
        assert_eq!(session.current_content(), "one");
        // the surface echoes the restored text back
        assert!(!session.edit("one".to_string()).unwrap());
        assert!(session.edit("one!".to_string()).unwrap());
        assert!(!session.can_redo());
        assert_eq!(session.snapshot().history_len, 3);
    }

    #[tokio::test]
    async fn keyboard_shortcuts_drive_history() {
        let (_store, _hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.edit("typed".to_string()).unwrap();

        let undo = KeyChord {
            key: "z".to_string(),
            meta: true,
            ..KeyChord::default()
        };
        assert_eq!(session.handle_key(&undo), Some(HistoryCommand::Undo));
        assert_eq!(session.current_content(), "");

        let redo = KeyChord {
            key: "y".to_string(),
            ctrl: true,
            ..KeyChord::default()
        };
        assert_eq!(session.handle_key(&redo), Some(HistoryCommand::Redo));
        assert_eq!(session.current_content(), "typed");

        let plain = KeyChord {
            key: "z".to_string(),
            ..KeyChord::default()
        };
        assert_eq!(session.handle_key(&plain), None);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_updates_join_history_without_resaving() {
        let (store, hub, mut session) = session_with(vec![document("a", "local", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();

        publish(&hub, "other", "ignored");
        publish(&hub, "a", "local");
        publish(&hub, "a", "remote");
        assert_eq!(session.ingest_remote_updates(), 1);
        assert_eq!(session.current_content(), "remote");
        assert!(session.can_undo());

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(store.writes().is_empty());

        assert!(session.undo());
        assert_eq!(session.current_content(), "local");
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn remote_updates_after_close_are_dropped() {
        let (_store, hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.close_document();
        publish(&hub, "a", "late");
        assert_eq!(session.ingest_remote_updates(), 0);
        assert_eq!(session.current_content(), "");
    }

    #[tokio::test]
    async fn export_uses_title_and_buffer() {
        let (_store, _hub, mut session) = session_with(vec![document("a", "body", 5)]);
        assert!(matches!(session.export(), Err(SessionError::NoActiveDocument)));
        session.load_document(DocumentId::from("a")).await.unwrap();
        session.edit("body\nmore".to_string()).unwrap();

        let file = session.export().unwrap();
        assert_eq!(file.file_name, "Doc a.txt");
        assert_eq!(file.bytes, b"body\nmore".to_vec());
        assert_eq!(session.line_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_retries_on_next_edit() {
        let (store, _hub, mut session) = session_with(vec![document("a", "", 5)]);
        session.load_document(DocumentId::from("a")).await.unwrap();

        store.inject_failures(true);
        session.edit("draft".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(store.writes().is_empty());

        store.inject_failures(false);
        session.edit("draft.".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.writes()[0].content, "draft.");
    }

    #[tokio::test]
    async fn list_fetched_before_sign_out_is_discarded() {
        let (store, _hub, mut session) = session_with(vec![document("a", "", 5)]);

        let ticket = session.begin_list();
        let fetched = store.list().await;
        session.clear_documents();

        assert!(matches!(
            session.finish_list(ticket, fetched),
            Err(SessionError::StaleList)
        ));
        assert!(session.documents().is_empty());
    }

    #[tokio::test]
    async fn list_fetched_before_create_keeps_new_document() {
        let (store, _hub, mut session) = session_with(vec![document("a", "", 5)]);

        let ticket = session.begin_list();
        let fetched = store.list().await;
        let created = session.create_document("Fresh").await.unwrap();

        assert!(session.finish_list(ticket, fetched).is_err());
        assert_eq!(session.documents().len(), 1);
        assert_eq!(session.documents()[0].id, created.id);

        let ids: Vec<DocumentId> = session
            .list_documents()
            .await
            .unwrap()
            .iter()
            .map(|document| document.id.clone())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&created.id));
    }
}
