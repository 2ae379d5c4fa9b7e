use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::document::{Document, DocumentId, sort_by_recency};
use crate::error::StoreError;

/// Remote record store holding the user's documents.
pub trait DocumentStore: Send + Sync + 'static {
    /// All documents, newest `updated_at` first.
    fn list(&self) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    fn fetch(&self, id: &DocumentId) -> impl Future<Output = Result<Document, StoreError>> + Send;

    fn create(
        &self,
        title: &str,
        content: &str,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;

    fn update(
        &self,
        id: &DocumentId,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, id: &DocumentId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedWrite {
    pub id: DocumentId,
    pub content: String,
}

/// In-process store for offline use. Keeps a log of every accepted `update`.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<DocumentId, Document>>,
    writes: Mutex<Vec<RecordedWrite>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        let store = Self::default();
        if let Ok(mut map) = store.documents.lock() {
            for document in documents {
                map.insert(document.id.clone(), document);
            }
        }
        store
    }

    /// Makes every subsequent `update` and `delete` fail until switched off again.
    pub fn inject_failures(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents.lock().ok()?.get(id).cloned()
    }

    fn check_failing(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 503,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn lock_documents(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<DocumentId, Document>>, StoreError> {
        self.documents.lock().map_err(|_| StoreError::Rejected {
            status: 500,
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl DocumentStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut documents: Vec<Document> = self.lock_documents()?.values().cloned().collect();
        sort_by_recency(&mut documents);
        Ok(documents)
    }

    async fn fetch(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.lock_documents()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn create(&self, title: &str, content: &str) -> Result<Document, StoreError> {
        let now = Utc::now();
        let document = Document {
            id: DocumentId::new(Uuid::new_v4().to_string()),
            title: title.to_string(),
            content: content.to_string(),
            user_id: None,
            created_at: now,
            updated_at: now,
        };
        self.lock_documents()?
            .insert(document.id.clone(), document.clone());
        Ok(document)
    }

    async fn update(
        &self,
        id: &DocumentId,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_failing()?;

        {
            let mut documents = self.lock_documents()?;
            let document = documents
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            document.content = content.to_string();
            document.updated_at = updated_at;
        }

        if let Ok(mut writes) = self.writes.lock() {
            writes.push(RecordedWrite {
                id: id.clone(),
                content: content.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        self.check_failing()?;
        self.lock_documents()?.remove(id);
        Ok(())
    }
}
