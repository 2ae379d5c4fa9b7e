use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::document::DocumentId;

/// "Document updated" notification delivered by the backend change feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    pub document_id: DocumentId,
    pub content: String,
}

pub trait RealtimeFeed: Send + Sync + 'static {
    type Subscription: RealtimeSubscription;

    fn subscribe(&self, document_id: &DocumentId) -> Self::Subscription;
}

/// Live subscription to one document. Dropping it releases the feed.
pub trait RealtimeSubscription: Send + 'static {
    fn document_id(&self) -> &DocumentId;

    /// Next pending update without waiting.
    fn try_next(&mut self) -> Option<String>;

    /// Waits for the next update; `None` once the feed has shut down.
    fn next(&mut self) -> impl Future<Output = Option<String>> + Send;

    fn unsubscribe(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// In-process fan-out of change events. The frontend forwards backend events here.
pub struct BroadcastHub {
    sender: broadcast::Sender<DocumentChange>,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Returns how many subscriptions received the change.
    pub fn publish(&self, change: DocumentChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl RealtimeFeed for BroadcastHub {
    type Subscription = BroadcastSubscription;

    fn subscribe(&self, document_id: &DocumentId) -> BroadcastSubscription {
        BroadcastSubscription {
            document_id: document_id.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl<T: RealtimeFeed> RealtimeFeed for Arc<T> {
    type Subscription = T::Subscription;

    fn subscribe(&self, document_id: &DocumentId) -> Self::Subscription {
        self.as_ref().subscribe(document_id)
    }
}

pub struct BroadcastSubscription {
    document_id: DocumentId,
    receiver: broadcast::Receiver<DocumentChange>,
}

impl RealtimeSubscription for BroadcastSubscription {
    fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    fn try_next(&mut self) -> Option<String> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if change.document_id == self.document_id => {
                    return Some(change.content);
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(document_id = %self.document_id, skipped, "realtime feed lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    async fn next(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.document_id == self.document_id => {
                    return Some(change.content);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(document_id = %self.document_id, skipped, "realtime feed lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Holds at most one live subscription, for the active document.
pub struct RealtimeIngestor<F: RealtimeFeed> {
    feed: F,
    subscription: Option<F::Subscription>,
}

impl<F: RealtimeFeed> RealtimeIngestor<F> {
    pub fn new(feed: F) -> Self {
        Self {
            feed,
            subscription: None,
        }
    }

    /// Tears down the previous subscription before subscribing to `document_id`.
    pub fn bind(&mut self, document_id: &DocumentId) {
        self.unbind();
        self.subscription = Some(self.feed.subscribe(document_id));
        tracing::info!(document_id = %document_id, "realtime subscribed");
    }

    pub fn unbind(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::info!(document_id = %subscription.document_id(), "realtime unsubscribed");
            subscription.unsubscribe();
        }
    }

    pub fn bound_document(&self) -> Option<&DocumentId> {
        self.subscription
            .as_ref()
            .map(|subscription| subscription.document_id())
    }

    /// Drains every update already delivered for the bound document.
    pub fn drain(&mut self) -> Vec<String> {
        let mut updates = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Some(content) = subscription.try_next() {
                updates.push(content);
            }
        }
        updates
    }

    pub async fn next_update(&mut self) -> Option<String> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => None,
        }
    }
}
