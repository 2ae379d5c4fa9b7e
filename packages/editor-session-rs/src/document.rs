use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity assigned by the document store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Newest first, the order the document list is shown in.
pub fn sort_by_recency(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_store_rows() {
        let row = serde_json::json!({
            "id": "5f0c",
            "title": "Notes",
            "content": "a\nb",
            "user_id": "user-1",
            "created_at": "2024-03-01T10:00:00.123456+00:00",
            "updated_at": "2024-03-02T10:00:00+00:00"
        });
        let document: Document = serde_json::from_value(row).unwrap();
        assert_eq!(document.id.as_str(), "5f0c");
        assert_eq!(
            document.updated_at,
            Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn sorts_newest_first() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let build = |id: &str, at| Document {
            id: DocumentId::from(id),
            title: id.to_string(),
            content: String::new(),
            user_id: None,
            created_at: at,
            updated_at: at,
        };
        let mut documents = vec![build("old", older), build("new", newer)];
        sort_by_recency(&mut documents);
        assert_eq!(documents[0].id.as_str(), "new");
    }
}
