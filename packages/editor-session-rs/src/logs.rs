use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static GLOBAL_LOGS: OnceLock<LogBuffer> = OnceLock::new();

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub sequence: u64,
    pub level: String,
    pub target: String,
    pub message: Option<String>,
    pub fields: BTreeMap<String, Value>,
    pub timestamp_ms: i64,
}

#[derive(Default)]
struct Ring {
    entries: VecDeque<LogEntry>,
    next_sequence: u64,
}

/// Bounded in-memory sink for tracing events, drained by the host UI.
#[derive(Clone)]
pub struct LogBuffer {
    ring: Arc<Mutex<Ring>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            buffer: self.clone(),
        }
    }

    /// Entries with a sequence greater than `after`, oldest first.
    pub fn drain(&self, after: Option<u64>, limit: usize) -> Vec<LogEntry> {
        let Ok(ring) = self.ring.lock() else {
            return Vec::new();
        };
        ring.entries
            .iter()
            .filter(|entry| after.is_none_or(|after| entry.sequence > after))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence of the newest captured entry.
    pub fn cursor(&self) -> Option<u64> {
        let ring = self.ring.lock().ok()?;
        ring.entries.back().map(|entry| entry.sequence)
    }

    fn push(&self, mut entry: LogEntry) {
        let Ok(mut ring) = self.ring.lock() else {
            return;
        };
        entry.sequence = ring.next_sequence;
        ring.next_sequence += 1;
        ring.entries.push_back(entry);
        while ring.entries.len() > self.capacity {
            ring.entries.pop_front();
        }
    }
}

/// Installs the process-wide subscriber once: capture layer plus stderr output.
/// Later calls return the buffer from the first call.
pub fn install(capacity: usize) -> LogBuffer {
    GLOBAL_LOGS
        .get_or_init(|| {
            let buffer = LogBuffer::new(capacity);
            let _ = tracing_subscriber::registry()
                .with(buffer.layer())
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .try_init();
            buffer
        })
        .clone()
}

#[derive(Clone)]
pub struct CaptureLayer {
    buffer: LogBuffer,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldRecorder::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        let message = fields.remove("message").map(|value| match value {
            Value::String(text) => text,
            other => other.to_string(),
        });

        self.buffer.push(LogEntry {
            sequence: 0,
            level: metadata.level().as_str().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
            timestamp_ms: Utc::now().timestamp_millis(),
        });
    }
}

/// Collects event fields as JSON. Counters stay numeric; everything else this crate
/// logs (ids, errors, messages) arrives as a string or through `Debug`.
#[derive(Default)]
struct FieldRecorder {
    fields: BTreeMap<String, Value>,
}

impl FieldRecorder {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldRecorder {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}").into());
    }
}
