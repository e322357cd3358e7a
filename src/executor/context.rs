use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// One detected slow request, kept for end-of-run reporting only.
#[derive(Debug, Clone, PartialEq)]
pub struct SlowRequestRecord {
    pub endpoint: String,
    pub duration_ms: u64,
    /// Unix epoch milliseconds at classification time.
    pub timestamp: i64,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub threshold_ms: u64,
}

/// Run-scoped shared state: values captured from responses for later
/// substitution, and the slow-request log.
///
/// Both maps are shared by every concurrent iteration with last-writer-wins
/// semantics. Writes to distinct stored keys are independent; two iterations
/// racing on the *same* key interleave unpredictably, which callers accept
/// by scenario design (e.g. a single-VU token fetch before dependent
/// scenarios). The mutexes guard individual operations only; nothing is
/// coordinated across requests.
#[derive(Debug, Default)]
pub struct RunContext {
    stored: Mutex<HashMap<String, Value>>,
    slow_requests: Mutex<Vec<SlowRequestRecord>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, key: impl Into<String>, value: Value) {
        self.stored.lock().unwrap().insert(key.into(), value);
    }

    /// Copy of the stored map for one substitution pass.
    pub fn stored_snapshot(&self) -> HashMap<String, Value> {
        self.stored.lock().unwrap().clone()
    }

    pub fn record_slow(&self, record: SlowRequestRecord) {
        self.slow_requests.lock().unwrap().push(record);
    }

    pub fn slow_requests(&self) -> Vec<SlowRequestRecord> {
        self.slow_requests.lock().unwrap().clone()
    }
}
