//! Payload log
//!
//! Diagnostic sink for JSON payloads accepted by the POST handler.

use serde_json::Value;

/// Receives each successfully parsed request payload
pub trait PayloadLog: Send + Sync {
    fn record(&self, payload: &Value);
}

/// Writes payloads to the process info log as compact JSON
pub struct DiagnosticLog;

impl PayloadLog for DiagnosticLog {
    fn record(&self, payload: &Value) {
        super::write_info(&format!("[Payload] {payload}"));
    }
}

/// Keeps every recorded payload in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingLog {
    entries: std::sync::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl RecordingLog {
    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl PayloadLog for RecordingLog {
    fn record(&self, payload: &Value) {
        self.entries.lock().unwrap().push(payload.clone());
    }
}
