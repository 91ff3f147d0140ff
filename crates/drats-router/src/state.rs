//! Per-station routing memory.
//!
//! Nothing here is persisted; a restart forgets failures and pings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Consecutive failures after which a station is skipped.
pub const FAILURE_LIMIT: u32 = 3;

/// Unanswered pings after which a stale station is skipped.
pub const PING_LIMIT: u32 = 3;

/// How long a station stays busy after a send was started to it.
pub const CALL_TIMEOUT_RETRY: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
pub struct RoutingState {
    failed: HashMap<String, u32>,
    pinged: HashMap<String, u32>,
    sent_call: HashMap<String, Instant>,
    sent_port: HashMap<String, Instant>,
    file_to_call: HashMap<PathBuf, String>,
}

impl RoutingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failure and return the new count.
    pub fn station_failed(&mut self, call: &str) -> u32 {
        let count = self.failed.entry(call.to_string()).or_insert(0);
        *count += 1;
        log::info!("Fail count for {} is {}", call, count);
        *count
    }

    pub fn station_succeeded(&mut self, call: &str) {
        self.failed.insert(call.to_string(), 0);
    }

    pub fn is_station_failed(&self, call: &str) -> bool {
        self.failures(call) >= FAILURE_LIMIT
    }

    pub fn failures(&self, call: &str) -> u32 {
        self.failed.get(call).copied().unwrap_or(0)
    }

    pub fn pinged_incr(&mut self, call: &str) -> u32 {
        let count = self.pinged.entry(call.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn pinged_clear(&mut self, call: &str) {
        self.pinged.insert(call.to_string(), 0);
    }

    pub fn is_pinged_out(&self, call: &str) -> bool {
        self.pinged.get(call).copied().unwrap_or(0) >= PING_LIMIT
    }

    /// Whether a send to `call` started within [`CALL_TIMEOUT_RETRY`].
    pub fn sent_recently(&self, call: &str, now: Instant) -> bool {
        self.sent_call
            .get(call)
            .is_some_and(|t| now.saturating_duration_since(*t) < CALL_TIMEOUT_RETRY)
    }

    pub fn port_free(&self, port: &str) -> bool {
        !self.sent_port.contains_key(port)
    }

    /// Remember a send in flight so its completion can be matched up.
    pub fn record_send(&mut self, call: &str, port: &str, file: &Path, now: Instant) {
        self.sent_call.insert(call.to_string(), now);
        self.sent_port.insert(port.to_string(), now);
        self.file_to_call.insert(file.to_path_buf(), call.to_string());
    }

    /// The call a file was sent to, if its send is still tracked.
    pub fn call_for_file(&self, file: &Path) -> Option<&str> {
        self.file_to_call.get(file).map(String::as_str)
    }

    /// Forget a finished send. Returns the call it went to.
    pub fn finish_send(&mut self, file: &Path, port: &str) -> Option<String> {
        let call = self
            .file_to_call
            .get(file)
            .filter(|c| self.sent_call.contains_key(c.as_str()))
            .cloned();
        if let Some(call) = &call {
            self.sent_call.remove(call);
            self.file_to_call.remove(file);
        }
        self.sent_port.remove(port);
        call
    }

    /// Files with a send in flight.
    pub fn pending_files(&self) -> Vec<PathBuf> {
        self.file_to_call.keys().cloned().collect()
    }

    /// Drop every in-flight send.
    pub fn clear_pending(&mut self) {
        self.sent_call.clear();
        self.sent_port.clear();
        self.file_to_call.clear();
    }
}
