//! Status lines for transfers in progress.

use std::time::Instant;

use crate::session::TransferStats;

/// Status shown when a transfer finishes.
pub const STATUS_COMPLETED: &str = "Transfer Completed";

/// Which counter measures progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKey {
    /// `recv_size`, for incoming transfers.
    Recv,
    /// `sent_size`, for outgoing transfers.
    Sent,
}

impl ProgressKey {
    pub fn value(&self, stats: &TransferStats) -> u64 {
        match self {
            ProgressKey::Recv => stats.recv_size,
            ProgressKey::Sent => stats.sent_size,
        }
    }
}

/// Percent complete, 0 when the total is unknown.
pub fn percent_complete(stats: &TransferStats, key: ProgressKey) -> f64 {
    if stats.total_size == 0 {
        0.0
    } else {
        key.value(stats) as f64 / stats.total_size as f64 * 100.0
    }
}

/// Render `"{msg} [{pct}%]{speed}{total}{retries}"`.
///
/// ```rust
/// use drats_session::{format_status, ProgressKey, TransferStats};
///
/// let stats = TransferStats {
///     msg: "Sending".into(),
///     total_size: 200,
///     sent_size: 50,
///     sent_wire: 80,
///     ..Default::default()
/// };
/// let now = std::time::Instant::now();
/// assert_eq!(format_status(&stats, ProgressKey::Sent, now), "Sending [25%] (Total 80 B)");
/// ```
pub fn format_status(stats: &TransferStats, key: ProgressKey, now: Instant) -> String {
    let pct = percent_complete(stats, key);

    let speed = stats
        .start_time
        .map(|start| now.saturating_duration_since(start).as_secs_f64())
        .filter(|elapsed| *elapsed > 0.0)
        .map(|elapsed| format!(" {:.2} B/s", key.value(stats) as f64 / elapsed))
        .unwrap_or_default();

    let total = match stats.sent_wire {
        0 => String::new(),
        amt if amt > 1024 => format!(" (Total {:.1} KB)", (amt >> 10) as f64),
        amt => format!(" (Total {} B)", amt),
    };

    format!("{} [{:02.0}%]{}{}{}", stats.msg, pct, speed, total, retries_suffix(stats.retries))
}

/// `Transfer Interrupted (P% complete)`.
pub fn format_interrupted(pct: f64) -> String {
    format!("Transfer Interrupted ({:.0}% complete)", pct)
}

/// Byte counters of a socket bridge.
pub fn format_socket_status(stats: &TransferStats) -> String {
    format!(
        "{} bytes sent {} bytes received{}",
        stats.sent_size,
        stats.recv_size,
        retries_suffix(stats.retries)
    )
}

fn retries_suffix(retries: u32) -> String {
    if retries > 0 {
        format!(" ({} retries)", retries)
    } else {
        String::new()
    }
}
