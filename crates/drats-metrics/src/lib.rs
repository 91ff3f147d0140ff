//! Metric declarations for the D-RATS stack.
//!
//! Every metric the workspace records is declared once in [`metric_defs`] as a
//! const [`Metric`], so call sites never spell a metric name by hand and an
//! exporter can describe the full set at startup with [`describe_metrics`].
//! The `metrics` crate is re-exported so recording crates need only this
//! dependency.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_metrics::{metric_defs, metrics, PortLabels};
//!
//! let labels = PortLabels::new("radio1").to_labels();
//! metrics::counter!(metric_defs::KISS_FRAMES_TX.name, &labels).increment(1);
//! ```

pub use metrics;

mod labels;
mod metric;

pub use labels::*;
pub use metric::*;

/// Every metric recorded by the workspace.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Label key for the configured port name.
    pub const PORT_LABELS: &[&str] = &["port"];

    // ========================================================================
    // Framing
    // ========================================================================

    /// KISS frames written to a TNC.
    pub const KISS_FRAMES_TX: Metric = Metric::counter("drats.kiss.frames_tx")
        .with_description("KISS frames sent to a TNC")
        .with_unit(Unit::Count)
        .with_labels(PORT_LABELS);

    /// KISS frames decoded from a TNC.
    pub const KISS_FRAMES_RX: Metric = Metric::counter("drats.kiss.frames_rx")
        .with_description("KISS frames received from a TNC")
        .with_unit(Unit::Count)
        .with_labels(PORT_LABELS);

    /// UI frames handed to an AGW server.
    pub const AGW_FRAMES_TX: Metric = Metric::counter("drats.agw.frames_tx")
        .with_description("Raw frames sent through AGW")
        .with_unit(Unit::Count)
        .with_labels(PORT_LABELS);

    /// Raw frames delivered by an AGW server.
    pub const AGW_FRAMES_RX: Metric = Metric::counter("drats.agw.frames_rx")
        .with_description("Raw frames received through AGW")
        .with_unit(Unit::Count)
        .with_labels(PORT_LABELS);

    // ========================================================================
    // Data paths
    // ========================================================================

    /// Bytes returned by data path reads.
    pub const DATAPATH_BYTES_READ: Metric = Metric::counter("drats.datapath.bytes_read")
        .with_description("Bytes read from a data path")
        .with_unit(Unit::Bytes)
        .with_labels(PORT_LABELS);

    /// Bytes accepted by data path writes.
    pub const DATAPATH_BYTES_WRITTEN: Metric = Metric::counter("drats.datapath.bytes_written")
        .with_description("Bytes written to a data path")
        .with_unit(Unit::Bytes)
        .with_labels(PORT_LABELS);

    /// Times a serial writer paused on XOFF.
    pub const SERIAL_XOFF_STALLS: Metric = Metric::counter("drats.serial.xoff_stalls")
        .with_description("Serial writes paused by XOFF")
        .with_unit(Unit::Count);

    /// Times XON was assumed after the XOFF limit expired.
    pub const SERIAL_XOFF_TIMEOUTS: Metric = Metric::counter("drats.serial.xoff_timeouts")
        .with_description("XOFF waits that expired and assumed XON")
        .with_unit(Unit::Count);

    // ========================================================================
    // Router
    // ========================================================================

    /// Completed routing passes over the outbox.
    pub const ROUTER_PASSES: Metric = Metric::counter("drats.router.passes")
        .with_description("Routing passes over the outbox")
        .with_unit(Unit::Count);

    /// Time spent in one routing pass.
    pub const ROUTER_PASS_TIME: Metric = Metric::histogram("drats.router.pass_time_ms")
        .with_description("Duration of a routing pass")
        .with_unit(Unit::Milliseconds);

    /// Messages handed off, by method (station, email, wl2k).
    pub const ROUTER_MESSAGES_ROUTED: Metric = Metric::counter("drats.router.messages_routed")
        .with_description("Messages dispatched toward a next hop")
        .with_unit(Unit::Count)
        .with_labels(&["method"]);

    /// Failed transfers toward a station.
    pub const ROUTER_ROUTE_FAILURES: Metric = Metric::counter("drats.router.route_failures")
        .with_description("Failed form transfers")
        .with_unit(Unit::Count);

    /// Pings sent to stale stations.
    pub const ROUTER_PINGS_SENT: Metric = Metric::counter("drats.router.pings_sent")
        .with_description("Pings sent to stations not heard recently")
        .with_unit(Unit::Count);

    /// Messages deferred because their station or port was busy.
    pub const ROUTER_SKIPPED_BUSY: Metric = Metric::counter("drats.router.skipped_busy")
        .with_description("Messages deferred for a busy station or port")
        .with_unit(Unit::Count);

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Transfer workers started, by kind (file, form, socket).
    pub const SESSION_WORKERS_STARTED: Metric = Metric::counter("drats.session.workers_started")
        .with_description("Transfer workers started")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Transfer workers that finished successfully.
    pub const SESSION_WORKERS_COMPLETED: Metric = Metric::counter("drats.session.workers_completed")
        .with_description("Transfer workers that completed")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Transfer workers that were interrupted.
    pub const SESSION_WORKERS_FAILED: Metric = Metric::counter("drats.session.workers_failed")
        .with_description("Transfer workers that failed")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Transfer workers currently tracked.
    pub const SESSION_WORKERS_RUNNING: Metric = Metric::gauge("drats.session.workers_running")
        .with_description("Transfer workers currently running")
        .with_unit(Unit::Count);

    // ========================================================================
    // WL2K
    // ========================================================================

    /// Messages downloaded from a Winlink server.
    pub const WL2K_MESSAGES_RECEIVED: Metric = Metric::counter("drats.wl2k.messages_received")
        .with_description("Messages received from Winlink")
        .with_unit(Unit::Count);

    /// Messages uploaded to a Winlink server.
    pub const WL2K_MESSAGES_SENT: Metric = Metric::counter("drats.wl2k.messages_sent")
        .with_description("Messages sent to Winlink")
        .with_unit(Unit::Count);

    /// Block streams whose EOF checksum did not match.
    pub const WL2K_CHECKSUM_MISMATCHES: Metric = Metric::counter("drats.wl2k.checksum_mismatches")
        .with_description("Winlink block streams with a bad checksum")
        .with_unit(Unit::Count);

    /// All declared metrics.
    pub const ALL: &[&Metric] = &[
        &KISS_FRAMES_TX,
        &KISS_FRAMES_RX,
        &AGW_FRAMES_TX,
        &AGW_FRAMES_RX,
        &DATAPATH_BYTES_READ,
        &DATAPATH_BYTES_WRITTEN,
        &SERIAL_XOFF_STALLS,
        &SERIAL_XOFF_TIMEOUTS,
        &ROUTER_PASSES,
        &ROUTER_PASS_TIME,
        &ROUTER_MESSAGES_ROUTED,
        &ROUTER_ROUTE_FAILURES,
        &ROUTER_PINGS_SENT,
        &ROUTER_SKIPPED_BUSY,
        &SESSION_WORKERS_STARTED,
        &SESSION_WORKERS_COMPLETED,
        &SESSION_WORKERS_FAILED,
        &SESSION_WORKERS_RUNNING,
        &WL2K_MESSAGES_RECEIVED,
        &WL2K_MESSAGES_SENT,
        &WL2K_CHECKSUM_MISMATCHES,
    ];
}

/// Register descriptions for every metric with the installed recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_all_names_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for metric in metric_defs::ALL {
            assert!(metric.name.starts_with("drats."), "{}", metric.name);
            assert!(seen.insert(metric.name), "duplicate {}", metric.name);
            assert!(!metric.description.is_empty());
        }
        assert_eq!(metric_defs::ALL.len(), 21);
    }

    #[test]
    fn test_definitions() {
        assert_eq!(metric_defs::KISS_FRAMES_TX.kind, MetricKind::Counter);
        assert_eq!(metric_defs::KISS_FRAMES_TX.labels, &["port"]);
        assert_eq!(metric_defs::ROUTER_PASS_TIME.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::SESSION_WORKERS_RUNNING.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::DATAPATH_BYTES_READ.unit, Some(Unit::Bytes));
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
