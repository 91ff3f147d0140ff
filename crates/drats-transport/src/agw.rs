//! Data path through an AGW packet engine.

use std::fmt;
use std::time::Duration;

use drats_agw::{receive_data, transmit_data, AgwConnection, SharedAgw};
use drats_metrics::{metric_defs, metrics, PortLabels};

use crate::error::{DataPathError, DataPathResult};

/// Timeout applied to AGW sockets opened from a port configuration.
pub const AGW_DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Pseudo-path used on outgoing UI frames.
const AGW_SOURCE_PATH: [&str; 2] = ["SRC", "RELAY"];

/// UI frames exchanged with an AGW server in raw mode.
pub struct AgwDataPath {
    host: String,
    port: u16,
    timeout: Duration,
    agw: Option<SharedAgw>,
    labels: Vec<(&'static str, String)>,
}

impl AgwDataPath {
    /// Unconnected path to `host:port`.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let host = host.into();
        let labels = PortLabels::new(format!("{}:{}", host, port)).to_labels();
        AgwDataPath {
            host,
            port,
            timeout,
            agw: None,
            labels,
        }
    }

    /// Connect and enable raw frame monitoring.
    pub fn connect(&mut self) -> DataPathResult<()> {
        let mut conn = AgwConnection::connect(&self.host, self.port, Some(self.timeout)).map_err(|e| {
            log::info!("AGWPE connect to {}:{} failed: {}", self.host, self.port, e);
            DataPathError::NotConnected("Unable to connect to AGWPE".to_string())
        })?;
        conn.enable_raw()
            .map_err(|_| DataPathError::NotConnected("Unable to connect to AGWPE".to_string()))?;
        self.agw = Some(conn.into_shared());
        Ok(())
    }

    /// Drop the connection.
    pub fn disconnect(&mut self) {
        self.agw = None;
    }

    /// Disconnect and connect again.
    pub fn reconnect(&mut self) -> DataPathResult<()> {
        self.disconnect();
        self.connect()
    }

    fn shared(&self) -> DataPathResult<&SharedAgw> {
        self.agw
            .as_ref()
            .ok_or_else(|| DataPathError::Io("AGWPE not connected".to_string()))
    }

    /// Payload of the next raw frame, or empty.
    pub fn read(&mut self) -> DataPathResult<Vec<u8>> {
        let data = {
            let mut agw = self.shared()?.lock();
            receive_data(&mut *agw, false)?
        };
        if !data.is_empty() {
            metrics::counter!(metric_defs::AGW_FRAMES_RX.name, &self.labels).increment(1);
        }
        Ok(data)
    }

    /// Send `buf` as a UI frame to CQ.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        {
            let mut agw = self.shared()?.lock();
            transmit_data(&mut *agw, "CQ", &AGW_SOURCE_PATH, buf)?;
        }
        metrics::counter!(metric_defs::AGW_FRAMES_TX.name, &self.labels).increment(1);
        Ok(())
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.agw.is_some()
    }

    /// The shared connection, for opening AX.25 sessions over it.
    pub fn get_agw_connection(&self) -> Option<SharedAgw> {
        self.agw.clone()
    }
}

impl fmt::Display for AgwDataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[AGWPE {}:{}]", self.host, self.port)
    }
}
