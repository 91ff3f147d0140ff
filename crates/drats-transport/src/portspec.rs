//! Port configuration strings.

use std::time::Duration;

use crate::agw::{AgwDataPath, AGW_DEFAULT_TIMEOUT};
use crate::datapath::DataPath;
use crate::error::{DataPathError, DataPathResult};
use crate::serial::SerialDataPath;
use crate::socket::SocketDataPath;
use crate::tnc::{TncAx25DataPath, TncDataPath};

/// Default read timeout for serial and socket paths.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Local port of a USB dongle's socket bridge.
pub const DONGLE_PORT: u16 = 20003;

/// One `enabled,portspec,rate,sniff,raw,name` configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Whether the port should be started.
    pub enabled: bool,
    /// Transport specification.
    pub spec: String,
    /// Baud rate for serial ports, password for network ports.
    pub rate: String,
    /// Log traffic not addressed to us.
    pub sniff: bool,
    /// Raw (unframed) mode.
    pub raw: bool,
    /// Display name.
    pub name: String,
}

fn parse_flag(text: &str) -> bool {
    text == "True"
}

impl PortConfig {
    /// Parse a configuration entry.
    pub fn parse(line: &str) -> DataPathResult<Self> {
        let fields: Vec<&str> = line.split(',').collect();
        let [enabled, spec, rate, sniff, raw, name] = fields.as_slice() else {
            return Err(DataPathError::InvalidPortSpec(format!(
                "expected 6 fields, got {}: {}",
                fields.len(),
                line
            )));
        };
        Ok(PortConfig {
            enabled: parse_flag(enabled),
            spec: spec.to_string(),
            rate: rate.to_string(),
            sniff: parse_flag(sniff),
            raw: parse_flag(raw),
            name: name.to_string(),
        })
    }

    fn baud(&self) -> DataPathResult<u32> {
        self.rate
            .trim()
            .parse()
            .map_err(|_| DataPathError::InvalidPortSpec(format!("bad baud rate '{}' for {}", self.rate, self.name)))
    }

    /// Build the (unconnected) data path this entry describes.
    pub fn open(&self, mycall: &str) -> DataPathResult<DataPath> {
        let spec = self.spec.as_str();

        if let Some(rest) = spec.strip_prefix("tnc-ax25:") {
            let parts: Vec<&str> = rest.split(':').collect();
            let [device, tncport, digis] = parts.as_slice() else {
                return Err(DataPathError::InvalidPortSpec(spec.to_string()));
            };
            let tnc = TncDataPath::new(&format!("{}:{}", device, tncport), self.baud()?, DEFAULT_TIMEOUT)?;
            let digis = digis
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
            return Ok(DataPath::TncAx25(TncAx25DataPath::new(tnc, mycall, digis)));
        }

        if let Some(device) = spec.strip_prefix("tnc:") {
            return Ok(DataPath::Tnc(TncDataPath::new(device, self.baud()?, DEFAULT_TIMEOUT)?));
        }

        if spec.starts_with("dongle:") {
            return Ok(DataPath::Socket(SocketDataPath::outgoing(
                "127.0.0.1",
                DONGLE_PORT,
                mycall,
                None,
                DEFAULT_TIMEOUT,
            )));
        }

        if let Some(rest) = spec.strip_prefix("agwpe:") {
            let (host, port) = split_host_port(rest, spec)?;
            return Ok(DataPath::Agw(AgwDataPath::new(host, port, AGW_DEFAULT_TIMEOUT)));
        }

        if spec.contains(':') {
            let parts: Vec<&str> = spec.split(':').collect();
            let [_mode, host, port] = parts.as_slice() else {
                return Err(DataPathError::InvalidPortSpec(format!("Invalid port string {}", spec)));
            };
            let (host, port) = split_host_port(&format!("{}:{}", host, port), spec)?;
            return Ok(DataPath::Socket(SocketDataPath::outgoing(
                host,
                port,
                mycall,
                Some(self.rate.clone()),
                DEFAULT_TIMEOUT,
            )));
        }

        Ok(DataPath::Serial(SerialDataPath::new(spec, self.baud()?, DEFAULT_TIMEOUT)))
    }
}

fn split_host_port(text: &str, spec: &str) -> DataPathResult<(String, u16)> {
    let (host, port) = text
        .split_once(':')
        .ok_or_else(|| DataPathError::InvalidPortSpec(spec.to_string()))?;
    let port = port
        .trim()
        .parse()
        .map_err(|_| DataPathError::InvalidPortSpec(format!("bad port number in {}", spec)))?;
    Ok((host.to_string(), port))
}
