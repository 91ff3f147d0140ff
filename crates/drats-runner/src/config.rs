//! Station configuration file.
//!
//! ```yaml
//! callsign: KK7DS
//! store_dir: /var/lib/drats
//! ports:
//!   - "True,agwpe:127.0.0.1:8000,,False,False,radio1"
//! router:
//!   msg_flush: 30
//!   routes_file: /etc/drats/routes.txt
//! email_access:
//!   - "KK7DS,Both,*@example.com"
//! stations:
//!   - { call: W1AW, port: radio1 }
//! wl2k:
//!   mode: network
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use drats_router::{EmailAccess, RouterConfig};
use drats_session::{CoordinatorConfig, TcpForward};
use drats_transport::PortConfig;
use drats_wl2k::{Wl2kConfig, Wl2kMode, DEFAULT_PORT, DEFAULT_SERVER};
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub callsign: String,
    /// Root of the Inbox/Outbox/Sent/Trash folders.
    pub store_dir: PathBuf,
    /// Port entries, `enabled,portspec,rate,sniff,raw,name`.
    pub ports: Vec<String>,
    pub router: RouterSection,
    /// `call,access,pattern` rules for the email gateway.
    pub email_access: Vec<String>,
    /// Directory outgoing email is spooled into for the local MTA.
    pub email_spool: PathBuf,
    /// Socket bridge poll interval, seconds.
    pub sockflush: f64,
    pub tcp_in: Vec<TcpForwardEntry>,
    /// Stations treated as heard when there is no live station list.
    pub stations: Vec<StationEntry>,
    pub wl2k: Wl2kSection,
    pub lzhuf_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            store_dir: PathBuf::from("messages"),
            ports: Vec::new(),
            router: RouterSection::default(),
            email_access: Vec::new(),
            email_spool: PathBuf::from("mail-spool"),
            sockflush: 0.5,
            tcp_in: Vec::new(),
            stations: Vec::new(),
            wl2k: Wl2kSection::default(),
            lzhuf_path: PathBuf::from("lzhuf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// Seconds between passes.
    pub msg_flush: u64,
    pub msg_forward: bool,
    /// Seconds after which a heard station is stale.
    pub station_msg_ttl: u64,
    pub routes_file: Option<PathBuf>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            msg_flush: 30,
            msg_forward: true,
            station_msg_ttl: 600,
            routes_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpForwardEntry {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationEntry {
    pub call: String,
    pub port: String,
    /// When last heard; omitted means "now" on every query.
    #[serde(default)]
    pub heard: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wl2kModeSetting {
    #[default]
    Network,
    Rms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wl2kSection {
    pub mode: Wl2kModeSetting,
    pub server: String,
    pub port: u16,
    pub password: String,
    pub rms_call: String,
    /// Name of the AGW port used to reach `rms_call`.
    pub rms_port: String,
}

impl Default for Wl2kSection {
    fn default() -> Self {
        Self {
            mode: Wl2kModeSetting::Network,
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            rms_call: String::new(),
            rms_port: String::new(),
        }
    }
}

impl Config {
    /// Read and validate a YAML configuration file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&text).map_err(|source| RunnerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RunnerResult<()> {
        if self.callsign.is_empty() {
            return Err(RunnerError::Invalid("callsign is required".into()));
        }
        drats_frame::ssid(&self.callsign)?;
        if self.sockflush <= 0.0 {
            return Err(RunnerError::Invalid(format!("sockflush must be positive, got {}", self.sockflush)));
        }
        if self.wl2k.mode == Wl2kModeSetting::Rms && (self.wl2k.rms_call.is_empty() || self.wl2k.rms_port.is_empty()) {
            return Err(RunnerError::Invalid("wl2k rms mode needs rms_call and rms_port".into()));
        }
        Ok(())
    }

    /// Parsed port entries.
    pub fn port_configs(&self) -> RunnerResult<Vec<PortConfig>> {
        Ok(self
            .ports
            .iter()
            .map(|line| PortConfig::parse(line))
            .collect::<Result<_, _>>()?)
    }

    /// The port entry named `name`.
    pub fn port(&self, name: &str) -> RunnerResult<PortConfig> {
        self.port_configs()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RunnerError::UnknownPort(name.to_string()))
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            mycall: self.callsign.clone(),
            msg_flush: Duration::from_secs(self.router.msg_flush),
            msg_forward: self.router.msg_forward,
            station_msg_ttl: Duration::from_secs(self.router.station_msg_ttl),
            routes_file: self.router.routes_file.clone(),
            email_access: EmailAccess::from_specs(&self.email_access),
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            mycall: self.callsign.clone(),
            download_dir: self.store_dir.join("Downloads"),
            sockflush: Duration::from_secs_f64(self.sockflush),
            tcp_in: self
                .tcp_in
                .iter()
                .map(|t| TcpForward {
                    port: t.port,
                    host: t.host.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn wl2k_config(&self) -> Wl2kConfig {
        Wl2kConfig {
            mode: match self.wl2k.mode {
                Wl2kModeSetting::Network => Wl2kMode::Network,
                Wl2kModeSetting::Rms => Wl2kMode::Rms,
            },
            callsign: self.callsign.clone(),
            server: self.wl2k.server.clone(),
            port: self.wl2k.port,
            password: self.wl2k.password.clone(),
            rms_call: self.wl2k.rms_call.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("callsign: KK7DS\n").unwrap();
        config.validate().unwrap();
        let router = config.router_config();
        assert_eq!(router.msg_flush, Duration::from_secs(30));
        assert!(router.msg_forward);
        assert_eq!(router.station_msg_ttl, Duration::from_secs(600));
        assert_eq!(config.coordinator_config().sockflush, Duration::from_millis(500));
        assert_eq!(config.coordinator_config().block_size, 512);
        let wl2k = config.wl2k_config();
        assert_eq!(wl2k.server, "server.winlink.org");
        assert_eq!(wl2k.port, 8772);
        assert_eq!(wl2k.mode, Wl2kMode::Network);
    }

    #[test]
    fn test_full_file() {
        let yaml = r#"
callsign: KK7DS-5
store_dir: /tmp/drats
ports:
  - "True,agwpe:127.0.0.1:8000,,False,False,radio1"
  - "False,/dev/ttyUSB0,9600,False,False,serial"
router:
  msg_flush: 10
  msg_forward: false
email_access:
  - "KK7DS,Outgoing,*@example.com"
tcp_in:
  - { port: 8080, host: W1AW }
stations:
  - { call: W1AW, port: radio1 }
  - { call: N0CALL, port: radio1, heard: "2024-03-09T14:05:07Z" }
wl2k:
  mode: rms
  rms_call: N7AAM-11
  rms_port: radio1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.port_configs().unwrap().len(), 2);
        assert_eq!(config.port("radio1").unwrap().spec, "agwpe:127.0.0.1:8000");
        assert!(matches!(config.port("nope"), Err(RunnerError::UnknownPort(_))));
        assert_eq!(config.router_config().msg_flush, Duration::from_secs(10));
        assert_eq!(config.router_config().email_access.rules().len(), 1);
        assert_eq!(config.coordinator_config().tcp_in[0].host, "W1AW");
        assert!(config.stations[0].heard.is_none());
        assert!(config.stations[1].heard.is_some());
        assert_eq!(config.wl2k_config().mode, Wl2kMode::Rms);
    }

    #[test]
    fn test_validation() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(RunnerError::Invalid(_))));

        let config = Config {
            callsign: "TOOLONGCALL".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RunnerError::Frame(_))));

        let config = Config {
            callsign: "KK7DS".into(),
            wl2k: Wl2kSection {
                mode: Wl2kModeSetting::Rms,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RunnerError::Invalid(_))));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("missing.yaml")),
            Err(RunnerError::ConfigRead { .. })
        ));
        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "callsign: [not, a, string]\n").unwrap();
        assert!(matches!(Config::load(&bad), Err(RunnerError::ConfigParse { .. })));
    }
}
