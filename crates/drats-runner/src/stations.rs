//! Heard-station list for headless operation.

use std::collections::HashMap;

use chrono::Utc;
use drats_router::{HeardStation, StationSource};

use crate::config::StationEntry;

/// Stations listed in the configuration file.
#[derive(Debug, Default)]
pub struct StaticStations {
    entries: Vec<StationEntry>,
}

impl StaticStations {
    pub fn new(entries: Vec<StationEntry>) -> Self {
        Self { entries }
    }
}

impl StationSource for StaticStations {
    fn stations(&self) -> HashMap<String, Vec<HeardStation>> {
        let now = Utc::now();
        let mut by_port: HashMap<String, Vec<HeardStation>> = HashMap::new();
        for entry in &self.entries {
            by_port
                .entry(entry.port.clone())
                .or_default()
                .push(HeardStation::new(entry.call.as_str(), entry.port.as_str(), entry.heard.unwrap_or(now)));
        }
        by_port
    }
}
