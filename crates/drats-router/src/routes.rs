//! Static routes file.
//!
//! One route per line, `dest gateway port`. `*` as the destination is the
//! default route. Blank lines and lines starting with `#` are ignored.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{RouterError, RouterResult};

/// Destination of the default route.
pub const DEFAULT_ROUTE: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse routes file text. Unparsable lines are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut routes = HashMap::new();
        for line in text.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [dest, gateway, _port] => {
                    routes.insert(dest.to_string(), gateway.to_string());
                }
                _ => log::warn!("Error parsing route line {:?}", line),
            }
        }
        Self { routes }
    }

    /// Read a routes file. A missing file is an empty table.
    pub fn load(path: &Path) -> RouterResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(RouterError::Config {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn insert(&mut self, dest: impl Into<String>, gateway: impl Into<String>) {
        self.routes.insert(dest.into(), gateway.into());
    }

    /// Gateway for exactly `dest`.
    pub fn get(&self, dest: &str) -> Option<&str> {
        self.routes.get(dest).map(String::as_str)
    }

    /// Gateway of the default route.
    pub fn default_route(&self) -> Option<&str> {
        self.get(DEFAULT_ROUTE)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
