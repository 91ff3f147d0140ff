//! Message compression.
//!
//! Winlink payloads are LZHUF compressed. We do not carry our own LZHUF
//! implementation; [`LzhufProcess`] drives the stock `lzhuf` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use drats_frame::calc_checksum;

use crate::error::{Wl2kError, Wl2kResult};

/// Compresses message content for the wire.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>>;
}

/// Default limit on a single `lzhuf` run.
pub const LZHUF_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external `lzhuf` program as `lzhuf e|d input output`.
///
/// Compressed data carries a little-endian CRC-16 of the LZHUF stream in
/// front, which `compress` adds and `decompress` strips.
#[derive(Debug, Clone)]
pub struct LzhufProcess {
    program: PathBuf,
    timeout: Duration,
}

impl LzhufProcess {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: LZHUF_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn resolved_program(&self) -> Wl2kResult<PathBuf> {
        // A bare name is looked up on PATH; anything else must survive the
        // change of working directory.
        if self.program.is_relative() && self.program.components().count() > 1 {
            Ok(std::env::current_dir()?.join(&self.program))
        } else {
            Ok(self.program.clone())
        }
    }

    fn run(&self, mode: &str, data: &[u8]) -> Wl2kResult<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("input"), data)?;

        let program = self.resolved_program()?;
        log::info!("Running {} {} in {}", program.display(), mode, dir.path().display());
        let mut child = Command::new(&program)
            .args([mode, "input", "output"])
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Wl2kError::Compression(format!("unable to run {}: {}", program.display(), e)))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Wl2kError::Compression(format!(
                    "{} did not finish within {:?}",
                    program.display(),
                    self.timeout
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };
        log::info!("LZHUF returned {}", status);
        if !status.success() {
            return Err(Wl2kError::Compression(format!("{} exited with {}", program.display(), status)));
        }

        Ok(fs::read(dir.path().join("output"))?)
    }
}

impl Compressor for LzhufProcess {
    fn compress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
        let lzh = self.run("e", data)?;
        let mut out = Vec::with_capacity(lzh.len() + 2);
        out.extend_from_slice(&calc_checksum(&lzh).to_le_bytes());
        out.extend_from_slice(&lzh);
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
        if data.len() < 2 {
            return Err(Wl2kError::Compression(format!(
                "compressed payload too short ({} bytes)",
                data.len()
            )));
        }
        self.run("d", &data[2..])
    }
}
