//! KISS TNC data paths.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use drats_frame::{kiss_encode_frame, Ax25Header, KissCodec, KISS_READ_SIZE};
use drats_metrics::{metric_defs, metrics, PortLabels};

use crate::error::{DataPathError, DataPathResult};
use crate::serial::{open_serial, read_up_to, SerialLink};

/// Destination callsign on frames from the AX.25 data path.
pub const TNC_AX25_DEST: &str = "DRATS";

/// Serial link to a KISS TNC.
pub struct TncSerial {
    link: Box<dyn SerialLink>,
    tncport: u8,
    codec: KissCodec,
    labels: Vec<(&'static str, String)>,
}

impl TncSerial {
    /// Wrap `link`, addressing frames to `tncport`.
    pub fn new(link: Box<dyn SerialLink>, tncport: u8, name: &str) -> Self {
        TncSerial {
            link,
            tncport,
            codec: KissCodec::new(),
            labels: PortLabels::new(name).to_labels(),
        }
    }

    /// Send `data` as one KISS frame.
    ///
    /// Writes may take ten times the read timeout.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let frame = kiss_encode_frame(data, self.tncport);
        log::trace!("[TNC] Sending: {}", hex::encode(&frame));

        let read_timeout = self.link.timeout();
        self.link.set_timeout(read_timeout * 10)?;
        let result = self.link.write_all(&frame).and_then(|_| self.link.flush());
        self.link.set_timeout(read_timeout)?;
        result?;

        metrics::counter!(metric_defs::KISS_FRAMES_TX.name, &self.labels).increment(1);
        Ok(())
    }

    /// Read what the TNC has sent and return the payload of any frames now
    /// complete. A partial frame stays buffered for the next call.
    pub fn read(&mut self) -> io::Result<Vec<u8>> {
        let chunk = read_up_to(self.link.as_mut(), KISS_READ_SIZE)?;
        if self.codec.buffered_len() > 0 {
            log::trace!("[TNC] Buffer is {} before read", self.codec.buffered_len());
        }
        self.codec.push(&chunk);
        match self.codec.decode() {
            Some(data) => {
                metrics::counter!(metric_defs::KISS_FRAMES_RX.name, &self.labels).increment(1);
                Ok(data)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Bytes of an incomplete frame held back.
    pub fn buffered_len(&self) -> usize {
        self.codec.buffered_len()
    }

    /// Flush pending output.
    pub fn flush(&mut self) -> io::Result<()> {
        self.link.flush()
    }
}

/// Split `device[:tncport]`.
pub fn split_tnc_device(spec: &str) -> DataPathResult<(String, u8)> {
    match spec.split_once(':') {
        Some((device, port)) => {
            let port = port
                .trim()
                .parse()
                .map_err(|_| DataPathError::InvalidPortSpec(format!("bad TNC port in {}", spec)))?;
            Ok((device.to_string(), port))
        }
        None => Ok((spec.to_string(), 0)),
    }
}

/// KISS-framed serial data path.
pub struct TncDataPath {
    device: String,
    tncport: u8,
    baud: u32,
    timeout: Duration,
    serial: Option<TncSerial>,
}

impl TncDataPath {
    /// Unopened path for `device[:tncport]` at `baud`.
    pub fn new(device: &str, baud: u32, timeout: Duration) -> DataPathResult<Self> {
        let (device, tncport) = split_tnc_device(device)?;
        Ok(TncDataPath {
            device,
            tncport,
            baud,
            timeout,
            serial: None,
        })
    }

    /// Path over an already-open link.
    pub fn with_link(device: &str, baud: u32, link: Box<dyn SerialLink>) -> DataPathResult<Self> {
        let timeout = link.timeout();
        let mut path = Self::new(device, baud, timeout)?;
        path.serial = Some(TncSerial::new(link, path.tncport, &path.device));
        Ok(path)
    }

    /// Open the device.
    pub fn connect(&mut self) -> DataPathResult<()> {
        let link = open_serial(&self.device, self.baud, self.timeout)?;
        self.serial = Some(TncSerial::new(link, self.tncport, &self.device));
        Ok(())
    }

    /// Close the device.
    pub fn disconnect(&mut self) {
        self.serial = None;
    }

    fn tnc(&mut self) -> DataPathResult<&mut TncSerial> {
        self.serial
            .as_mut()
            .ok_or_else(|| DataPathError::Io("TNC not open".to_string()))
    }

    /// Payload of frames completed by this read.
    pub fn read(&mut self) -> DataPathResult<Vec<u8>> {
        self.tnc()?
            .read()
            .map_err(|e| DataPathError::io("Failed to read from serial port", e))
    }

    /// Send one frame.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        self.tnc()?
            .write(buf)
            .map_err(|e| DataPathError::io("Failed to write to serial port", e))
    }

    /// Flush pending output.
    pub fn flush(&mut self) -> DataPathResult<()> {
        self.tnc()?
            .flush()
            .map_err(|e| DataPathError::io("Failed to flush serial port", e))
    }

    /// Whether the device is open.
    pub fn is_connected(&self) -> bool {
        self.serial.is_some()
    }

    /// TNC port frames are addressed to.
    pub fn tncport(&self) -> u8 {
        self.tncport
    }
}

impl fmt::Display for TncDataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[TNC {}@{}]", self.device, self.baud)
    }
}

/// KISS TNC path that wraps each write in an AX.25 UI frame.
pub struct TncAx25DataPath {
    tnc: TncDataPath,
    mycall: String,
    digis: Vec<String>,
    buffer: Vec<u8>,
}

impl TncAx25DataPath {
    /// Frames from `mycall` via `digis`.
    pub fn new(tnc: TncDataPath, mycall: impl Into<String>, digis: Vec<String>) -> Self {
        TncAx25DataPath {
            tnc,
            mycall: mycall.into(),
            digis,
            buffer: Vec::new(),
        }
    }

    /// Open the device.
    pub fn connect(&mut self) -> DataPathResult<()> {
        self.tnc.connect()
    }

    /// Close the device.
    pub fn disconnect(&mut self) {
        self.tnc.disconnect();
        self.buffer.clear();
    }

    /// Encode `buf` as a UI frame to `DRATS` with a trailing FCS and send it.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        let frame = Ax25Header::new(TNC_AX25_DEST, self.mycall.clone(), &self.digis)
            .build_frame(buf)
            .map_err(|e| DataPathError::Io(format!("Cannot address frame: {}", e)))?;
        self.tnc.write(&frame)
    }

    /// Accumulate frame payloads until `size` bytes are available or the
    /// TNC has nothing more, then return up to `size` bytes.
    pub fn read(&mut self, size: usize) -> DataPathResult<Vec<u8>> {
        while self.buffer.len() < size {
            let chunk = self.tnc.read()?;
            if chunk.is_empty() {
                break;
            }
            self.buffer.extend_from_slice(&chunk);
        }
        let take = size.min(self.buffer.len());
        Ok(self.buffer.drain(..take).collect())
    }

    /// Flush pending output.
    pub fn flush(&mut self) -> DataPathResult<()> {
        self.tnc.flush()
    }

    /// Whether the device is open.
    pub fn is_connected(&self) -> bool {
        self.tnc.is_connected()
    }
}

impl fmt::Display for TncAx25DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TNC-AX25 {}@{}>{}]",
            self.tnc.device,
            self.tnc.baud,
            self.digis.join(",")
        )
    }
}
