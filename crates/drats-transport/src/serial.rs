//! Serial ports and software (XON/XOFF) flow control.

use std::fmt;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use drats_metrics::{metric_defs, metrics};

use crate::error::{DataPathError, DataPathResult};

/// Resume transmission.
pub const ASCII_XON: u8 = 17;
/// Pause transmission.
pub const ASCII_XOFF: u8 = 19;
/// Bytes written between flow-control checks.
pub const SWF_CHUNK: usize = 8;
/// Default time to wait for XON before assuming it.
pub const DEFAULT_XOFF_LIMIT: Duration = Duration::from_secs(15);

const SWF_POLL: Duration = Duration::from_millis(10);

/// A byte-oriented serial device.
///
/// Implemented for real ports opened through `serialport`; tests substitute
/// scripted links.
pub trait SerialLink: Read + Write + Send {
    /// Bytes waiting in the receive buffer.
    fn bytes_to_read(&self) -> io::Result<usize>;
    /// Current read timeout.
    fn timeout(&self) -> Duration;
    /// Change the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl SerialLink for Box<dyn serialport::SerialPort> {
    fn bytes_to_read(&self) -> io::Result<usize> {
        Ok(serialport::SerialPort::bytes_to_read(&**self)? as usize)
    }

    fn timeout(&self) -> Duration {
        serialport::SerialPort::timeout(&**self)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        Ok(serialport::SerialPort::set_timeout(&mut **self, timeout)?)
    }
}

/// Open `device` at `baud` with hardware flow control disabled.
pub fn open_serial(device: &str, baud: u32, timeout: Duration) -> DataPathResult<Box<dyn SerialLink>> {
    let port = serialport::new(device, baud)
        .timeout(timeout)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|e| {
            log::info!("Unable to open serial port {}: {}", device, e);
            DataPathError::NotConnected(format!("Unable to open serial port {}", device))
        })?;
    Ok(Box::new(port))
}

/// Read until `size` bytes arrive or a read times out.
pub(crate) fn read_up_to(link: &mut dyn SerialLink, size: usize) -> io::Result<Vec<u8>> {
    let mut out = vec![0u8; size];
    let mut got = 0;
    while got < size {
        match link.read(&mut out[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    out.truncate(got);
    Ok(out)
}

/// Serial port with in-band XON/XOFF flow control on writes.
pub struct SwfSerial {
    device: String,
    baud: u32,
    link: Box<dyn SerialLink>,
    xon: bool,
    xoff_limit: Duration,
}

impl SwfSerial {
    /// Open `device`.
    pub fn open(device: &str, baud: u32, timeout: Duration) -> DataPathResult<Self> {
        let link = open_serial(device, baud, timeout)?;
        log::info!("Software XON/XOFF control initialized on {}", device);
        Ok(Self::from_link(device, baud, link))
    }

    /// Use an already-open link.
    pub fn from_link(device: &str, baud: u32, link: Box<dyn SerialLink>) -> Self {
        SwfSerial {
            device: device.to_string(),
            baud,
            link,
            xon: true,
            xoff_limit: DEFAULT_XOFF_LIMIT,
        }
    }

    /// How long to stay paused before assuming XON.
    pub fn with_xoff_limit(mut self, limit: Duration) -> Self {
        self.xoff_limit = limit;
        self
    }

    /// Close and reopen the device.
    pub fn reconnect(&mut self) -> DataPathResult<()> {
        let timeout = self.link.timeout();
        thread::sleep(Duration::from_millis(500));
        self.link = open_serial(&self.device, self.baud, timeout)?;
        self.xon = true;
        Ok(())
    }

    /// Whether the peer currently allows transmission.
    ///
    /// Consumes one waiting byte, if any. A byte that is neither XON nor XOFF
    /// resumes transmission (IXANY).
    pub fn is_xon(&mut self) -> io::Result<bool> {
        thread::sleep(SWF_POLL);
        if self.link.bytes_to_read()? == 0 {
            return Ok(self.xon);
        }
        let mut byte = [0u8; 1];
        if self.link.read(&mut byte)? == 1 {
            match byte[0] {
                ASCII_XOFF => self.xon = false,
                ASCII_XON => self.xon = true,
                other => {
                    log::info!("Read a non-XOFF char: 0x{:02x}, assuming IXANY behavior", other);
                    self.xon = true;
                }
            }
        }
        Ok(self.xon)
    }

    fn write_chunks(&mut self, data: &[u8]) -> io::Result<()> {
        for chunk in data.chunks(SWF_CHUNK) {
            self.link.write_all(chunk)?;
            self.link.flush()?;

            let start = Instant::now();
            let mut stalled = false;
            while !self.is_xon()? {
                if !stalled {
                    metrics::counter!(metric_defs::SERIAL_XOFF_STALLS.name).increment(1);
                    stalled = true;
                }
                thread::sleep(SWF_POLL);
                if start.elapsed() > self.xoff_limit {
                    log::warn!("XOFF for too long on {}, assuming XON", self.device);
                    metrics::counter!(metric_defs::SERIAL_XOFF_TIMEOUTS.name).increment(1);
                    self.xon = true;
                }
            }
        }
        Ok(())
    }

    /// Write `data` in small chunks, pausing while the peer signals XOFF.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let old = self.link.timeout();
        self.link.set_timeout(SWF_POLL)?;
        let result = self.write_chunks(data);
        self.link.set_timeout(old)?;
        result
    }

    /// Read up to `size` bytes within the port timeout.
    pub fn read(&mut self, size: usize) -> io::Result<Vec<u8>> {
        read_up_to(self.link.as_mut(), size)
    }

    /// Bytes waiting in the receive buffer.
    pub fn in_waiting(&self) -> io::Result<usize> {
        self.link.bytes_to_read()
    }

    /// Flush pending output.
    pub fn flush(&mut self) -> io::Result<()> {
        self.link.flush()
    }
}

/// A raw serial data path.
pub struct SerialDataPath {
    device: String,
    baud: u32,
    timeout: Duration,
    serial: Option<SwfSerial>,
}

impl SerialDataPath {
    /// Unopened path for `device` at `baud`.
    pub fn new(device: impl Into<String>, baud: u32, timeout: Duration) -> Self {
        SerialDataPath {
            device: device.into(),
            baud,
            timeout,
            serial: None,
        }
    }

    /// Path over an already-open link.
    pub fn with_link(device: impl Into<String>, baud: u32, link: Box<dyn SerialLink>) -> Self {
        let device = device.into();
        let timeout = link.timeout();
        SerialDataPath {
            serial: Some(SwfSerial::from_link(&device, baud, link)),
            device,
            baud,
            timeout,
        }
    }

    /// Open the device.
    pub fn connect(&mut self) -> DataPathResult<()> {
        self.serial = Some(SwfSerial::open(&self.device, self.baud, self.timeout)?);
        Ok(())
    }

    /// Close the device.
    pub fn disconnect(&mut self) {
        self.serial = None;
    }

    fn port(&mut self) -> DataPathResult<&mut SwfSerial> {
        self.serial
            .as_mut()
            .ok_or_else(|| DataPathError::Io("Serial port not open".to_string()))
    }

    /// Read up to `size` bytes.
    pub fn read(&mut self, size: usize) -> DataPathResult<Vec<u8>> {
        self.port()?
            .read(size)
            .map_err(|e| DataPathError::io("Failed to read from serial port", e))
    }

    /// One byte (waiting up to the timeout), then everything else buffered.
    pub fn read_all_waiting(&mut self) -> DataPathResult<Vec<u8>> {
        let mut data = self.read(1)?;
        let waiting = self
            .port()?
            .in_waiting()
            .map_err(|e| DataPathError::io("Failed to read from serial port", e))?;
        if waiting > 0 {
            data.extend(self.read(waiting)?);
        }
        Ok(data)
    }

    /// Write with software flow control.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        self.port()?
            .write(buf)
            .map_err(|e| DataPathError::io("Failed to write to serial port", e))
    }

    /// Flush pending output.
    pub fn flush(&mut self) -> DataPathResult<()> {
        self.port()?
            .flush()
            .map_err(|e| DataPathError::io("Failed to flush serial port", e))
    }

    /// Whether the device is open.
    pub fn is_connected(&self) -> bool {
        self.serial.is_some()
    }
}

impl fmt::Display for SerialDataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SERIAL {}@{}]", self.device, self.baud)
    }
}
