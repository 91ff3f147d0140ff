//! The closed set of data path backends behind one interface.

use std::fmt;

use drats_agw::SharedAgw;
use drats_metrics::{metric_defs, metrics};

use crate::agw::AgwDataPath;
use crate::error::DataPathResult;
use crate::serial::SerialDataPath;
use crate::socket::SocketDataPath;
use crate::tnc::{TncAx25DataPath, TncDataPath};

/// Connection state reported for a data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Never opened, or closed.
    Disconnected,
    /// Open and usable.
    Connected,
}

/// One configured radio or network endpoint.
pub enum DataPath {
    /// Raw serial port.
    Serial(SerialDataPath),
    /// KISS TNC on a serial port.
    Tnc(TncDataPath),
    /// KISS TNC carrying AX.25 UI frames.
    TncAx25(TncAx25DataPath),
    /// AGW packet engine.
    Agw(AgwDataPath),
    /// TCP socket.
    Socket(SocketDataPath),
}

impl DataPath {
    /// Open the transport.
    pub fn connect(&mut self) -> DataPathResult<()> {
        log::debug!("Connecting {}", self);
        match self {
            DataPath::Serial(p) => p.connect(),
            DataPath::Tnc(p) => p.connect(),
            DataPath::TncAx25(p) => p.connect(),
            DataPath::Agw(p) => p.connect(),
            DataPath::Socket(p) => p.connect(),
        }
    }

    /// Close the transport.
    pub fn disconnect(&mut self) {
        match self {
            DataPath::Serial(p) => p.disconnect(),
            DataPath::Tnc(p) => p.disconnect(),
            DataPath::TncAx25(p) => p.disconnect(),
            DataPath::Agw(p) => p.disconnect(),
            DataPath::Socket(p) => p.disconnect(),
        }
    }

    /// Re-establish the transport after a failure.
    ///
    /// Serial and TNC ports stay as they are; AGW re-dials; sockets re-dial
    /// only when they were dialed in the first place.
    pub fn reconnect(&mut self) -> DataPathResult<()> {
        match self {
            DataPath::Serial(_) | DataPath::Tnc(_) | DataPath::TncAx25(_) => Ok(()),
            DataPath::Agw(p) => p.reconnect(),
            DataPath::Socket(p) => p.reconnect(),
        }
    }

    /// Read up to `size` bytes. Framed paths return whole frame payloads and
    /// may ignore `size`; an empty result means nothing arrived in time.
    pub fn read(&mut self, size: usize) -> DataPathResult<Vec<u8>> {
        let data = match self {
            DataPath::Serial(p) => p.read(size)?,
            DataPath::Tnc(p) => p.read()?,
            DataPath::TncAx25(p) => p.read(size)?,
            DataPath::Agw(p) => p.read()?,
            DataPath::Socket(p) => p.read(size)?,
        };
        self.count(metric_defs::DATAPATH_BYTES_READ.name, data.len());
        Ok(data)
    }

    /// Whatever is available now, waiting at most one timeout for the first
    /// byte.
    pub fn read_all_waiting(&mut self) -> DataPathResult<Vec<u8>> {
        let data = match self {
            DataPath::Serial(p) => p.read_all_waiting()?,
            DataPath::Tnc(p) => p.read()?,
            DataPath::TncAx25(p) => p.read(usize::MAX)?,
            DataPath::Agw(p) => p.read()?,
            DataPath::Socket(p) => p.read_all_waiting()?,
        };
        self.count(metric_defs::DATAPATH_BYTES_READ.name, data.len());
        Ok(data)
    }

    /// Send `buf`.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        match self {
            DataPath::Serial(p) => p.write(buf)?,
            DataPath::Tnc(p) => p.write(buf)?,
            DataPath::TncAx25(p) => p.write(buf)?,
            DataPath::Agw(p) => p.write(buf)?,
            DataPath::Socket(p) => p.write(buf)?,
        }
        self.count(metric_defs::DATAPATH_BYTES_WRITTEN.name, buf.len());
        Ok(())
    }

    /// Push out buffered output.
    pub fn flush(&mut self) -> DataPathResult<()> {
        match self {
            DataPath::Serial(p) => p.flush(),
            DataPath::Tnc(p) => p.flush(),
            DataPath::TncAx25(p) => p.flush(),
            DataPath::Agw(_) => Ok(()),
            DataPath::Socket(p) => p.flush(),
        }
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        match self {
            DataPath::Serial(p) => p.is_connected(),
            DataPath::Tnc(p) => p.is_connected(),
            DataPath::TncAx25(p) => p.is_connected(),
            DataPath::Agw(p) => p.is_connected(),
            DataPath::Socket(p) => p.is_connected(),
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        if self.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    /// False only for sockets accepted from a listener.
    pub fn can_reconnect(&self) -> bool {
        match self {
            DataPath::Socket(p) => p.can_reconnect(),
            _ => true,
        }
    }

    /// The AGW connection behind an AGW path, for AX.25 sessions.
    pub fn agw_connection(&self) -> Option<SharedAgw> {
        match self {
            DataPath::Agw(p) => p.get_agw_connection(),
            _ => None,
        }
    }

    fn count(&self, name: &'static str, bytes: usize) {
        if bytes > 0 {
            metrics::counter!(name, "port" => self.to_string()).increment(bytes as u64);
        }
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataPath::Serial(p) => p.fmt(f),
            DataPath::Tnc(p) => p.fmt(f),
            DataPath::TncAx25(p) => p.fmt(f),
            DataPath::Agw(p) => p.fmt(f),
            DataPath::Socket(p) => p.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSerial;

    #[test]
    fn test_serial_path_roundtrip() {
        let link = MockSerial::default();
        let mut path = DataPath::Serial(SerialDataPath::with_link("/dev/ttyS0", 9600, Box::new(link.clone())));
        assert_eq!(path.state(), LinkState::Connected);

        path.write(b"ping").unwrap();
        assert_eq!(link.written(), b"ping");

        link.push_input(b"pong");
        assert_eq!(path.read(4).unwrap(), b"pong");
        assert!(path.reconnect().is_ok());

        path.disconnect();
        assert_eq!(path.state(), LinkState::Disconnected);
        assert!(path.write(b"x").is_err());
    }

    #[test]
    fn test_tnc_read_all_waiting() {
        let link = MockSerial::default();
        let tnc = TncDataPath::with_link("/dev/ttyUSB0", 9600, Box::new(link.clone())).unwrap();
        let mut path = DataPath::TncAx25(TncAx25DataPath::new(tnc, "KK7DS", Vec::new()));
        link.push_input(&drats_frame::kiss_encode_frame(b"frame", 0));
        assert_eq!(path.read_all_waiting().unwrap(), b"frame");
        assert!(path.agw_connection().is_none());
    }
}
