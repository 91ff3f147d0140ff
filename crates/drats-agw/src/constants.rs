//! AGW protocol constants.

/// Size of the fixed frame header.
pub const AGW_HEADER_SIZE: usize = 36;
/// Offset of the kind byte within the header.
pub const AGW_HEADER_KIND: usize = 4;
/// Offset of the PID byte within the header.
pub const AGW_HEADER_PID: usize = 6;
/// Offset of the `call_from` field.
pub const AGW_HEADER_FROM: usize = 8;
/// Offset of the `call_to` field.
pub const AGW_HEADER_TO: usize = 18;
/// Offset of the little-endian payload length.
pub const AGW_HEADER_LEN: usize = 28;
/// Width of each callsign field.
pub const AGW_CALL_LEN: usize = 10;

// Frame kinds

/// Connect request / connected notification.
pub const KIND_CONNECT: u8 = b'C';
/// Connected-mode data.
pub const KIND_DATA: u8 = b'D';
/// Disconnect request / notification.
pub const KIND_DISCONNECT: u8 = b'd';
/// Radio port information.
pub const KIND_PORT_INFO: u8 = b'G';
/// Radio port capabilities.
pub const KIND_PORT_CAPS: u8 = b'g';
/// Heard stations list.
pub const KIND_HEARD: u8 = b'H';
/// Raw AX.25 frame in either direction.
pub const KIND_RAW: u8 = b'K';
/// Toggle raw frame monitoring.
pub const KIND_ENABLE_RAW: u8 = b'k';
/// Server version.
pub const KIND_VERSION: u8 = b'R';
/// Monitored supervisory frame.
pub const KIND_SUPERVISORY: u8 = b'S';
/// Monitored frame we transmitted.
pub const KIND_TRANSMITTED: u8 = b'T';
/// Monitored unproto frame.
pub const KIND_UNPROTO: u8 = b'U';
/// Register a callsign.
pub const KIND_REGISTER: u8 = b'X';
/// Unregister a callsign.
pub const KIND_UNREGISTER: u8 = b'x';
/// Outstanding frames for a station.
pub const KIND_OUTSTANDING_STATION: u8 = b'Y';
/// Outstanding frames for a port.
pub const KIND_OUTSTANDING_PORT: u8 = b'y';

/// Every kind this client knows about.
pub const ALL_KINDS: &[u8] = &[
    KIND_CONNECT,
    KIND_DATA,
    KIND_DISCONNECT,
    KIND_PORT_INFO,
    KIND_PORT_CAPS,
    KIND_HEARD,
    KIND_RAW,
    KIND_ENABLE_RAW,
    KIND_VERSION,
    KIND_SUPERVISORY,
    KIND_TRANSMITTED,
    KIND_UNPROTO,
    KIND_REGISTER,
    KIND_UNREGISTER,
    KIND_OUTSTANDING_STATION,
    KIND_OUTSTANDING_PORT,
];

/// Human readable name of a frame kind.
pub fn kind_name(kind: u8) -> &'static str {
    match kind {
        KIND_CONNECT => "connect",
        KIND_DATA => "data",
        KIND_DISCONNECT => "disconnect",
        KIND_PORT_INFO => "port-info",
        KIND_PORT_CAPS => "port-caps",
        KIND_HEARD => "heard",
        KIND_RAW => "raw",
        KIND_ENABLE_RAW => "enable-raw",
        KIND_VERSION => "version",
        KIND_SUPERVISORY => "supervisory",
        KIND_TRANSMITTED => "transmitted",
        KIND_UNPROTO => "unproto",
        KIND_REGISTER => "register",
        KIND_UNREGISTER => "unregister",
        KIND_OUTSTANDING_STATION => "outstanding-station",
        KIND_OUTSTANDING_PORT => "outstanding-port",
        _ => "unknown",
    }
}
