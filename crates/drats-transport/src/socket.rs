//! TCP data path with the ratflector login handshake.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{DataPathError, DataPathResult};

/// Deadline for one greeting line during login.
pub const LOGIN_LINE_TIMEOUT: Duration = Duration::from_secs(30);
/// Chunk size for `read_all_waiting` drains.
const DRAIN_CHUNK: usize = 4096;

/// Greeting: no authentication required.
pub const CODE_NO_AUTH: u32 = 100;
/// Greeting: send `USER`.
pub const CODE_SEND_USER: u32 = 101;
/// After `USER`: send `PASS`.
pub const CODE_SEND_PASS: u32 = 102;
/// Accepted.
pub const CODE_OK: u32 = 200;

/// Who the socket belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketTarget {
    /// A connection accepted by a listener. Cannot be re-dialed.
    Incoming,
    /// A dialed connection, optionally authenticated.
    Outgoing {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
        /// Login name.
        call: String,
        /// Login password; `None` skips the handshake.
        password: Option<String>,
    },
}

/// Plain TCP data path.
pub struct SocketDataPath {
    target: SocketTarget,
    stream: Option<TcpStream>,
    timeout: Duration,
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Read one LF-terminated line, giving up at `timeout`. The result is trimmed.
fn readline<S: Read>(stream: &mut S, timeout: Duration) -> String {
    let start = Instant::now();
    let mut line = Vec::new();
    let mut chunk = [0u8; 32];
    while !line.contains(&b'\n') && start.elapsed() < timeout {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => line.extend_from_slice(&chunk[..n]),
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&line).trim().to_string()
}

/// Read a `CODE text` response line.
fn getline<S: Read>(stream: &mut S, timeout: Duration) -> Option<(u32, String)> {
    let line = readline(stream, timeout);
    let (code, text) = line.split_once(' ').unwrap_or((line.as_str(), ""));
    match code.parse() {
        Ok(code) => Some((code, text.to_string())),
        Err(_) => {
            log::info!("Unable to parse response line '{}'", line);
            None
        }
    }
}

/// Run the optional `USER`/`PASS` greeting on a freshly opened stream.
///
/// A server that does not open with a numeric code is a legacy ratflector
/// and is used without authentication.
pub fn socket_login<S: Read + Write>(
    stream: &mut S,
    call: &str,
    password: &str,
    timeout: Duration,
) -> DataPathResult<()> {
    let code = match getline(stream, timeout) {
        Some((code, _)) => code,
        None => {
            log::info!("Assuming an old-school ratflector for now");
            return Ok(());
        }
    };

    match code {
        CODE_NO_AUTH => {
            log::info!("Host does not require authentication");
            return Ok(());
        }
        CODE_SEND_USER => {}
        other => {
            return Err(DataPathError::NotConnected(format!("Unknown response code {}", other)))
        }
    }

    log::info!("Doing authentication, sending username: {}", call);
    send_line(stream, &format!("USER {}", call))?;
    match getline(stream, timeout) {
        Some((CODE_OK, _)) => {
            log::info!("Host did not require a password");
            return Ok(());
        }
        Some((CODE_SEND_PASS, _)) => {}
        _ => return Err(DataPathError::NotConnected("User rejected username".to_string())),
    }

    log::info!("Sending password: {}", "*".repeat(password.len()));
    send_line(stream, &format!("PASS {}", password))?;
    match getline(stream, timeout) {
        Some((CODE_OK, text)) => {
            log::info!("Host responded: {} {}", CODE_OK, text);
            Ok(())
        }
        Some((code, text)) => Err(DataPathError::NotConnected(format!(
            "Authentication failed: {} {}",
            code, text
        ))),
        None => Err(DataPathError::NotConnected("Authentication failed".to_string())),
    }
}

fn send_line<S: Write>(stream: &mut S, line: &str) -> DataPathResult<()> {
    stream
        .write_all(format!("{}\r\n", line).as_bytes())
        .map_err(|e| DataPathError::NotConnected(format!("Login write failed: {}", e)))
}

impl SocketDataPath {
    /// Unconnected path that will dial `host:port`.
    pub fn outgoing(
        host: impl Into<String>,
        port: u16,
        call: impl Into<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Self {
        SocketDataPath {
            target: SocketTarget::Outgoing {
                host: host.into(),
                port,
                call: call.into(),
                password,
            },
            stream: None,
            timeout,
        }
    }

    /// Wrap a socket accepted by a listener.
    pub fn incoming(stream: TcpStream, timeout: Duration) -> DataPathResult<Self> {
        stream
            .set_read_timeout(read_timeout(timeout))
            .map_err(|e| DataPathError::io("Cannot configure socket", e))?;
        Ok(SocketDataPath {
            target: SocketTarget::Incoming,
            stream: Some(stream),
            timeout,
        })
    }

    /// Whether `reconnect` will re-dial.
    pub fn can_reconnect(&self) -> bool {
        matches!(self.target, SocketTarget::Outgoing { .. })
    }

    /// Dial the server and log in if a password is configured.
    pub fn connect(&mut self) -> DataPathResult<()> {
        let (host, port, call, password) = match &self.target {
            SocketTarget::Outgoing {
                host,
                port,
                call,
                password,
            } => (host, *port, call, password),
            SocketTarget::Incoming => {
                return Err(DataPathError::NotConnected("Cannot re-dial an incoming socket".to_string()))
            }
        };

        log::info!("Connecting to {}:{}", host, port);
        let mut stream = TcpStream::connect((host.as_str(), port)).map_err(|e| {
            log::debug!("Socket failed to connect: {}", e);
            DataPathError::NotConnected(format!("Unable to connect ({})", e))
        })?;
        stream
            .set_read_timeout(read_timeout(self.timeout))
            .map_err(|e| DataPathError::NotConnected(format!("Unable to connect ({})", e)))?;

        if let Some(password) = password {
            socket_login(&mut stream, call, password, LOGIN_LINE_TIMEOUT)?;
        }
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the socket.
    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    /// Re-dial after a short pause. Incoming sockets are left alone.
    pub fn reconnect(&mut self) -> DataPathResult<()> {
        if !self.can_reconnect() {
            return Ok(());
        }
        self.disconnect();
        thread::sleep(Duration::from_millis(500));
        self.connect()
    }

    fn stream(&mut self) -> DataPathResult<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| DataPathError::Io("Socket closed".to_string()))
    }

    /// Read `size` bytes, returning early with what arrived if the link goes
    /// quiet for the timeout. A peer close is an error.
    pub fn read(&mut self, size: usize) -> DataPathResult<Vec<u8>> {
        let timeout = self.timeout;
        let stream = self.stream()?;
        stream
            .set_nonblocking(false)
            .map_err(|e| DataPathError::io("Socket error", e))?;

        let mut data = vec![0u8; size];
        let mut got = 0;
        let mut end = Instant::now() + timeout;
        while got < size {
            match stream.read(&mut data[got..]) {
                Ok(0) => return Err(DataPathError::Io("Socket disconnected".to_string())),
                Ok(n) => {
                    got += n;
                    end = Instant::now() + timeout;
                }
                Err(e) if is_timeout(&e) => {
                    if Instant::now() > end {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(DataPathError::io("Socket error", e)),
            }
        }
        data.truncate(got);
        Ok(data)
    }

    /// Wait up to the timeout for data, then drain whatever is queued.
    ///
    /// A zero timeout never waits.
    pub fn read_all_waiting(&mut self) -> DataPathResult<Vec<u8>> {
        let wait = !self.timeout.is_zero();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DataPathError::Io("Socket disconnected".to_string()))?;

        if wait {
            let mut first = [0u8; 1];
            match stream.peek(&mut first) {
                Ok(0) => return Err(DataPathError::Io("Socket disconnected".to_string())),
                Ok(_) => {}
                Err(e) if is_timeout(&e) => return Ok(Vec::new()),
                Err(e) => return Err(DataPathError::io("Socket error", e)),
            }
        }

        stream
            .set_nonblocking(true)
            .map_err(|e| DataPathError::io("Socket error", e))?;
        let mut data = Vec::new();
        let mut chunk = [0u8; DRAIN_CHUNK];
        let result = loop {
            match stream.read(&mut chunk) {
                Ok(0) => break Err(DataPathError::Io("Socket disconnected".to_string())),
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(data),
                Err(e) => break Err(DataPathError::io("Socket error", e)),
            }
        };
        stream
            .set_nonblocking(false)
            .map_err(|e| DataPathError::io("Socket error", e))?;
        result
    }

    /// Send all of `buf`.
    pub fn write(&mut self, buf: &[u8]) -> DataPathResult<()> {
        self.stream()?
            .write_all(buf)
            .map_err(|e| DataPathError::io("Socket write failed", e))
    }

    /// Sockets do not buffer writes.
    pub fn flush(&mut self) -> DataPathResult<()> {
        Ok(())
    }

    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn read_timeout(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}

impl fmt::Display for SocketDataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stream.as_ref().and_then(|s| s.peer_addr().ok()) {
            Some(addr) => write!(f, "[NET {}:{}]", addr.ip(), addr.port()),
            None => write!(f, "[NET closed]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Canned server replies plus a record of what the client sent.
    struct Script {
        replies: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Script {
        fn new(replies: &str) -> Self {
            Script {
                replies: Cursor::new(replies.as_bytes().to_vec()),
                sent: Vec::new(),
            }
        }

        fn sent(&self) -> String {
            String::from_utf8_lossy(&self.sent).to_string()
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // One line per read, like a server waiting on each command.
            let pos = self.replies.position() as usize;
            let rest = &self.replies.get_ref()[pos..];
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1)
                .min(buf.len());
            buf[..end].copy_from_slice(&rest[..end]);
            self.replies.set_position((pos + end) as u64);
            Ok(end)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn login(replies: &str) -> (DataPathResult<()>, String) {
        let mut script = Script::new(replies);
        let result = socket_login(&mut script, "KK7DS", "secret", Duration::from_secs(1));
        (result, script.sent())
    }

    #[test]
    fn test_login_no_auth() {
        let (result, sent) = login("100 Welcome\n");
        assert!(result.is_ok());
        assert!(sent.is_empty());
    }

    #[test]
    fn test_login_user_and_pass() {
        let (result, sent) = login("101 Who?\n102 Password?\n200 Ok\n");
        assert!(result.is_ok());
        assert_eq!(sent, "USER KK7DS\r\nPASS secret\r\n");
    }

    #[test]
    fn test_login_user_only() {
        let (result, sent) = login("101 Who?\n200 Ok\n");
        assert!(result.is_ok());
        assert_eq!(sent, "USER KK7DS\r\n");
    }

    #[test]
    fn test_login_rejected_password() {
        let (result, _) = login("101 Who?\n102 Password?\n500 Nope\n");
        assert!(matches!(result, Err(DataPathError::NotConnected(msg)) if msg.contains("500")));
    }

    #[test]
    fn test_login_rejected_user() {
        let (result, _) = login("101 Who?\n403 Go away\n");
        assert!(matches!(result, Err(DataPathError::NotConnected(_))));
    }

    #[test]
    fn test_login_unknown_greeting_code() {
        let (result, _) = login("300 Hmm\n");
        assert!(matches!(result, Err(DataPathError::NotConnected(_))));
    }

    #[test]
    fn test_login_legacy_server() {
        let (result, sent) = login("Welcome to the ratflector\n");
        assert!(result.is_ok());
        assert!(sent.is_empty());
    }

    #[test]
    fn test_closed_display_and_io() {
        let mut path = SocketDataPath::outgoing("localhost", 9000, "KK7DS", None, Duration::from_millis(100));
        assert_eq!(path.to_string(), "[NET closed]");
        assert!(path.can_reconnect());
        assert!(matches!(path.read(1), Err(DataPathError::Io(_))));
        assert!(matches!(path.read_all_waiting(), Err(DataPathError::Io(_))));
    }
}
