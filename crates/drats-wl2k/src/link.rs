//! Links to a Winlink server and the line conversation over them.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use drats_agw::{AgwAx25Connection, SharedAgw};
use rand::Rng;

use crate::error::{Wl2kError, Wl2kResult};

/// Default Winlink CMS host.
pub const DEFAULT_SERVER: &str = "server.winlink.org";

/// Default Winlink CMS telnet port.
pub const DEFAULT_PORT: u16 = 8772;

/// Password sent at the telnet `Password :` prompt.
pub const CMS_TELNET_PASSWORD: &str = "CMSTELNET";

/// Default wait for any single server response.
pub const CONVERSATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Our software identification banner.
pub fn banner() -> String {
    format!("[DRATS-{}-B2FHIM$]", env!("CARGO_PKG_VERSION"))
}

/// A byte stream a conversation can run over.
pub trait LinkStream: Read + Write + Send {
    /// Tear the link down.
    fn close(&mut self) -> Wl2kResult<()>;
}

impl LinkStream for TcpStream {
    fn close(&mut self) -> Wl2kResult<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl<S: Read + Write + Send> LinkStream for AgwAx25Connection<S> {
    fn close(&mut self) -> Wl2kResult<()> {
        Ok(self.disconnect()?)
    }
}

/// CR-terminated line exchange plus raw block reads over a link.
///
/// Reads are buffered, so block data that arrives together with the last
/// line of a listing is not lost.
pub struct Conversation {
    stream: Box<dyn LinkStream>,
    buffer: BytesMut,
    timeout: Duration,
}

impl Conversation {
    pub fn new(stream: Box<dyn LinkStream>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(1024),
            timeout: CONVERSATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one line, adding the CR terminator.
    pub fn send_line(&mut self, line: &str) -> Wl2kResult<()> {
        log::info!(" -> {}", line);
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\r")?;
        self.stream.flush()?;
        Ok(())
    }

    /// Send raw bytes.
    pub fn send_raw(&mut self, data: &[u8]) -> Wl2kResult<()> {
        log::trace!(" -> {}", hex::encode(&data[..data.len().min(32)]));
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Next line from the server, without its CR. Comment lines
    /// (starting with `;`) are skipped.
    pub fn recv_line(&mut self) -> Wl2kResult<String> {
        loop {
            let line = self.recv_raw_line()?;
            if !line.starts_with(';') {
                return Ok(line);
            }
        }
    }

    /// Next line from the server, including comment lines.
    pub fn recv_raw_line(&mut self) -> Wl2kResult<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\r') {
                let raw = self.buffer.split_to(pos + 1);
                let line = String::from_utf8_lossy(&raw[..pos])
                    .trim_start_matches('\n')
                    .to_string();
                log::info!(" <- {}", escaped(&line));
                return Ok(line);
            }
            self.fill(deadline)?;
        }
    }

    /// Exactly `len` raw bytes.
    pub fn recv_exact(&mut self, len: usize) -> Wl2kResult<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        while self.buffer.len() < len {
            self.fill(deadline)?;
        }
        Ok(self.buffer.split_to(len).to_vec())
    }

    /// One raw byte.
    pub fn recv_byte(&mut self) -> Wl2kResult<u8> {
        let deadline = Instant::now() + self.timeout;
        while self.buffer.is_empty() {
            self.fill(deadline)?;
        }
        Ok(self.buffer.get_u8())
    }

    /// Whatever is buffered or arrives next, for error reporting.
    pub fn recv_available(&mut self) -> String {
        if self.buffer.is_empty() {
            let _ = self.fill(Instant::now() + self.timeout);
        }
        let raw = self.buffer.split();
        String::from_utf8_lossy(&raw).trim().to_string()
    }

    fn fill(&mut self, deadline: Instant) -> Wl2kResult<()> {
        let mut chunk = [0u8; 1024];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(Wl2kError::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) =>
                {
                    if Instant::now() >= deadline {
                        return Err(Wl2kError::Timeout);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Check a `[name-version-caps]` banner from the server.
    pub fn expect_banner(&mut self) -> Wl2kResult<String> {
        let line = self.recv_line()?;
        check_banner(&line)?;
        Ok(line)
    }

    /// Wait for a line ending in the `>` prompt.
    pub fn expect_prompt(&mut self) -> Wl2kResult<()> {
        let line = self.recv_line()?;
        if line.trim().ends_with('>') {
            Ok(())
        } else {
            Err(Wl2kError::Conversation(format!("never got prompt, got `{}'", escaped(&line))))
        }
    }

    /// Close the underlying link.
    pub fn close(mut self) -> Wl2kResult<()> {
        self.stream.close()
    }
}

fn escaped(s: &str) -> String {
    s.replace('\n', "\\n").replace('\r', "\\r")
}

/// Validate a server identification banner.
pub fn check_banner(line: &str) -> Wl2kResult<()> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Wl2kError::Conversation(format!("unparsable SSID `{}'", trimmed)))?;
    if inner.split('-').count() != 3 {
        return Err(Wl2kError::Conversation(format!("unparsable SSID `{}'", trimmed)));
    }
    Ok(())
}

/// How we reach a Winlink server.
///
/// `connect` opens the transport, `login` runs the per-transport
/// handshake up to the point where the server is ready for `FF`/`FC`.
pub trait Wl2kLink: Send {
    fn connect(&mut self) -> Wl2kResult<Conversation>;
    fn login(&mut self, conv: &mut Conversation) -> Wl2kResult<()>;
}

impl<L: Wl2kLink + ?Sized> Wl2kLink for Box<L> {
    fn connect(&mut self) -> Wl2kResult<Conversation> {
        (**self).connect()
    }

    fn login(&mut self, conv: &mut Conversation) -> Wl2kResult<()> {
        (**self).login(conv)
    }
}

/// Direct TCP connection to a Common Message Server.
#[derive(Debug, Clone)]
pub struct TelnetLink {
    callsign: String,
    server: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl TelnetLink {
    pub fn new(callsign: &str, server: &str, port: u16, password: &str) -> Self {
        Self {
            callsign: callsign.to_string(),
            server: server.to_string(),
            port,
            password: password.to_string(),
            timeout: CONVERSATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Wl2kLink for TelnetLink {
    fn connect(&mut self) -> Wl2kResult<Conversation> {
        let addr = (self.server.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", self.server))
            })?;
        log::info!("Connecting to {}:{} ({})", self.server, self.port, addr);
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(Duration::from_millis(500)))?;
        Ok(Conversation::new(Box::new(stream)).with_timeout(self.timeout))
    }

    fn login(&mut self, conv: &mut Conversation) -> Wl2kResult<()> {
        conv.recv_line()?;
        let resp = conv.recv_line()?;
        if !resp.starts_with("Callsign :") {
            return Err(Wl2kError::Conversation(format!("never saw login, got `{}'", resp)));
        }
        conv.send_line(&self.callsign)?;

        let resp = conv.recv_line()?;
        if !resp.starts_with("Password :") {
            return Err(Wl2kError::Conversation(format!("never saw password, got `{}'", resp)));
        }
        conv.send_line(CMS_TELNET_PASSWORD)?;

        conv.expect_banner()?;
        conv.expect_prompt()?;

        if !self.password.is_empty() {
            conv.send_line("FF")?;
            let resp = conv.recv_line()?;
            let challenge = parse_challenge(resp.trim())?;
            conv.expect_prompt()?;

            let answer = challenge_response(&self.password, &challenge, &mut rand::thread_rng())?;
            conv.send_line(&answer)?;
            let resp = conv.recv_line()?;
            if !resp.starts_with("Hello ") {
                return Err(Wl2kError::Conversation(format!("never saw hello, got `{}'", resp)));
            }
            conv.expect_prompt()?;
        }

        conv.send_line(&banner())
    }
}

/// Digits out of a `Login [123]` challenge line.
pub fn parse_challenge(line: &str) -> Wl2kResult<String> {
    let digits: String = line
        .strip_prefix("Login [")
        .ok_or_else(|| Wl2kError::Conversation(format!("never saw challenge, got `{}'", line)))?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(Wl2kError::Conversation(format!("empty challenge in `{}'", line)));
    }
    Ok(digits)
}

/// Answer a CMS login challenge.
///
/// The answer is six characters. Three are picked from `_<password>` by
/// the first three challenge digits, last digit first. The rest are
/// random printable filler mixed in ahead of them.
pub fn challenge_response<R: Rng + ?Sized>(password: &str, challenge: &str, rng: &mut R) -> Wl2kResult<String> {
    let secret: Vec<char> = std::iter::once('_').chain(password.chars()).collect();
    let digits: Vec<usize> = challenge
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    if digits.len() < 3 {
        return Err(Wl2kError::Conversation(format!("short challenge `{}'", challenge)));
    }

    let mut answer = String::with_capacity(6);
    let mut todo = 3;
    for remaining in (1..=6).rev() {
        let octet: u8 = rng.gen();
        if octet > 127 && remaining > todo {
            answer.push(char::from(rng.gen_range(33u8..=126)));
        } else {
            todo -= 1;
            let c = secret.get(digits[todo]).ok_or_else(|| {
                Wl2kError::Conversation(format!("challenge `{}' exceeds password length", challenge))
            })?;
            answer.push(*c);
        }
    }
    Ok(answer)
}

/// AX.25 connection to an RMS gateway through an AGW server.
pub struct RmsLink<S: Read + Write + Send + 'static = TcpStream> {
    callsign: String,
    remote: String,
    agw: SharedAgw<S>,
    timeout: Duration,
}

impl<S: Read + Write + Send + 'static> RmsLink<S> {
    pub fn new(callsign: &str, remote: &str, agw: SharedAgw<S>) -> Self {
        Self {
            callsign: callsign.to_string(),
            remote: remote.to_string(),
            agw,
            timeout: CONVERSATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<S: Read + Write + Send + 'static> Wl2kLink for RmsLink<S> {
    fn connect(&mut self) -> Wl2kResult<Conversation> {
        let mut conn = AgwAx25Connection::new(self.agw.clone(), &self.callsign)?;
        conn.connect(&self.remote)?;
        Ok(Conversation::new(Box::new(conn)).with_timeout(self.timeout))
    }

    fn login(&mut self, conv: &mut Conversation) -> Wl2kResult<()> {
        conv.expect_banner()?;
        conv.send_line(&banner())?;
        conv.expect_prompt()
    }
}

/// Which transport a gateway session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wl2kMode {
    /// Telnet to a Common Message Server.
    #[default]
    Network,
    /// AX.25 to an RMS gateway through AGW.
    Rms,
}

/// Settings for reaching Winlink.
#[derive(Debug, Clone)]
pub struct Wl2kConfig {
    pub mode: Wl2kMode,
    /// Account callsign (with SSID if any).
    pub callsign: String,
    pub server: String,
    pub port: u16,
    /// Secure login password; empty to skip the challenge.
    pub password: String,
    /// RMS gateway to connect to in [`Wl2kMode::Rms`].
    pub rms_call: String,
    pub timeout: Duration,
}

impl Default for Wl2kConfig {
    fn default() -> Self {
        Self {
            mode: Wl2kMode::Network,
            callsign: String::new(),
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            rms_call: String::new(),
            timeout: CONVERSATION_TIMEOUT,
        }
    }
}

impl Wl2kConfig {
    pub fn telnet_link(&self) -> TelnetLink {
        TelnetLink::new(&self.callsign, &self.server, self.port, &self.password).with_timeout(self.timeout)
    }

    pub fn rms_link<S: Read + Write + Send + 'static>(&self, agw: SharedAgw<S>) -> RmsLink<S> {
        RmsLink::new(&self.callsign, &self.rms_call, agw).with_timeout(self.timeout)
    }

    /// The link for the configured mode. RMS mode needs an AGW connection.
    pub fn link(&self, agw: Option<SharedAgw>) -> Wl2kResult<Box<dyn Wl2kLink>> {
        match (self.mode, agw) {
            (Wl2kMode::Network, _) => Ok(Box::new(self.telnet_link())),
            (Wl2kMode::Rms, Some(agw)) => Ok(Box::new(self.rms_link(agw))),
            (Wl2kMode::Rms, None) => Err(Wl2kError::Conversation(format!(
                "no AGW connection for RMS gateway {}",
                self.rms_call
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{Cursor, Read, Write};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Scripted server: reads come from `input`, writes are captured.
    pub struct ScriptStream {
        input: Cursor<Vec<u8>>,
        pub output: Arc<Mutex<Vec<u8>>>,
    }

    impl ScriptStream {
        pub fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Arc::default(),
            }
        }
    }

    impl Read for ScriptStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LinkStream for ScriptStream {
        fn close(&mut self) -> Wl2kResult<()> {
            Ok(())
        }
    }

    pub fn conversation(input: &[u8]) -> (Conversation, Arc<Mutex<Vec<u8>>>) {
        let stream = ScriptStream::new(input.to_vec());
        let output = stream.output.clone();
        (Conversation::new(Box::new(stream)), output)
    }
}
