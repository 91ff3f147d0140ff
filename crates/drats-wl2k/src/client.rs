//! B2F exchange with a Winlink server.

use std::sync::Arc;

use crate::compress::Compressor;
use crate::error::{Wl2kError, Wl2kResult};
use crate::link::{Conversation, Wl2kLink};
use crate::message::{proposal_checksum_line, WinLinkMessage};

/// Fetches and sends messages over a [`Wl2kLink`].
///
/// Each call is one complete session: connect, log in, exchange,
/// disconnect. Any unexpected reply aborts the session.
pub struct Wl2kClient<L: Wl2kLink> {
    link: L,
    compressor: Arc<dyn Compressor>,
    messages: Vec<WinLinkMessage>,
}

impl<L: Wl2kLink> Wl2kClient<L> {
    pub fn new(link: L, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            link,
            compressor,
            messages: Vec::new(),
        }
    }

    /// Download everything the server has for us. Returns the count.
    pub fn get_messages(&mut self) -> Wl2kResult<usize> {
        let mut conv = self.link.connect()?;
        let result = self.fetch(&mut conv);
        let closed = conv.close();
        result?;
        closed?;
        Ok(self.messages.len())
    }

    fn fetch(&mut self, conv: &mut Conversation) -> Wl2kResult<()> {
        self.link.login(conv)?;
        self.messages = list_proposals(conv)?;
        if self.messages.is_empty() {
            return Ok(());
        }

        conv.send_line(&format!("FS {}", "Y".repeat(self.messages.len())))?;
        for msg in &mut self.messages {
            log::info!("Getting message {}", msg.id());
            msg.read_from(conv, self.compressor.as_ref())?;
        }
        conv.send_line("FQ")
    }

    /// Messages from the last successful `get_messages`.
    pub fn messages(&self) -> &[WinLinkMessage] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<WinLinkMessage> {
        std::mem::take(&mut self.messages)
    }

    /// Upload messages. Exactly one message per call is supported.
    pub fn send_messages(&mut self, messages: &[WinLinkMessage]) -> Wl2kResult<()> {
        if messages.len() != 1 {
            return Err(Wl2kError::BatchNotImplemented(messages.len()));
        }

        let mut conv = self.link.connect()?;
        let result = self.upload(&mut conv, messages);
        let closed = conv.close();
        result?;
        closed
    }

    fn upload(&mut self, conv: &mut Conversation, messages: &[WinLinkMessage]) -> Wl2kResult<()> {
        self.link.login(conv)?;

        let proposals: Vec<String> = messages.iter().map(WinLinkMessage::proposal).collect();
        for proposal in &proposals {
            conv.send_line(proposal)?;
        }
        conv.send_line(&proposal_checksum_line(proposals.iter().map(String::as_str)))?;

        let resp = conv.recv_line()?;
        let accepts = match resp.split_whitespace().collect::<Vec<_>>()[..] {
            ["FS", accepts] => accepts.to_string(),
            _ => return Err(Wl2kError::Conversation(format!("error talking to server: {}", resp))),
        };
        let accepted = accepts.chars().filter(|c| matches!(c, 'Y' | 'y' | '+')).count();
        if accepts.len() != messages.len() || accepted != messages.len() {
            return Err(Wl2kError::Conversation(format!("server refused some messages: {}", resp)));
        }

        for msg in messages {
            msg.write_to(conv)?;
        }
        let resp = conv.recv_line()?;
        log::info!("Server after upload: {}", resp);
        Ok(())
    }
}

/// Ask for the proposal list and read it up to its terminator.
fn list_proposals(conv: &mut Conversation) -> Wl2kResult<Vec<WinLinkMessage>> {
    conv.send_line("FF")?;
    let mut msgs = Vec::new();
    loop {
        let line = conv.recv_line()?;
        if line.starts_with("FC") {
            log::info!("Creating message for {}", line);
            msgs.push(WinLinkMessage::from_proposal(&line)?);
        } else if line.starts_with("F>") || line.starts_with("FQ") {
            return Ok(msgs);
        } else if !line.trim().is_empty() {
            return Err(Wl2kError::Conversation(format!("{} while listing", line)));
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::link::testing::ScriptStream;

    /// A link straight into a scripted stream, with no login exchange.
    struct Scripted {
        input: Option<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
    }

    impl Scripted {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Some(input.to_vec()),
                output: Arc::default(),
            }
        }

        fn sent(&self) -> String {
            String::from_utf8_lossy(&self.output.lock()).into_owned()
        }
    }

    impl Wl2kLink for Scripted {
        fn connect(&mut self) -> Wl2kResult<Conversation> {
            let mut stream = ScriptStream::new(self.input.take().unwrap_or_default());
            stream.output = self.output.clone();
            Ok(Conversation::new(Box::new(stream)))
        }

        fn login(&mut self, _conv: &mut Conversation) -> Wl2kResult<()> {
            Ok(())
        }
    }

    struct Identity;

    impl Compressor for Identity {
        fn compress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
            Ok(data.to_vec())
        }

        fn decompress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
            Ok(data.to_vec())
        }
    }

    fn client(input: &[u8]) -> Wl2kClient<Scripted> {
        Wl2kClient::new(Scripted::new(input), Arc::new(Identity))
    }

    #[test]
    fn test_no_messages() {
        let mut c = client(b"FQ\r");
        assert_eq!(c.get_messages().unwrap(), 0);
        assert_eq!(c.link.sent(), "FF\r");
    }

    #[test]
    fn test_listing_error() {
        let mut c = client(b"*** Unknown command\r");
        assert!(matches!(c.get_messages(), Err(Wl2kError::Conversation(_))));
    }

    #[test]
    fn test_send_one() {
        let mut c = client(b"FS Y\rFF\r");
        let msg = WinLinkMessage::from_content("MID1", b"body".to_vec(), "Subj", &Identity).unwrap();
        c.send_messages(std::slice::from_ref(&msg)).unwrap();

        let sent = c.link.output.lock().clone();
        let text = String::from_utf8_lossy(&sent);
        let expected_head = format!("FC EM MID1 4 4 0\r{}\r", proposal_checksum_line(["FC EM MID1 4 4 0"]));
        assert!(text.starts_with(&expected_head), "{}", text);
        assert!(sent.ends_with(&crate::block::encode_blocks("Subj", b"body")));
    }

    #[test]
    fn test_send_refused() {
        let mut c = client(b"FS N\r");
        let msg = WinLinkMessage::from_content("MID1", b"body".to_vec(), "Subj", &Identity).unwrap();
        assert!(matches!(
            c.send_messages(std::slice::from_ref(&msg)),
            Err(Wl2kError::Conversation(_))
        ));

        let mut c = client(b"FS\r");
        assert!(matches!(
            c.send_messages(std::slice::from_ref(&msg)),
            Err(Wl2kError::Conversation(_))
        ));

        let mut c = client(b"FS YY\r");
        assert!(matches!(
            c.send_messages(std::slice::from_ref(&msg)),
            Err(Wl2kError::Conversation(_))
        ));
    }

    #[test]
    fn test_batch_send_not_implemented() {
        let mut c = client(b"");
        let msg = WinLinkMessage::from_content("MID1", b"body".to_vec(), "Subj", &Identity).unwrap();
        assert!(matches!(
            c.send_messages(&[msg.clone(), msg]),
            Err(Wl2kError::BatchNotImplemented(2))
        ));
        assert!(matches!(c.send_messages(&[]), Err(Wl2kError::BatchNotImplemented(0))));
        assert!(c.link.sent().is_empty());
    }
}
