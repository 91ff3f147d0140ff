//! Winlink message text.
//!
//! A Winlink message is a block of `Key: value` CRLF headers, a blank
//! line, a body whose length is given by the `Body` header, and then one
//! attachment per `File` header.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use drats_store::{Attachment, Folder, Message, MessageKind, MessageStore};

use crate::error::{Wl2kError, Wl2kResult};

/// Prefix marking a sender that came in over Winlink.
pub const WL2K_SENDER_PREFIX: &str = "WL2K:";

/// Path element stamped on messages delivered from Winlink.
pub const WL2K_PATH_TAG: &str = "@WL2K";

/// Message id: `D%H%M%S` plus the sender, cut to 12 characters.
pub fn mail_id(src: &str, now: DateTime<Utc>) -> String {
    format!("{}{}", now.format("D%H%M%S"), src).chars().take(12).collect()
}

/// Build the wire text of an outgoing message.
pub fn encode_mail(
    src: &str,
    dst: &[&str],
    subject: &str,
    body: &str,
    attachments: &[Attachment],
    now: DateTime<Utc>,
) -> Vec<u8> {
    let mut head = format!("Mid: {}\r\nSubject: {}\r\nFrom: {}\r\n", mail_id(src, now), subject, src);
    for to in dst {
        head.push_str(&format!("To: {}\r\n", to));
    }
    head.push_str(&format!("Body: {}\r\n", body.len()));
    head.push_str(&format!("Date: {}\r\n", now.format("%Y/%m/%d %H:%M")));
    for att in attachments {
        head.push_str(&format!("File: {} {}\r\n", att.data.len(), att.name));
    }
    head.push_str("\r\n");
    head.push_str(body);
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    for att in attachments {
        out.extend_from_slice(&att.data);
        out.extend_from_slice(b"\r\n");
    }
    if !attachments.is_empty() {
        out.extend_from_slice(b"\r\n\x00");
    }
    out
}

/// A received message split into headers, body and attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMail {
    headers: Vec<(String, String)>,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl ParsedMail {
    pub fn parse(content: &[u8]) -> Wl2kResult<Self> {
        let split = find(content, b"\r\n\r\n")
            .ok_or_else(|| Wl2kError::Mail("no blank line after headers".into()))?;
        let headers: Vec<(String, String)> = String::from_utf8_lossy(&content[..split])
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let body_field = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Body"))
            .map(|(_, v)| v.as_str())
            .unwrap_or("0");
        let body_len: usize = body_field
            .parse()
            .map_err(|_| Wl2kError::Mail(format!("error parsing Body header length `{}'", body_field)))?;

        let body_start = split + 4;
        let body_end = (body_start + body_len).min(content.len());
        let body = String::from_utf8_lossy(&content[body_start..body_end]).into_owned();
        let mut rest = &content[body_end..];

        let mut attachments = Vec::new();
        for (key, value) in &headers {
            if !key.eq_ignore_ascii_case("File") {
                continue;
            }
            let (len, name) = value
                .split_once(' ')
                .ok_or_else(|| Wl2kError::Mail(format!("bad File header `{}'", value)))?;
            let len: usize = len
                .parse()
                .map_err(|_| Wl2kError::Mail(format!("bad File length `{}'", len)))?;
            // Each attachment is preceded by the CRLF that ended the part before it.
            let start = 2.min(rest.len());
            let end = (len + 2).min(rest.len());
            log::info!("File {} {} ({})", name, end - start, len);
            attachments.push(Attachment {
                name: name.to_string(),
                data: rest[start..end].to_vec(),
            });
            rest = &rest[end..];
        }

        Ok(Self {
            headers,
            body,
            attachments,
        })
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header.
    pub fn headers_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or("Unknown")
    }

    /// `WL2K:`-prefixed sender, with any `SMTP:`-style method dropped.
    pub fn sender(&self) -> String {
        let from = self.header("From").unwrap_or("Unknown");
        let from = from.split_once(':').map_or(from, |(_, addr)| addr);
        format!("{}{}", WL2K_SENDER_PREFIX, from.trim())
    }
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

/// Store a downloaded message as `<mid>.json`.
///
/// Mail for `recipient == mycall` lands in the Inbox; anything else goes
/// to the Outbox to be forwarded on.
pub fn deliver_to_store(
    store: &MessageStore,
    mail: &ParsedMail,
    mid: &str,
    recipient: &str,
    mycall: &str,
) -> Wl2kResult<PathBuf> {
    let folder = if recipient == mycall {
        Folder::Inbox
    } else {
        Folder::Outbox
    };
    let sender = mail.sender();
    let mut msg = Message::new(mid, sender.as_str(), recipient)
        .with_subject(mail.subject())
        .with_body(mail.body.as_str())
        .with_kind(MessageKind::Email)
        .with_path([sender.as_str()]);
    msg.add_path_element(WL2K_PATH_TAG);
    msg.add_path_element(mycall);
    msg.attachments = mail.attachments.clone();

    let path = store.folder_path(folder).join(format!("{}.json", mid));
    msg.save(&path)?;
    log::info!("Stored Winlink message {} from {} in {}", mid, sender, folder.dir_name());
    Ok(path)
}
