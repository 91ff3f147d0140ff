//! Message envelopes.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// What a queued message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Email-like message, possibly bridged to SMTP or WL2K.
    Email,
    /// Structured form.
    #[default]
    Form,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

/// A store-and-forward message as it sits in a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Message {
    /// Message id, unique per originating station.
    pub mid: String,
    /// Originating station or email address.
    pub src: String,
    /// Destination: callsign, `A;B;C` gratuitous route, `user@host` or
    /// `WL2K:address`.
    pub dst: String,
    /// Stations and gateway tags already traversed, oldest first.
    pub path: Vec<String>,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// A new message with an empty path.
    pub fn new(mid: impl Into<String>, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            src: src.into(),
            dst: dst.into(),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Read a message file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the message to `path`, replacing any previous content.
    ///
    /// The new content goes to a temporary file in the same folder that is
    /// then renamed over `path`, so readers see the old or the new message
    /// and never a partial one.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp.")
            .tempfile_in(dir)
            .map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(text.as_bytes()).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }

    /// Append a station to the path history.
    ///
    /// A station equal to the current last element is not repeated.
    pub fn add_path_element(&mut self, call: &str) {
        if self.path.last().map(String::as_str) != Some(call) {
            self.path.push(call.to_string());
        }
    }

    /// Whether the path history ends with `tail`.
    pub fn path_ends_with(&self, tail: &[&str]) -> bool {
        self.path.len() >= tail.len()
            && self.path[self.path.len() - tail.len()..]
                .iter()
                .zip(tail)
                .all(|(a, b)| a == b)
    }
}

/// Load a message, add `call` to its path, and save it back.
pub fn add_path_element(path: &Path, call: &str) -> StoreResult<()> {
    let mut msg = Message::load(path)?;
    msg.add_path_element(call);
    msg.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_path_element_no_repeat() {
        let mut msg = Message::new("1", "KK7DS", "N0CALL");
        msg.add_path_element("KK7DS");
        msg.add_path_element("KK7DS");
        msg.add_path_element("W1AW");
        msg.add_path_element("KK7DS");
        assert_eq!(msg.path, vec!["KK7DS", "W1AW", "KK7DS"]);
    }

    #[test]
    fn test_path_ends_with() {
        let msg = Message::new("1", "a@b.com", "KK7DS").with_path(["W1AW", "EMAIL", "KK7DS"]);
        assert!(msg.path_ends_with(&["EMAIL", "KK7DS"]));
        assert!(!msg.path_ends_with(&["W1AW", "KK7DS"]));
        assert!(msg.path_ends_with(&[]));
        assert!(!Message::default().path_ends_with(&["EMAIL", "KK7DS"]));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.json");
        let mut msg = Message::new("42", "KK7DS", "user@example.com")
            .with_kind(MessageKind::Email)
            .with_subject("hi")
            .with_body("body text");
        msg.attachments.push(Attachment {
            name: "a.bin".into(),
            data: vec![0, 1, 0xff],
        });
        msg.save(&file).unwrap();

        let raw = fs::read_to_string(&file).unwrap();
        assert!(raw.contains("\"0001ff\""));
        assert!(raw.contains("\"email\""));
        assert_eq!(Message::load(&file).unwrap(), msg);

        add_path_element(&file, "KK7DS").unwrap();
        assert_eq!(Message::load(&file).unwrap().path, vec!["KK7DS"]);
    }

    #[test]
    fn test_save_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.json");
        Message::new("1", "KK7DS", "W1AW").save(&file).unwrap();
        add_path_element(&file, "N0CALL").unwrap();

        assert_eq!(Message::load(&file).unwrap().path, vec!["N0CALL"]);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["m.json"]);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.json");
        assert!(matches!(Message::load(&file), Err(StoreError::Io { .. })));
        fs::write(&file, "not json").unwrap();
        assert!(matches!(Message::load(&file), Err(StoreError::Format { .. })));

        fs::write(&file, r#"{"dst": "W1AW"}"#).unwrap();
        let msg = Message::load(&file).unwrap();
        assert_eq!(msg.dst, "W1AW");
        assert_eq!(msg.kind, MessageKind::Form);
    }
}
