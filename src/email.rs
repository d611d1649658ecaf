use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json;

/// One row of the `emails` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MailRecord {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// The raw pieces of a fetched message, still as bytes. Kept separate from the
/// IMAP types so the decoding rules can be exercised without a server.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub subject: Option<Vec<u8>>,
    pub sender: Vec<RawAddress>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct RawAddress {
    pub mailbox: Option<Vec<u8>>,
    pub host: Option<Vec<u8>>,
}

impl RawAddress {
    fn from_imap_address(address: &imap_proto::Address) -> RawAddress {
        RawAddress {
            mailbox: address
                .mailbox
                .as_ref()
                .map(|a| a.to_vec()),
            host: address
                .host
                .as_ref()
                .map(|a| a.to_vec()),
        }
    }
}

impl RawMessage {
    pub fn from_fetch(msg: &imap::types::Fetch) -> Result<RawMessage> {
        let envelope = msg
            .envelope()
            .ok_or(anyhow!("No envelope in fetch"))?;

        Ok(RawMessage {
            subject: envelope
                .subject
                .as_ref()
                .map(|s| s.to_vec()),
            sender: envelope
                .sender
                .iter()
                .flatten()
                .map(RawAddress::from_imap_address)
                .collect(),
            body: msg.text().map(|b| b.to_vec()),
        })
    }

    /// Every message of a FETCH response, in the order the server sent them.
    pub fn from_fetches(fetches: &imap::types::Fetches) -> Result<Vec<RawMessage>> {
        fetches
            .iter()
            .map(RawMessage::from_fetch)
            .collect()
    }
}

impl MailRecord {
    pub fn from_raw(raw: &RawMessage) -> Result<MailRecord> {
        let subject = match &raw.subject {
            Some(bytes) => decode_subject(utf8(bytes, "subject")?),
            None => String::new(),
        };

        let first = raw
            .sender
            .first()
            .ok_or(anyhow!("Envelope has no sender address"))?;
        let mailbox = first
            .mailbox
            .as_deref()
            .ok_or(anyhow!("Sender address has no mailbox"))?;
        let host = first
            .host
            .as_deref()
            .ok_or(anyhow!("Sender address has no host"))?;
        let sender = format!("{}@{}", utf8(mailbox, "sender mailbox")?, utf8(host, "sender host")?);

        let body = match &raw.body {
            Some(bytes) => utf8(bytes, "body")?.to_string(),
            None => String::new(),
        };

        Ok(MailRecord {
            subject,
            sender,
            body,
        })
    }

    pub fn from_json(json: &str) -> serde_json::Result<MailRecord> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self)
    }
}

fn utf8<'a>(bytes: &'a [u8], field: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).with_context(|| format!("The {} is not valid UTF-8", field))
}

/// Envelope subjects come straight from the header, so they may still carry
/// RFC 2047 encoded words.
fn decode_subject(subject: &str) -> String {
    if !subject.contains("=?") {
        return subject.to_string();
    }
    let header = format!("Subject: {}", subject);
    match mailparse::parse_header(header.as_bytes()) {
        Ok((parsed, _)) => parsed.get_value(),
        Err(_) => subject.to_string(),
    }
}
