use anyhow::{Context, Result};
use email::{MailRecord, RawMessage};
use imap::Session;
use log::{debug, info, warn};
use std::io::{Read, Write};
use store::MailStore;

pub mod binary_libs;
pub mod config;
pub mod email;
pub mod inbox;
pub mod store;

/// Anything that can answer "which messages have this in their subject".
pub trait MailSource {
    fn search_subject(&mut self, keyword: &str) -> Result<Vec<RawMessage>>;
}

pub struct ImapSource<T: Read + Write> {
    session: Session<T>,
}

impl<T: Read + Write> ImapSource<T> {
    pub fn new(session: Session<T>) -> Self {
        ImapSource { session }
    }

    pub fn logout(mut self) -> Result<()> {
        self.session
            .logout()
            .context("Couldn't log out of the IMAP session")
    }
}

impl<T: Read + Write> MailSource for ImapSource<T> {
    fn search_subject(&mut self, keyword: &str) -> Result<Vec<RawMessage>> {
        let query = format!("SUBJECT {}", quote(keyword));
        debug!("Searching with {}", query);
        let mut ids: Vec<u32> = self
            .session
            .search(&query)?
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ids.sort_unstable();

        let seq_set = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let fetches = self
            .session
            .fetch(seq_set, "(ENVELOPE BODY[TEXT])")?;
        RawMessage::from_fetches(&fetches)
    }
}

/// Quote a string for use in an IMAP command.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn login(config: &config::Config) -> Result<Session<impl Read + Write>> {
    let conn = &config.connection;
    info!("Connecting to {}:{}", conn.server, conn.port);
    let client = imap::ClientBuilder::new(&conn.server, conn.port)
        .native_tls()
        .with_context(|| format!("Couldn't connect to {}", conn.server))?;

    let mut session = client
        .login(&conn.username, &conn.password)
        .map_err(|e| e.0)
        .with_context(|| format!("Couldn't log in as {}", conn.username))?;

    session
        .select(&config.mailbox)
        .with_context(|| format!("Couldn't select mailbox {}", config.mailbox))?;

    Ok(session)
}

/// Outcome of one fetch run.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub stored: Vec<MailRecord>,
    pub skipped: Vec<String>,
}

impl std::fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} emails saved, {} skipped",
            self.stored.len(),
            self.skipped.len()
        )
    }
}

/// Pulls every message matching `keyword` out of `source` and appends them to
/// `store` in one transaction. Messages that can't be decoded are skipped and
/// listed in the summary.
pub fn fetch_into_store(
    source: &mut impl MailSource,
    store: &mut MailStore,
    keyword: &str,
) -> Result<FetchSummary> {
    let mut summary = FetchSummary::default();
    for (n, raw) in source
        .search_subject(keyword)?
        .iter()
        .enumerate()
    {
        match MailRecord::from_raw(raw) {
            Ok(record) => summary.stored.push(record),
            Err(e) => {
                warn!("Skipping message {} of the search results: {:#}", n + 1, e);
                summary
                    .skipped
                    .push(format!("message {}: {:#}", n + 1, e));
            }
        }
    }
    store.insert_all(&summary.stored)?;
    info!("Stored {} emails", summary.stored.len());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("factura"), "\"factura\"");
        assert_eq!(quote("a \"b\""), "\"a \\\"b\\\"\"");
    }
}
