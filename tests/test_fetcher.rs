use anyhow::{bail, Result};
use assert_cmd::Command;
use mail_archiver::email::{RawAddress, RawMessage};
use mail_archiver::store::MailStore;
use mail_archiver::{fetch_into_store, MailSource};
use tempfile::tempdir;
pub mod utils;
use utils::*;

/// Hands out canned messages for any keyword.
struct FakeMailbox {
    messages: Vec<RawMessage>,
    searched: Vec<String>,
}

impl MailSource for FakeMailbox {
    fn search_subject(&mut self, keyword: &str) -> Result<Vec<RawMessage>> {
        self.searched.push(keyword.to_string());
        Ok(self.messages.clone())
    }
}

struct BrokenMailbox;

impl MailSource for BrokenMailbox {
    fn search_subject(&mut self, _keyword: &str) -> Result<Vec<RawMessage>> {
        bail!("connection reset")
    }
}

fn message(subject: &str, mailbox: &str, body: &str) -> RawMessage {
    RawMessage {
        subject: Some(subject.as_bytes().to_vec()),
        sender: vec![RawAddress {
            mailbox: Some(mailbox.as_bytes().to_vec()),
            host: Some(b"example.com".to_vec()),
        }],
        body: Some(body.as_bytes().to_vec()),
    }
}

#[test]
fn test_three_matches_make_three_rows() -> Result<()> {
    let mut mailbox = FakeMailbox {
        messages: vec![
            message("factura 1", "alice", "one"),
            message("factura 2", "bob", "two"),
            message("factura 3", "carol", "three"),
        ],
        searched: vec![],
    };
    let mut store = MailStore::open_in_memory()?;

    let summary = fetch_into_store(&mut mailbox, &mut store, "factura")?;
    assert_eq!(mailbox.searched, vec!["factura"]);
    assert_eq!(3, summary.stored.len());
    assert!(summary.skipped.is_empty());

    let rows = store.records()?;
    assert_eq!(3, rows.len());
    assert_eq!(rows[1].subject, "factura 2");
    assert_eq!(rows[1].sender, "bob@example.com");
    assert_eq!(rows[1].body, "two");
    Ok(())
}

#[test]
fn test_undecodable_message_is_skipped() -> Result<()> {
    let mut no_sender = message("factura 2", "bob", "two");
    no_sender.sender.clear();
    let mut mailbox = FakeMailbox {
        messages: vec![
            message("factura 1", "alice", "one"),
            no_sender,
            message("factura 3", "carol", "three"),
        ],
        searched: vec![],
    };
    let mut store = MailStore::open_in_memory()?;

    let summary = fetch_into_store(&mut mailbox, &mut store, "factura")?;
    assert_eq!(1, summary.skipped.len());
    assert!(summary.skipped[0].starts_with("message 2"));
    assert_eq!(2, store.count()?);
    assert_eq!("2 emails saved, 1 skipped", summary.to_string());
    Ok(())
}

#[test]
fn test_failed_search_writes_nothing() -> Result<()> {
    let mut store = MailStore::open_in_memory()?;
    assert!(fetch_into_store(&mut BrokenMailbox, &mut store, "factura").is_err());
    assert_eq!(0, store.count()?);
    Ok(())
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("fetch_mail").unwrap();
    cmd.args(&["--help"]);
    cmd.assert()
        .success();
}

#[test]
fn test_missing_password_is_named() -> Result<()> {
    let dir = tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "server = \"imap.example.com\"\nusername = \"me\"\n")?;

    let output = Command::cargo_bin("fetch_mail")?
        .arg(&config)
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("`password`"));
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<()> {
    let dir = tempdir()?;
    Command::cargo_bin("fetch_mail")?
        .arg(dir.path().join("nope.toml"))
        .assert()
        .failure();
    Ok(())
}

/// Needs a GreenMail server reachable at $TEST_HOST.
#[test]
#[ignore]
fn test_fetch_from_greenmail() -> Result<()> {
    let user = random_email();
    send_email(None, Some(&user), Some("factura 1"), Some("first"))?;
    send_email(None, Some(&user), Some("something else"), None)?;
    send_email(None, Some(&user), Some("tu factura 2"), Some("second"))?;

    let dir = tempdir()?;
    let database = dir.path().join("emails.db");
    let config = write_config(dir.path(), &user, &database);

    let output = Command::cargo_bin("fetch_mail")?
        .arg(&config)
        .arg("--print")
        .output()?;
    let lines = parse_output(output)?;
    assert_eq!(
        2,
        lines
            .iter()
            .filter(|l| l.starts_with('{'))
            .count()
    );
    assert_eq!(lines.last().unwrap(), "Emails downloaded and saved: 2 emails saved, 0 skipped");

    let records = MailStore::open(&database)?.records()?;
    assert_eq!(records[0].subject, "factura 1");
    assert_eq!(records[0].sender, "sender@localhost");
    assert_eq!(records[1].subject, "tu factura 2");
    Ok(())
}
