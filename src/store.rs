use crate::email::MailRecord;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS emails (subject TEXT, sender TEXT, body TEXT)";

/// Append-only table of fetched mail.
pub struct MailStore {
    conn: Connection,
}

impl MailStore {
    pub fn open(path: &Path) -> Result<MailStore> {
        let conn = Connection::open(path)
            .with_context(|| format!("Couldn't open database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<MailStore> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<MailStore> {
        conn.execute_batch(SCHEMA)
            .context("Couldn't create the emails table")?;
        Ok(MailStore { conn })
    }

    /// Inserts every record inside one transaction. Nothing is written unless
    /// the whole batch goes in.
    pub fn insert_all(&mut self, records: &[MailRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO emails (subject, sender, body) VALUES (?1, ?2, ?3)")?;
            for record in records {
                stmt.execute(params![record.subject, record.sender, record.body])?;
            }
        }
        tx.commit()
            .context("Couldn't commit the fetched emails")?;
        Ok(records.len())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// All rows in insertion order.
    pub fn records(&self) -> Result<Vec<MailRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT subject, sender, body FROM emails ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(MailRecord {
                subject: row.get(0)?,
                sender: row.get(1)?,
                body: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
