use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::{self};
use std::path::Path;

pub const DEFAULT_PORT: u16 = 993;
pub const DEFAULT_MAILBOX: &str = "INBOX";
pub const DEFAULT_SUBJECT: &str = "factura";
pub const DEFAULT_DATABASE: &str = "emails.db";

/// Validated settings for a fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connection: Connection,
    pub mailbox: String,
    pub subject: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// The config file as written on disk. Everything is optional here so that a
/// missing credential can be reported by name instead of as a serde error, and
/// so command line flags can fill gaps before validation.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub mailbox: Option<String>,
    pub subject: Option<String>,
    pub database: Option<String>,
}

impl RawConfig {
    pub fn from_toml(s: &str) -> Result<RawConfig> {
        toml::from_str(s).context("Couldn't parse the configuration file")
    }

    pub fn validate(self) -> Result<Config> {
        Ok(Config {
            connection: Connection {
                server: required(self.server, "server")?,
                port: self.port.unwrap_or(DEFAULT_PORT),
                username: required(self.username, "username")?,
                password: required(self.password, "password")?,
            },
            mailbox: self.mailbox.unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
            subject: self.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            database: self.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow!("Configuration is missing the required key `{}`", key)),
    }
}

pub fn read_config(file: &Path) -> Result<RawConfig> {
    let s = fs::read_to_string(file)
        .with_context(|| format!("Couldn't read config file {}", file.display()))?;
    RawConfig::from_toml(&s)
}
