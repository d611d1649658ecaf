use crate::config::{self, RawConfig};
use crate::store::MailStore;
use crate::{fetch_into_store, login, FetchSummary, ImapSource};
use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Download emails whose subject contains a keyword and save them to SQLite.
#[derive(Parser, Debug)]
#[clap(author, version)]
pub struct Args {
    /// Location of the TOML config file with the IMAP credentials.
    pub config: PathBuf,

    /// hostname of IMAP server.
    #[clap(long)]
    pub server: Option<String>,

    /// port of IMAP server.
    #[clap(long)]
    pub port: Option<u16>,

    /// username for IMAP authentication
    #[clap(long)]
    pub username: Option<String>,

    /// password for IMAP authentication.
    #[clap(long)]
    pub password: Option<String>,

    /// Only fetch emails whose subject contains this.
    #[clap(long)]
    pub subject: Option<String>,

    /// SQLite database to append to.
    #[clap(long)]
    pub database: Option<String>,

    /// Print every saved email to stdout as a line of JSON.
    #[clap(long)]
    pub print: bool,
}

impl Args {
    #[rustfmt::skip]
    pub fn overwrite_config(&self, config: RawConfig) -> RawConfig {
        RawConfig {
            server   : self.server.clone().or(config.server),
            port     : self.port.or(config.port),
            username : self.username.clone().or(config.username),
            password : self.password.clone().or(config.password),
            subject  : self.subject.clone().or(config.subject),
            database : self.database.clone().or(config.database),
            ..config
        }
    }
}

/// Load the config file, apply the command line on top and validate it.
pub fn load_config(args: &Args) -> Result<config::Config> {
    let raw = config::read_config(&args.config)?;
    args.overwrite_config(raw).validate()
}

pub fn run(args: &Args) -> Result<FetchSummary> {
    let config = load_config(args)?;

    // Open the store before touching the network so a bad path fails fast.
    let mut store = MailStore::open(Path::new(&config.database))?;

    let mut source = ImapSource::new(login(&config)?);
    let result = fetch_into_store(&mut source, &mut store, &config.subject);
    if let Err(e) = source.logout() {
        warn!("{:#}", e);
    }
    let summary = result.context("Fetching emails failed")?;

    if args.print {
        for record in &summary.stored {
            output_email(record)?;
        }
    }
    Ok(summary)
}

pub fn output_email(email: &crate::email::MailRecord) -> Result<()> {
    println!("{}", email.to_json()?);
    Ok(())
}

/// End-of-run summary for the user.
pub fn print_summary(summary: &FetchSummary, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Emails downloaded and saved: {}", summary)?;
    for skipped in &summary.skipped {
        writeln!(out, "  skipped {}", skipped)?;
    }
    Ok(())
}
