use crate::inbox::{Action, InboxManager, Report};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Sort exported HTML emails into per-year folders, or prune attachment
/// folders nothing links to.
#[derive(Parser, Debug)]
#[clap(author, version)]
pub struct Args {
    /// What to do with the folder.
    #[clap(arg_enum)]
    pub action: Action,

    /// Folder holding the exported .html files and Attachments-N folders.
    pub folder_path: PathBuf,

    /// Where the year folders go. Defaults to the current directory.
    #[clap(long)]
    pub archive_root: Option<PathBuf>,

    /// With clean, list the folders that would be deleted and keep them.
    #[clap(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn archive_root(&self) -> Result<PathBuf> {
        match &self.archive_root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("Couldn't determine the current directory"),
        }
    }
}

pub fn run(args: &Args) -> Result<Report> {
    let manager = InboxManager::new(&args.folder_path, args.archive_root()?)?;
    Ok(manager.run(args.action, args.dry_run)?)
}
