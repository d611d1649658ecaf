//! Reorganises a folder of exported HTML emails.
//!
//! An export looks like this:
//!
//! ```text
//! 20190314-invoice-march-1187.html
//! 20200102-welcome-1201.html
//! Attachments-1187/
//!     invoice.pdf
//! ```
//!
//! `organize` moves every message into a folder named after its year under the
//! archive root, copying the attachment folder it links to alongside it.
//! `clean` deletes attachment folders that no message in the folder links to,
//! which is how the source copies left behind by `organize` get pruned.

use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(clap::ArgEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move messages and their attachments into per-year folders.
    Organize,
    /// Delete attachment folders no message links to.
    Clean,
}

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} does not start with a YYYYMMDD date", .0.display())]
    BadFileName(PathBuf),
    #[error("{} already exists in the archive with different contents", .0.display())]
    Conflict(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InboxError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> InboxError + '_ {
        move |source| InboxError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, InboxError>;

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})\d{4}.*\.html$").expect("valid regex"))
}

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']?(?:\./)?(Attachments-\d+)/"#).expect("valid regex")
    })
}

fn attachment_dir_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Attachments-\d+$").expect("valid regex"))
}

/// Direct children of the inbox folder, in directory listing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scan {
    pub messages: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

/// What happened to each item of a run.
#[derive(Debug, Default)]
pub struct Report {
    pub done: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, InboxError)>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, path: &Path, err: InboxError) {
        warn!("{}", err);
        self.failed.push((path.to_path_buf(), err));
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} succeeded, {} failed", self.done.len(), self.failed.len())?;
        for (_, err) in &self.failed {
            writeln!(f, "  failed: {}", err)?;
        }
        Ok(())
    }
}

pub struct InboxManager {
    folder: PathBuf,
    archive_root: PathBuf,
}

impl InboxManager {
    pub fn new(folder: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        if !folder.is_dir() {
            return Err(InboxError::NotADirectory(folder));
        }
        Ok(InboxManager {
            folder,
            archive_root: archive_root.into(),
        })
    }

    pub fn run(&self, action: Action, dry_run: bool) -> Result<Report> {
        match action {
            Action::Organize => self.organize(),
            Action::Clean => self.clean(dry_run),
        }
    }

    pub fn scan(&self) -> Result<Scan> {
        let mut scan = Scan::default();
        for entry in fs::read_dir(&self.folder).map_err(InboxError::io(&self.folder))? {
            let entry = entry.map_err(InboxError::io(&self.folder))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(InboxError::io(&path))?;
            if file_type.is_dir() {
                scan.directories.push(path);
            } else if file_type.is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".html")
            {
                scan.messages.push(path);
            }
        }
        debug!(
            "Found {} messages and {} directories in {}",
            scan.messages.len(),
            scan.directories.len(),
            self.folder.display()
        );
        Ok(scan)
    }

    pub fn organize(&self) -> Result<Report> {
        let scan = self.scan()?;
        let mut report = Report::default();

        let mut dated = Vec::new();
        let mut years: Vec<String> = Vec::new();
        for message in &scan.messages {
            match message_year(message) {
                Ok(year) => {
                    if !years.contains(&year) {
                        years.push(year.clone());
                    }
                    dated.push((message, year));
                }
                Err(e) => report.fail(message, e),
            }
        }

        for year in &years {
            let dir = self.archive_root.join(year);
            fs::create_dir_all(&dir).map_err(InboxError::io(&dir))?;
        }

        for (message, year) in dated {
            let year_dir = self.archive_root.join(&year);
            match self.archive_message(message, &year_dir) {
                Ok(()) => report.done.push(message.clone()),
                Err(e) => report.fail(message, e),
            }
        }

        // Packing the archive for the accountant would go here once its format
        // is known.

        info!(
            "Organized {} messages into {} year folders",
            report.done.len(),
            years.len()
        );
        Ok(report)
    }

    /// Everything that would be written is checked for conflicts before
    /// anything is touched. Attachments are copied before the message moves so
    /// a message is never archived without them.
    fn archive_message(&self, message: &Path, year_dir: &Path) -> Result<()> {
        let destination = year_dir.join(file_name(message));
        check_file(message, &destination)?;

        let mut attachments = None;
        if let Some(name) = attachment_reference(message)? {
            let source = self.folder.join(&name);
            if source.is_dir() {
                let target = year_dir.join(&name);
                check_dir(&source, &target)?;
                attachments = Some((source, target));
            } else {
                warn!(
                    "{} links to {} which does not exist",
                    message.display(),
                    name
                );
            }
        }

        if let Some((source, target)) = attachments {
            copy_dir_all(&source, &target)?;
        }
        move_file(message, &destination)
    }

    pub fn clean(&self, dry_run: bool) -> Result<Report> {
        let scan = self.scan()?;
        let mut report = Report::default();

        let mut referenced = HashSet::new();
        for message in &scan.messages {
            match attachment_reference(message) {
                Ok(Some(name)) => {
                    referenced.insert(self.folder.join(name));
                }
                Ok(None) => {}
                Err(e) => report.fail(message, e),
            }
        }
        // If a message couldn't be read we can't know what it links to.
        if !report.is_success() {
            warn!("Not deleting anything because some messages couldn't be read");
            return Ok(report);
        }

        for dir in orphans(&scan.directories, &referenced) {
            if dry_run {
                info!("Would delete {}", dir.display());
                report.done.push(dir.clone());
                continue;
            }
            match fs::remove_dir_all(dir) {
                Ok(()) => {
                    info!("Deleted {}", dir.display());
                    report.done.push(dir.clone());
                }
                Err(e) => report.fail(dir, InboxError::io(dir)(e)),
            }
        }
        Ok(report)
    }
}

/// Attachment folders in `directories` that nothing references.
pub fn orphans<'a>(directories: &'a [PathBuf], referenced: &HashSet<PathBuf>) -> Vec<&'a PathBuf> {
    directories
        .iter()
        .filter(|dir| {
            attachment_dir_pattern().is_match(&file_name(dir).to_string_lossy())
                && !referenced.contains(*dir)
        })
        .collect()
}

pub fn message_year(path: &Path) -> Result<String> {
    let name = file_name(path).to_string_lossy();
    year_pattern()
        .captures(&name)
        .map(|c| c[1].to_string())
        .ok_or_else(|| InboxError::BadFileName(path.to_path_buf()))
}

/// Name of the first attachment folder the message links to.
pub fn attachment_reference(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path).map_err(InboxError::io(path))?;
    Ok(find_attachment_link(&decode(bytes)))
}

pub fn find_attachment_link(html: &str) -> Option<String> {
    link_pattern()
        .captures(html)
        .map(|c| c[1].to_string())
}

/// UTF-8, or Latin-1 when that fails. Latin-1 maps every byte to a char so
/// this never fails, at the cost of mojibake for other encodings.
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e
            .into_bytes()
            .into_iter()
            .map(char::from)
            .collect(),
    }
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    let left = fs::read(a).map_err(InboxError::io(a))?;
    let right = fs::read(b).map_err(InboxError::io(b))?;
    Ok(left == right)
}

/// Fails if `to` exists with different contents from `from`.
fn check_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() && !same_contents(from, to)? {
        return Err(InboxError::Conflict(to.to_path_buf()));
    }
    Ok(())
}

/// `check_file` for every file `copy_dir_all(from, to)` would write.
fn check_dir(from: &Path, to: &Path) -> Result<()> {
    if !to.exists() {
        return Ok(());
    }
    if !to.is_dir() {
        return Err(InboxError::Conflict(to.to_path_buf()));
    }
    for entry in fs::read_dir(from).map_err(InboxError::io(from))? {
        let entry = entry.map_err(InboxError::io(from))?;
        let target = to.join(entry.file_name());
        if entry
            .file_type()
            .map_err(InboxError::io(&entry.path()))?
            .is_dir()
        {
            check_dir(&entry.path(), &target)?;
        } else if target.is_dir() {
            return Err(InboxError::Conflict(target));
        } else {
            check_file(&entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Moves `from` to `to`. A destination with the same contents means the file
/// was archived already, so only the source is removed. A different one is
/// left alone.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        check_file(from, to)?;
        debug!("{} is already archived", from.display());
        return fs::remove_file(from).map_err(InboxError::io(from));
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to).map_err(InboxError::io(to))?;
    fs::remove_file(from).map_err(InboxError::io(from))
}

/// Recursive copy that never overwrites: identical files are skipped and a
/// differing one is a conflict.
fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(InboxError::io(to))?;
    for entry in fs::read_dir(from).map_err(InboxError::io(from))? {
        let entry = entry.map_err(InboxError::io(from))?;
        let target = to.join(entry.file_name());
        if entry
            .file_type()
            .map_err(InboxError::io(&entry.path()))?
            .is_dir()
        {
            copy_dir_all(&entry.path(), &target)?;
        } else if target.exists() {
            check_file(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(InboxError::io(&target))?;
        }
    }
    Ok(())
}
