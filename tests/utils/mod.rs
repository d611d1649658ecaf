#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use lettre;
use lettre::Transport;
use lettre_email;
use native_tls;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use uuid::Uuid;

// ---- exported inbox fixtures ----

/// Writes an exported message, optionally linking to an attachment folder.
pub fn write_message(dir: &Path, name: &str, attachment: Option<&str>) -> PathBuf {
    let link = attachment
        .map(|a| format!(r#"<a href="{}/file.pdf">file.pdf</a>"#, a))
        .unwrap_or_default();
    let path = dir.join(name);
    fs::write(&path, format!("<html><body><p>{}</p>{}</body></html>", name, link)).unwrap();
    path
}

/// Creates `Attachments-N` with a file and a nested folder in it.
pub fn write_attachments(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.join("inline")).unwrap();
    fs::write(path.join("file.pdf"), format!("pdf for {}", name)).unwrap();
    fs::write(path.join("inline").join("logo.png"), [0u8, 159, 146, 150]).unwrap();
    path
}

/// Sorted names of the entries in `dir`.
pub fn names(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            e.unwrap()
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect::<Vec<_>>();
    names.sort();
    names
}

// ---- GreenMail ----

pub fn random_email() -> String {
    format!("{}@greenmail.com", Uuid::new_v4()).to_string()
}

pub fn test_host() -> String {
    std::env::var("TEST_HOST").unwrap_or("greenmail".to_string())
}

pub fn send_email(
    from: Option<&str>,
    to: Option<&str>,
    subject: Option<&str>,
    body: Option<&str>,
) -> Result<()> {
    let to = to.unwrap_or("test@greenmail.com");
    let from = from.unwrap_or("sender@localhost");
    let subject = subject.unwrap_or("test subject");
    let body = body.unwrap_or("Hello world from SMTP");

    let mut s = smtp(&to);
    let e = lettre_email::Email::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .text(body)
        .build()
        .unwrap();
    s.send(e.into())?;
    Ok(())
}

/// Config file for a GreenMail account, where the password is the address.
pub fn write_config(dir: &Path, user: &str, database: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            "server = \"{}\"\nport = 3993\nusername = \"{user}\"\npassword = \"{user}\"\ndatabase = \"{}\"\n",
            test_host(),
            database.display(),
            user = user,
        ),
    )
    .unwrap();
    path
}

pub fn tls() -> native_tls::TlsConnector {
    native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .unwrap()
}

pub fn smtp(user: &str) -> lettre::SmtpTransport {
    let creds = lettre::smtp::authentication::Credentials::new(user.to_string(), user.to_string());
    lettre::SmtpClient::new(
        &format!("{}:3465", test_host()),
        lettre::ClientSecurity::Wrapper(lettre::ClientTlsParameters {
            connector: tls(),
            domain: "smpt.example.com".to_string(),
        }),
    )
    .unwrap()
    .credentials(creds)
    .transport()
}

/// If the process failed, we return stderr as an error. Otherwise, return
/// the stdout as a list of lines.
pub fn parse_output(output: process::Output) -> Result<Vec<String>> {
    if !output
        .status
        .success()
    {
        return Err(anyhow!(
            "Process exited with an error:\n{}",
            String::from_utf8(output.stderr)?
        ));
    }

    let stdout = String::from_utf8(
        output
            .stdout
            .to_vec(),
    )
    .context("Couldn't stringify stdout")?;

    Ok(stdout
        .lines()
        .map(|s| s.to_string())
        .collect::<Vec<String>>())
}
