use anyhow::{bail, Result};
use clap::Parser;
use mail_archiver::binary_libs::fetch_mail_libs::*;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let summary = run(&args)?;

    print_summary(&summary, &mut std::io::stdout())?;
    if !summary.skipped.is_empty() {
        bail!("{} email(s) couldn't be saved", summary.skipped.len());
    }
    Ok(())
}
