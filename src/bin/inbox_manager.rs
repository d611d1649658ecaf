use anyhow::{bail, Result};
use clap::Parser;
use mail_archiver::binary_libs::inbox_manager_libs::*;
use mail_archiver::inbox::Action;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let report = run(&args)?;

    if args.dry_run && args.action == Action::Clean {
        for dir in &report.done {
            println!("would delete {}", dir.display());
        }
    }
    print!("{}", report);

    if !report.is_success() {
        bail!("{} item(s) failed", report.failed.len());
    }
    Ok(())
}
