mod assemble;
mod config;
mod db;
mod eligibility;
mod error;
mod hallticket;
mod import;
mod ipc;
mod logging;
mod mail;
mod records;
mod uploads;

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    logging::init();

    let config = config::Config::load()?;
    let mailer = mail::build_mailer(&config.mail)?;
    info!(transport = mailer.kind(), "mail client ready");

    let mut state = ipc::AppState::new(mailer);
    if let Some(path) = config.workspace.as_ref() {
        match state.open_workspace(path) {
            Ok(()) => info!(workspace = %path.to_string_lossy(), "workspace opened"),
            Err(e) => warn!(workspace = %path.to_string_lossy(), error = %e, "configured workspace not opened"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // Can't recover the id from a broken line.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }
    Ok(())
}
