//! Runs the reveal coordinator over an HTML file and prints what animated.
//!
//! Usage: `reveal <page.html>`. Settings come from the `REVEAL_*`
//! environment variables; logging from `RUST_LOG`.

use anyhow::{Error, anyhow};
use env_logger::{Builder, Env};
use log::{error, info};
use page_handler::{HtmlPage, RevealConfig};
use std::env;
use std::fs;
use std::process::exit;
use tokio::runtime;
use tokio::task::LocalSet;

mod report;
mod simulate;

#[allow(clippy::print_stdout, reason = "the JSON report is the program's output")]
fn print_report(json: &str) {
    println!("{json}");
}

fn run() -> Result<(), Error> {
    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: reveal <page.html>"))?;
    let source = fs::read_to_string(&path)?;
    let config = RevealConfig::from_env();
    info!("loading {path} with {config:?}");

    let tokio_runtime = runtime::Builder::new_current_thread().enable_all().build()?;
    let page = HtmlPage::parse(config, &source)?;
    let report = LocalSet::new().block_on(&tokio_runtime, simulate::run(page))?;
    print_report(&serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() {
    let _log_init: Result<(), _> =
        Builder::from_env(Env::default().filter_or("RUST_LOG", "info")).try_init();
    if let Err(err) = run() {
        error!("error: {err:#}");
        exit(1);
    }
}
