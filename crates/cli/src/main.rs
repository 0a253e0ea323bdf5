// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `stash2plex`: a Stash plugin binary invoked once per hook event or task
//! mode. Every invocation reads one JSON envelope from stdin, runs to
//! completion, and exits — there is no resident daemon mode.

mod color;
mod config;
mod device_identity;
mod envelope;
mod hook;
mod logging;
mod output;
mod paths;
mod table;
mod task;

use config::ConfigError;
use envelope::Envelope;
use std::io::Read;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("stash2plex {VERSION}");
}

fn print_help() {
    println!("stash2plex {VERSION}");
    println!();
    println!("A Stash plugin that syncs scene metadata into Plex.");
    println!("Reads a JSON envelope ({{hookContext, args}}) from stdin; not meant to be run interactively.");
    println!();
    println!("USAGE:");
    println!("    echo '{{...}}' | stash2plex");
    println!();
    println!("FLAGS:");
    println!("    --help       Print this message and exit");
    println!("    --version    Print the version and exit");
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Handled before any config/lock work so they succeed even with a
    // broken on-disk config file or a missing data directory.
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--version") {
        print_version();
        return std::process::ExitCode::SUCCESS;
    }
    if args.iter().any(|a| a == "--help") {
        print_help();
        return std::process::ExitCode::SUCCESS;
    }

    logging::init();

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        tracing::error!(error = %e, "failed to read stdin envelope");
        return std::process::ExitCode::FAILURE;
    }

    let envelope = match Envelope::from_str(&input) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse stdin envelope as JSON");
            return std::process::ExitCode::FAILURE;
        }
    };

    let config = match config::Config::load(&envelope.args, &envelope.server_connection) {
        Ok(c) => c,
        Err(ConfigError::MissingFields(fields)) => {
            tracing::error!(fields = %fields.join(", "), "missing required config field(s)");
            return std::process::ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return std::process::ExitCode::FAILURE;
        }
    };

    // Fatal only above this line (bad envelope, bad config). Everything a
    // hook handler or task mode can fail on from here is transient and is
    // logged rather than turned into a nonzero exit, so a single bad scene
    // or a momentarily unreachable Plex never marks the whole Stash task
    // run as failed.
    let result = match &envelope.hook_context {
        Some(hook_context) => hook::handle(hook_context, &config).await,
        None => match &envelope.args.mode {
            Some(mode) => task::dispatch(mode, &config).await,
            None => {
                tracing::error!("envelope carried neither a hookContext nor an args.mode");
                return std::process::ExitCode::FAILURE;
            }
        },
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "invocation failed");
    }
    std::process::ExitCode::SUCCESS
}
