//! Relays log records from stdin to Sentry.
//!
//! The `relay` binary reads newline-delimited JSON log records from stdin and forwards each of
//! them to the Sentry project configured by its DSN. Records are forwarded concurrently by a pool
//! of workers, each holding its own connection. If Sentry cannot keep up, records are dropped
//! rather than stalling the producer writing to stdin.
//!
//! # Input Format
//!
//! Every line is one record:
//!
//! ```json
//! {"level": "error", "message": "disk full", "source": "storage", "stack": "main.go:12"}
//! ```
//!
//! `level` and `message` are required. `created` takes an RFC 3339 timestamp and defaults to the
//! time the line was read.
//!
//! # Workspace Crates
//!
//!  - `relay`: Main entry point and command line interface.
//!  - [`relay-config`]: Static configuration for the CLI.
//!  - [`relay-log`]: Diagnostic logging.
//!  - [`relay-sentry`]: Sentry backend client.
//!  - [`relay-sink`]: The bounded, concurrent relay pipeline.
//!
//! [`relay-config`]: ../relay_config/index.html
//! [`relay-log`]: ../relay_log/index.html
//! [`relay-sentry`]: ../relay_sentry/index.html
//! [`relay-sink`]: ../relay_sink/index.html

mod cli;
mod cliapp;
mod input;
mod setup;

use std::process;

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            relay_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
