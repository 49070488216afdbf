//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::{Arg, Command, value_parser};
use clap_complete::Shell;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Relays log records from stdin to Sentry.";

pub fn make_app() -> Command {
    Command::new("relay")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("The path to the config folder."),
        )
        .subcommand(
            Command::new("run")
                .about("Relay log records from stdin")
                .after_help(
                    "This reads newline-delimited JSON log records from stdin and forwards \
                     them to Sentry until stdin is closed.  Records still queued at that \
                     point are forwarded before the relay exits.",
                )
                .arg(
                    Arg::new("dsn")
                        .long("dsn")
                        .value_name("DSN")
                        .env("RELAY_DSN")
                        .help("The Sentry DSN records are relayed to."),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_name("COUNT")
                        .env("RELAY_CONCURRENCY")
                        .help("The number of concurrent forwarding workers."),
                )
                .arg(
                    Arg::new("queue_capacity")
                        .long("queue-capacity")
                        .value_name("COUNT")
                        .env("RELAY_QUEUE_CAPACITY")
                        .help("The maximum number of records waiting to be forwarded."),
                )
                .arg(
                    Arg::new("overflow_threshold")
                        .long("overflow-threshold")
                        .value_name("COUNT")
                        .env("RELAY_OVERFLOW_THRESHOLD")
                        .help("The queue occupancy above which new records are dropped."),
                )
                .arg(
                    Arg::new("send_failure")
                        .long("send-failure")
                        .value_name("POLICY")
                        .env("RELAY_SEND_FAILURE")
                        .value_parser(["terminate", "reconnect"])
                        .help("What a worker does after Sentry rejected a record."),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the relay config")
                .after_help(
                    "This command provides basic config management.  It can be used to \
                     print out the effective config.",
                )
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes")
                        .after_help(
                            "This dumps out the entire config including the values which \
                             are not in the config file but filled in from defaults.  The \
                             default output format is YAML but a debug format can also be \
                             specified which is useful to understand how the relay \
                             interprets the individual values.",
                        )
                        .arg(
                            Arg::new("format")
                                .short('f')
                                .long("format")
                                .value_parser(["debug", "yaml"])
                                .default_value("yaml")
                                .help("The output format"),
                        ),
                ),
        )
        .subcommand(
            Command::new("generate-completions")
                .about("Generate shell completion file")
                .after_help(
                    "This generates a completions file for the shell of choice.  The \
                     default selection will be an educated guess for the currently \
                     running shell.",
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("SHELL")
                        .value_parser(value_parser!(Shell))
                        .help(
                            "Explicitly pick the shell to generate a completion file for.  \
                             The default is autodetection.",
                        ),
                ),
        )
}
