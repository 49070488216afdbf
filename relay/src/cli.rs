use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use clap_complete::Shell;
use relay_config::{Config, OverridableConfig};
use relay_sentry::SentryConnector;
use relay_sink::RelaySink;

use crate::cliapp::make_app;
use crate::input;
use crate::setup;

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .map_or(Path::new(".relay"), PathBuf::as_path);

    // Completions do not need a config, so they are generated before loading it.
    if let Some(matches) = matches.subcommand_matches("generate-completions") {
        return generate_completions(matches);
    }

    let mut config = Config::from_path(config_path)?;
    if let Some(matches) = matches.subcommand_matches("run") {
        config.apply_override(extract_config_args(matches))?;
    }

    relay_log::init(config.logging());

    if let Some(matches) = matches.subcommand_matches("config") {
        manage_config(&config, matches)
    } else if matches.subcommand_matches("run").is_some() {
        run(config)
    } else {
        unreachable!()
    }
}

/// Extract config arguments from a parsed command line arguments object
pub fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    OverridableConfig {
        dsn: matches.get_one("dsn").cloned(),
        concurrency: matches.get_one("concurrency").cloned(),
        queue_capacity: matches.get_one("queue_capacity").cloned(),
        overflow_threshold: matches.get_one("overflow_threshold").cloned(),
        send_failure: matches.get_one("send_failure").cloned(),
    }
}

pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    if let Some(matches) = matches.subcommand_matches("show") {
        show_config(config, matches)
    } else {
        unreachable!()
    }
}

pub fn show_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    let output = match matches.get_one::<String>("format").map(String::as_str) {
        Some("debug") => format!("{config:#?}\n"),
        Some("yaml") | None => config.to_yaml_string()?,
        _ => unreachable!(),
    };

    io::stdout()
        .write_all(output.as_bytes())
        .context("failed to write config to stdout")?;

    Ok(())
}

pub fn generate_completions(matches: &ArgMatches) -> Result<()> {
    let shell = match matches.get_one::<Shell>("format") {
        Some(shell) => *shell,
        None => Shell::from_env().context("unable to detect the current shell")?,
    };

    let mut app = make_app();
    let name = app.get_name().to_owned();
    clap_complete::generate(shell, &mut app, name, &mut io::stdout());

    Ok(())
}

pub fn run(config: Config) -> Result<()> {
    setup::dump_spawn_infos(&config);

    let relay_config = config.relay_config()?;
    let hostname = setup::hostname();
    let sink = RelaySink::new(relay_config, SentryConnector::new(), hostname)?;

    let input = input::relay_lines(io::stdin().lock(), &sink);
    let stats = sink.close();

    let input = input.context("failed to read log records from stdin")?;
    setup::dump_stats(&input, &stats);

    Ok(())
}
