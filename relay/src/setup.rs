use std::error::Error;

use relay_config::Config;
use relay_sink::SinkStats;

use crate::input::InputStats;

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        relay_log::info!("launching relay without config folder");
    } else {
        relay_log::info!(
            "launching relay from config folder {}",
            config.path().display()
        );
    }

    let relay = config.relay();
    relay_log::info!("  concurrency: {}", relay.concurrency);
    relay_log::info!("  queue capacity: {}", relay.queue_capacity);
    match relay.overflow_threshold {
        Some(threshold) => relay_log::info!("  overflow threshold: {threshold}"),
        None => relay_log::info!("  overflow threshold: -"),
    };
    relay_log::info!("  send failure: {}", relay.send_failure);
    relay_log::info!("  log level: {}", config.logging().level);
}

/// Resolves the hostname reported with every record.
///
/// Returns an empty string if the hostname cannot be determined.
pub fn hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(error) => {
            relay_log::warn!(error = &error as &dyn Error, "unable to determine hostname");
            String::new()
        }
    }
}

/// Logs the totals after the relay has shut down.
pub fn dump_stats(input: &InputStats, stats: &SinkStats) {
    relay_log::info!(
        lines = input.lines,
        invalid = input.invalid,
        accepted = stats.accepted,
        dropped = stats.dropped,
        forwarded = stats.forwarded,
        failed = stats.failed,
        "relay shut down"
    );

    let unforwarded = stats.accepted.saturating_sub(stats.forwarded + stats.failed);
    if unforwarded > 0 {
        relay_log::warn!(unforwarded, "records were accepted but never forwarded");
    }
}
