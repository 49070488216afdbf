use std::error::Error;
use std::io::{self, BufRead};

use relay_sink::{LogRecord, RelaySink};

/// Counters of the records read from the input stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InputStats {
    /// Non-empty lines read.
    pub lines: u64,
    /// Lines that could not be parsed into a record.
    pub invalid: u64,
}

/// Submits every JSON record read line by line from `reader` to the sink.
///
/// Blank lines are skipped. Lines that fail to parse are logged and skipped. Returns once the
/// reader is exhausted or fails.
pub fn relay_lines<R: BufRead>(reader: R, sink: &RelaySink) -> io::Result<InputStats> {
    let mut stats = InputStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        stats.lines += 1;
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => sink.submit(record),
            Err(error) => {
                stats.invalid += 1;
                relay_log::error!(
                    error = &error as &dyn Error,
                    line = index + 1,
                    "invalid log record"
                );
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use relay_sink::{BackendClient, EnrichedContext, RelayConfig, Tier};
    use similar_asserts::assert_eq;

    use super::*;

    type Received = Arc<Mutex<Vec<(Tier, String)>>>;

    struct Collect(Received);

    impl Collect {
        fn push(&mut self, tier: Tier, message: &str) -> Result<(), Infallible> {
            self.0.lock().unwrap().push((tier, message.to_owned()));
            Ok(())
        }
    }

    impl BackendClient for Collect {
        type Error = Infallible;

        fn debug(&mut self, message: &str, _: &EnrichedContext) -> Result<(), Infallible> {
            self.push(Tier::Debug, message)
        }

        fn info(&mut self, message: &str, _: &EnrichedContext) -> Result<(), Infallible> {
            self.push(Tier::Info, message)
        }

        fn warning(&mut self, message: &str, _: &EnrichedContext) -> Result<(), Infallible> {
            self.push(Tier::Warning, message)
        }

        fn error(&mut self, message: &str, _: &EnrichedContext) -> Result<(), Infallible> {
            self.push(Tier::Error, message)
        }

        fn fatal(&mut self, message: &str, _: &EnrichedContext) -> Result<(), Infallible> {
            self.push(Tier::Fatal, message)
        }
    }

    fn sink() -> (RelaySink, Received) {
        let received = Received::default();
        let shared = received.clone();
        let connector = move |_: &str, _: &str| Ok::<_, Infallible>(Collect(shared.clone()));

        let config = RelayConfig::new("test://").concurrency(1).queue_capacity(16);
        (RelaySink::new(config, connector, "").unwrap(), received)
    }

    #[test]
    fn test_relay_lines() {
        relay_log::init_test!();

        let input = concat!(
            r#"{"level": "info", "message": "started"}"#,
            "\n\n",
            r#"{"level": "critical", "message": "crashed", "source": "main"}"#,
            "\n",
        );

        let (sink, received) = sink();
        let stats = relay_lines(input.as_bytes(), &sink).unwrap();
        sink.close();

        assert_eq!(
            stats,
            InputStats {
                lines: 2,
                invalid: 0
            }
        );
        assert_eq!(
            *received.lock().unwrap(),
            [
                (Tier::Info, "started".to_owned()),
                (Tier::Fatal, "crashed".to_owned()),
            ]
        );
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let (guard, logs) = relay_log::test::capture();

        let input = "not json\n{\"level\": \"loud\", \"message\": \"x\"}\n{\"level\": \"debug\", \"message\": \"ok\"}\n";

        let (sink, received) = sink();
        let stats = relay_lines(input.as_bytes(), &sink).unwrap();
        let sink_stats = sink.close();
        drop(guard);

        assert_eq!(stats.lines, 3);
        assert_eq!(stats.invalid, 2);
        assert_eq!(sink_stats.accepted, 1);
        assert_eq!(received.lock().unwrap().len(), 1);
        assert!(logs.contains("invalid log record"), "{}", logs.contents());
        assert!(logs.contains("line=2"), "{}", logs.contents());
    }
}
