//! Tracing subscriber setup.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

/// Map a `--verbosity` value to a level; unknown values fall back to info.
pub fn parse_level(verbosity: &str) -> Level {
    match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber. `format` is `text` or `json`.
///
/// Logs go to stderr so stdout stays clean for `--output-json`.
pub fn setup_logging(verbosity: &str, format: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(parse_level(verbosity))
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }
}
