use std::str::FromStr;

use anyhow::Context;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::config::LoggingConfig;

pub fn parse_level(level: &str) -> Result<LevelFilter, anyhow::Error> {
    LevelFilter::from_str(level).map_err(|_| anyhow::anyhow!("Unknown log level {level:?}"))
}

/// Installs the terminal logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), anyhow::Error> {
    let mut config = ConfigBuilder::new();
    config.set_time_format_rfc3339();
    // The local offset cannot be read once other threads run; timestamps stay UTC then.
    if config.set_time_offset_to_local().is_err() {
        eprintln!("Failed to set time offset to local, logging in UTC");
    }

    TermLogger::init(
        level,
        config.build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")
}

pub fn init_from(config: &LoggingConfig) -> Result<(), anyhow::Error> {
    init(parse_level(&config.level)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
        assert!(parse_level("chatty").is_err());
    }

    #[test]
    fn test_second_init_is_refused() {
        init_from(&LoggingConfig::default()).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Info);

        let err = init(LevelFilter::Warn).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to initialize logger"));
    }
}
