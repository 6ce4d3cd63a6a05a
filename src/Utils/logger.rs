use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::Path;

/// Terminal logger at `level`, plus a debug-level log file when `log_file` is given
pub fn init_logger(
    level: LevelFilter,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            Config::default(),
            File::create(path)?,
        ));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

/// environment variable with the terminal log level
pub const LOG_LEVEL_VAR: &str = "MITOC_LOG";

/// parses "error", "warn", "info", "debug", "trace", "off"; unknown names give `Info`
pub fn level_from_name(name: &str) -> LevelFilter {
    name.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::Info)
}

/// terminal level from `MITOC_LOG`, `Info` when it is unset
pub fn level_from_env() -> LevelFilter {
    level_from_value(std::env::var(LOG_LEVEL_VAR).ok().as_deref())
}

fn level_from_value(value: Option<&str>) -> LevelFilter {
    value.map(level_from_name).unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_name() {
        assert_eq!(level_from_name("debug"), LevelFilter::Debug);
        assert_eq!(level_from_name("WARN"), LevelFilter::Warn);
        assert_eq!(level_from_name("verbose"), LevelFilter::Info);
        assert_eq!(level_from_name(" off\n"), LevelFilter::Off);
    }

    #[test]
    fn test_level_from_environment_value() {
        assert_eq!(level_from_value(None), LevelFilter::Info);
        assert_eq!(level_from_value(Some("trace")), LevelFilter::Trace);
        assert_eq!(level_from_value(Some("")), LevelFilter::Info);
    }
}
