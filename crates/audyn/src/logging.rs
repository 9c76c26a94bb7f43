use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::LevelFilter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error(transparent)]
    Log(#[from] log::SetLoggerError),
    #[cfg(unix)]
    #[error("syslog initialization failed: {0}")]
    Syslog(String),
}

/// Resolves `-v`/`-q` into a level filter. Bare invocation logs at `Info`;
/// each `-v` steps up one level, `-q` drops to `Warn`, and quiet wins over
/// verbose if both are somehow set.
pub fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initializes the global logger: colored `[time] [LEVEL] message` lines on
/// stderr, or the host syslog facility when `use_syslog` is set.
pub fn init(level: LevelFilter, use_syslog: bool) -> Result<(), LoggerInitError> {
    if use_syslog {
        return init_syslog(level);
    }

    let colors = ColoredLevelConfig::new()
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Magenta);

    Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

#[cfg(unix)]
fn init_syslog(level: LevelFilter) -> Result<(), LoggerInitError> {
    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_USER,
        hostname: None,
        process: "audyn".into(),
        pid: std::process::id() as i32,
    };
    let syslogger =
        syslog::unix(formatter).map_err(|err| LoggerInitError::Syslog(err.to_string()))?;
    Dispatch::new()
        .level(level)
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .chain(syslogger)
        .apply()?;
    Ok(())
}

#[cfg(not(unix))]
fn init_syslog(level: LevelFilter) -> Result<(), LoggerInitError> {
    log::warn!("--syslog is only supported on unix targets; falling back to stderr");
    init(level, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(level_from_flags(3, true), LevelFilter::Warn);
    }

    #[test]
    fn verbosity_steps_up_from_info() {
        assert_eq!(level_from_flags(0, false), LevelFilter::Info);
        assert_eq!(level_from_flags(1, false), LevelFilter::Debug);
        assert_eq!(level_from_flags(2, false), LevelFilter::Trace);
    }
}
