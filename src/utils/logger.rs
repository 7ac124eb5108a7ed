//! log4rs setup helpers. The library itself only logs through `log`; these
//! are for embedding applications and tests that want files on disk.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::utils::devlog::DEV_TARGET;

pub const ENV_LOG_DIR: &str = "DOCSEARCH_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "DOCSEARCH_LOG_LEVEL";
pub const ENV_LOG_RETENTION: &str = "DOCSEARCH_LOG_RETENTION";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

type LogResult = Result<(), Box<dyn std::error::Error>>;

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error when the file is missing or invalid.
pub fn init() -> LogResult {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// Returns an error when the file is missing or invalid.
pub fn init_path(path: &Path) -> LogResult {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the rolling-file configuration used by [`configure_logging`].
///
/// Records go to `{dir}/docsearch.log`; developer traces
/// ([`devtrace!`](crate::devtrace)) go to `{dir}/dev.log` when `level` is
/// `trace` and are discarded otherwise.
///
/// # Errors
/// Returns an error when an appender cannot be created.
pub fn build_config(dir: &Path, level: Option<&str>, retention: Option<usize>) -> Result<Config, Box<dyn std::error::Error>> {
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);
    std::fs::create_dir_all(dir)?;
    let mut builder = Config::builder().appender(Appender::builder().build("app", Box::new(rolling(dir, "docsearch", keep)?)));
    builder = if lvl == LevelFilter::Trace {
        builder
            .appender(Appender::builder().build("dev", Box::new(rolling(dir, "dev", keep)?)))
            .logger(Logger::builder().appender("dev").additive(false).build(DEV_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
    };
    Ok(builder.build(Root::builder().appender("app").build(lvl))?)
}

/// Configures process-wide logging.
/// - dir: log directory; current directory when `None`
/// - level: off|error|warn|info|debug|trace
/// - retention: rolled files to keep (default 7)
///
/// # Errors
/// Returns an error when the configuration cannot be built or a logger is
/// already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult {
    let base = dir.map_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")), PathBuf::from);
    let config = build_config(&base, level, retention)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from `DOCSEARCH_LOG_DIR`, `DOCSEARCH_LOG_LEVEL` and
/// `DOCSEARCH_LOG_RETENTION`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> LogResult {
    let dir = std::env::var(ENV_LOG_DIR).ok().map(PathBuf::from);
    let level = std::env::var(ENV_LOG_LEVEL).ok();
    let retention = std::env::var(ENV_LOG_RETENTION).ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level(Some("TRACE")), LevelFilter::Trace);
        assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let config = build_config(&logs, Some("trace"), Some(2)).unwrap();
        assert!(logs.is_dir());
        assert_eq!(config.appenders().len(), 2);
        let config = build_config(&logs, Some("info"), None).unwrap();
        assert_eq!(config.appenders().len(), 1);
    }

    #[test]
    fn init_path_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_path(&dir.path().join("absent.yaml")).is_err());
    }
}
