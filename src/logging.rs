// Logger installation
// Two targets: stderr (stdout carries the wire protocol) and a log file in the
// platform data directory. Trace records carry input contents and never reach
// the file.

use crate::util::settings::APP_DIR_NAME;
use log::LevelFilter;
use std::path::PathBuf;

/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV: &str = "KEYBOARD_PLAYGROUND_LOG";

pub const LOG_FILE_NAME: &str = "keyboard-playground.log";

/// Directory for the log file
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME).join("logs"))
}

/// Effective level: environment, then settings, then build profile default
pub fn resolve_level(env_value: Option<&str>, configured: Option<LevelFilter>) -> LevelFilter {
    env_value
        .and_then(|v| v.parse().ok())
        .or(configured)
        .unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}

/// Level of the file target: never more verbose than debug
pub fn file_level(level: LevelFilter) -> LevelFilter {
    level.min(LevelFilter::Debug)
}

/// Install the global logger. Failing to open the log file only drops that target.
pub fn init(configured: Option<LevelFilter>) -> Result<(), log::SetLoggerError> {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    let level = resolve_level(env_value.as_deref(), configured);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    let mut file_error = None;
    if let Some(dir) = log_dir() {
        let file = std::fs::create_dir_all(&dir)
            .and_then(|_| fern::log_file(dir.join(LOG_FILE_NAME)));
        match file {
            Ok(file) => {
                dispatch = dispatch.chain(fern::Dispatch::new().level(file_level(level)).chain(file))
            }
            Err(e) => file_error = Some(e),
        }
    }

    dispatch.apply()?;
    if let Some(e) = file_error {
        crate::warn!("Logging to stderr only, log file unavailable: {}", e);
    }
    crate::debug!("Logger initialized at {}", level);
    Ok(())
}
