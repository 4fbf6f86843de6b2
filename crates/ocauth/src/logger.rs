use colored::Colorize;
use log::{Level, LevelFilter};
use std::io::Write;

/// Installs the process logger. Engine progress forwarded through
/// [`LogSink`](crate::progress::LogSink) is tagged `engine`.
pub fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter(None, level)
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".purple(),
            };
            if record.target() == crate::progress::ENGINE_TARGET {
                writeln!(buf, "[{}] engine: {}", tag, record.args())
            } else {
                writeln!(buf, "[{}] - {}", tag, record.args())
            }
        })
        .init();
}
