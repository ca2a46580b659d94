use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

pub mod draw_tree;
pub mod run;
pub mod select;

/// Installs the terminal logger.
///
/// Only the first call has an effect.
pub fn init_logging(log_level: LevelFilter) {
    if TermLogger::init(
        log_level,
        Default::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        log::debug!("Logger was already initialised");
    }
}
