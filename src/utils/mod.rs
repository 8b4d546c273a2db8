// src/utils/mod.rs
use log::info;

pub mod timing;

pub use timing::{format_seconds, Timer};

/// Installs the process-wide logger: `[LEVEL][target] message` on stdout.
pub fn setup_logging(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at {}.", level);
    Ok(())
}
