use std::io::Write;
use std::str::FromStr;

use chrono::Local;
use log::{LevelFilter, SetLoggerError};

/// Installs env_logger at `level`. `RUST_LOG` still overrides per module.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;
    log::info!("Logging initialized at {}", level);
    Ok(())
}

/// Parses a level name such as `debug`, falling back to `Info`.
pub fn level_from_name(name: &str) -> LevelFilter {
    LevelFilter::from_str(name.trim()).unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(level_from_name("debug"), LevelFilter::Debug);
        assert_eq!(level_from_name(" WARN "), LevelFilter::Warn);
        assert_eq!(level_from_name("off"), LevelFilter::Off);
        assert_eq!(level_from_name("chatty"), LevelFilter::Info);
    }

    #[test]
    fn second_init_is_refused() {
        let _ = init(LevelFilter::Debug);
        assert!(init(LevelFilter::Debug).is_err());
    }
}
