//! Utilities: logging (verbosity-derived level, stderr only).
//!
//! Key items:
//!   init_logging / derive_level

/// Logging helpers.
pub mod logging {
    use tracing_subscriber::EnvFilter;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Warn = 1,
        Debug = 2,
        Trace = 3,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }

        /// Filter directive: our crate at `self`, dependencies at warn.
        /// Quiet mode silences dependencies too.
        pub fn directive(&self) -> String {
            match self {
                LogLevel::Error => "error".to_string(),
                other => format!("warn,{}={}", env!("CARGO_CRATE_NAME"), other.as_str()),
            }
        }
    }

    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Install the global subscriber. `RUST_LOG` wins over `level` when set.
    /// Logs go to stderr so stdout carries only the report.
    pub fn init_logging(level: LogLevel) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directive()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

}

pub use logging::{derive_level, init_logging};
