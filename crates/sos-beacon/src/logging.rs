//! Diagnostic output for `sosbeacon`.
//!
//! Log lines go to stderr so they never mix with command output on stdout.
//! User-facing status text goes through [`crate::ui::Ui`], not through here.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much diagnostic detail to print, chosen by `-q` and `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Dispatch and server milestones.
    #[default]
    Normal,
    /// Adds dropped samples, skipped links and store access.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Most detailed level shown.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG`, when set, replaces the directives derived from `verbosity`.
/// Later calls are ignored.
///
/// # Examples
///
/// ```no_run
/// use sos_beacon::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        );

    let _ = subscriber.try_init();
}

/// Filter directives used when `RUST_LOG` is unset.
///
/// Request traces from `tower_http` follow the crate's own level.
fn default_directives(verbosity: Verbosity) -> String {
    let level = verbosity.to_level_filter();
    format!("sos_beacon={level},tower_http={level}")
}

/// Route warnings from code under test into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
