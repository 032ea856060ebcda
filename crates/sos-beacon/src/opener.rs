//! Opening outbound messaging links.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::DispatchConfig;

#[cfg(target_os = "macos")]
const DEFAULT_OPEN_COMMAND: &str = "open";
#[cfg(target_os = "windows")]
const DEFAULT_OPEN_COMMAND: &str = "explorer";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const DEFAULT_OPEN_COMMAND: &str = "xdg-open";

/// Result of trying to open one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The link was handed to a handler.
    Opened,
    /// The environment refused to open the link.
    Blocked(String),
    /// Opening is left to the user.
    Manual,
}

/// Something that can open a URL for the user.
#[async_trait]
pub trait LinkOpener: Send + Sync + std::fmt::Debug {
    /// Try to open `url`. Never fails; refusal is reported in the outcome.
    async fn open(&self, url: &str) -> OpenOutcome;
}

/// Opens links with a desktop handler program.
#[derive(Debug, Clone)]
pub struct CommandOpener {
    program: String,
}

impl CommandOpener {
    /// Use `program`, which is run with the URL as its only argument.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The platform's default handler.
    #[must_use]
    pub fn system() -> Self {
        Self::new(DEFAULT_OPEN_COMMAND)
    }

    /// Program that is run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl LinkOpener for CommandOpener {
    async fn open(&self, url: &str) -> OpenOutcome {
        let status = Command::new(&self.program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => OpenOutcome::Opened,
            Ok(status) => OpenOutcome::Blocked(format!("{} exited with {status}", self.program)),
            Err(e) => OpenOutcome::Blocked(format!("{} failed to start: {e}", self.program)),
        }
    }
}

/// Leaves every link for the user to open from the fallback list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualOpener;

#[async_trait]
impl LinkOpener for ManualOpener {
    async fn open(&self, url: &str) -> OpenOutcome {
        debug!(url, "Link left for manual opening");
        OpenOutcome::Manual
    }
}

/// Pick the opener for the dispatch settings.
#[must_use]
pub fn from_config(dispatch: &DispatchConfig) -> Box<dyn LinkOpener> {
    if !dispatch.open_links {
        return Box::new(ManualOpener);
    }
    match &dispatch.open_command {
        Some(program) => Box::new(CommandOpener::new(program.clone())),
        None => Box::new(CommandOpener::system()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut dispatch = DispatchConfig::default();
        let system = CommandOpener::system();
        assert!(format!("{:?}", from_config(&dispatch)).contains(system.program()));

        dispatch.open_command = Some("firefox".to_string());
        assert!(format!("{:?}", from_config(&dispatch)).contains("firefox"));

        dispatch.open_links = false;
        assert!(format!("{:?}", from_config(&dispatch)).contains("ManualOpener"));
    }

    #[test]
    fn test_system_opener_has_program() {
        assert!(!CommandOpener::system().program().is_empty());
    }

    #[tokio::test]
    async fn test_manual_opener() {
        assert_eq!(ManualOpener.open("https://wa.me/1").await, OpenOutcome::Manual);
    }

    #[tokio::test]
    async fn test_missing_program_is_blocked() {
        let opener = CommandOpener::new("/nonexistent/sos-beacon-opener");
        let outcome = opener.open("https://wa.me/1").await;
        assert!(matches!(outcome, OpenOutcome::Blocked(reason) if reason.contains("failed to start")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status() {
        assert_eq!(CommandOpener::new("true").open("x").await, OpenOutcome::Opened);
        assert!(matches!(
            CommandOpener::new("false").open("x").await,
            OpenOutcome::Blocked(_)
        ));
    }
}
