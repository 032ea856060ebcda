//! Where dispatched alerts and motion samples are recorded.
//!
//! The pipeline writes through an [`AlertLog`]. With a server URL configured
//! records are posted to the HTTP server; otherwise they go straight to the
//! local JSON log files. Callers treat every failure here as best-effort.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::append_log::AppendLog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{MotionSample, SosRecord};

/// Request timeout for the remote alert log.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// A destination for alert records.
#[async_trait]
pub trait AlertLog: Send + Sync + std::fmt::Debug {
    /// Record one dispatched alert.
    async fn record_sos(&self, record: &SosRecord) -> Result<()>;

    /// Record one motion sample.
    async fn record_motion(&self, sample: &MotionSample) -> Result<()>;
}

/// Build the alert log selected by the configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(config: &Config) -> Result<Arc<dyn AlertLog>> {
    match &config.dispatch.server_url {
        Some(url) => Ok(Arc::new(HttpAlertLog::new(url)?)),
        None => Ok(Arc::new(LocalAlertLog::from_config(config))),
    }
}

/// Posts records to the alert log server.
#[derive(Debug, Clone)]
pub struct HttpAlertLog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAlertLog {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: serde::Serialize + Sync + ?Sized>(&self, route: &str, body: &T) -> Result<()> {
        let url = format!("{}{route}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote(format!("{url} answered {status}")));
        }
        debug!(%url, "Record posted");
        Ok(())
    }
}

#[async_trait]
impl AlertLog for HttpAlertLog {
    async fn record_sos(&self, record: &SosRecord) -> Result<()> {
        self.post("/sos", record).await
    }

    async fn record_motion(&self, sample: &MotionSample) -> Result<()> {
        self.post("/shake-intensity", sample).await
    }
}

/// Writes records to the local JSON log files.
#[derive(Debug)]
pub struct LocalAlertLog {
    sos: AppendLog,
    motion: AppendLog,
}

impl LocalAlertLog {
    /// Use the given logs.
    #[must_use]
    pub fn new(sos: AppendLog, motion: AppendLog) -> Self {
        Self { sos, motion }
    }

    /// Use the log files named in the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AppendLog::new(config.sos_log_path()),
            AppendLog::bounded(config.shake_log_path(), config.logs.max_motion_entries),
        )
    }
}

#[async_trait]
impl AlertLog for LocalAlertLog {
    async fn record_sos(&self, record: &SosRecord) -> Result<()> {
        self.sos.append(record).await.map(|_| ())
    }

    async fn record_motion(&self, sample: &MotionSample) -> Result<()> {
        self.motion.append(sample).await.map(|_| ())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, UserProfile};
    use chrono::Utc;

    #[test]
    fn test_http_base_url_trims_slash() {
        let log = HttpAlertLog::new("http://localhost:3000/").unwrap();
        assert_eq!(log.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_from_config_selects_sink() {
        let mut config = Config::default();
        let local = from_config(&config).unwrap();
        assert!(format!("{local:?}").contains("LocalAlertLog"));

        config.dispatch.server_url = Some("http://localhost:3000".to_string());
        let remote = from_config(&config).unwrap();
        assert!(format!("{remote:?}").contains("HttpAlertLog"));
    }

    #[tokio::test]
    async fn test_local_log_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.data_dir = Some(dir.path().to_path_buf());
        let log = LocalAlertLog::from_config(&config);

        let record = SosRecord::new(&UserProfile::default(), Location::Unknown, Some(16.0), 2);
        log.record_sos(&record).await.unwrap();
        log.record_motion(&MotionSample::new(6.0, 1.0, 2.0, 5.0, Utc::now()))
            .await
            .unwrap();

        let sos = AppendLog::new(config.sos_log_path()).entries().await.unwrap();
        assert_eq!(sos.len(), 1);
        assert_eq!(sos[0]["triggeredBy"], "Shake Detection");
        assert_eq!(sos[0]["intensity"], "16.00");

        let motion = AppendLog::new(config.shake_log_path()).entries().await.unwrap();
        assert_eq!(motion[0]["intensity"], "6.00");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let log = HttpAlertLog::new("http://127.0.0.1:9").unwrap();
        let record = SosRecord::new(&UserProfile::default(), Location::Unknown, None, 0);

        let err = log.record_sos(&record).await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }
}
