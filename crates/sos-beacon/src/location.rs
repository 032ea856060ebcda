//! Device location for outgoing alerts.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::model::Location;

/// How fresh and how precise a fix must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    /// How long the caller will wait.
    pub timeout: Duration,
    /// Oldest cached fix accepted; zero demands a fresh one.
    pub max_age: Duration,
    /// Prefer satellite positioning over coarse sources.
    pub high_accuracy: bool,
}

impl LocationRequest {
    /// A fresh, high-accuracy fix within `timeout`.
    #[must_use]
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            timeout,
            max_age: Duration::ZERO,
            high_accuracy: true,
        }
    }
}

/// A source of position fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync + std::fmt::Debug {
    /// Get the current position.
    ///
    /// The caller enforces `request.timeout`; implementations may also honour
    /// it themselves.
    async fn current(&self, request: LocationRequest) -> Result<Location>;
}

/// Reports a position set in the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLocation {
    latitude: f64,
    longitude: f64,
}

impl FixedLocation {
    /// Always report the given coordinates.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current(&self, _request: LocationRequest) -> Result<Location> {
        Ok(Location::Known {
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Used when the device has no way to locate itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current(&self, _request: LocationRequest) -> Result<Location> {
        Err(Error::internal("no location source configured"))
    }
}

/// Pick the provider for the configured coordinates.
#[must_use]
pub fn from_config(dispatch: &DispatchConfig) -> Box<dyn LocationProvider> {
    match (dispatch.latitude, dispatch.longitude) {
        (Some(latitude), Some(longitude)) => Box::new(FixedLocation::new(latitude, longitude)),
        _ => Box::new(NoLocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let provider = FixedLocation::new(12.97, 77.59);
        let location = provider
            .current(LocationRequest::fresh(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(location.to_string(), "12.97,77.59");
    }

    #[tokio::test]
    async fn test_no_location_fails() {
        let result = NoLocation
            .current(LocationRequest::fresh(Duration::from_secs(5)))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_fresh_request() {
        let request = LocationRequest::fresh(Duration::from_secs(5));
        assert_eq!(request.max_age, Duration::ZERO);
        assert!(request.high_accuracy);
    }

    #[test]
    fn test_from_config() {
        let mut dispatch = DispatchConfig::default();
        assert!(format!("{:?}", from_config(&dispatch)).contains("NoLocation"));

        dispatch.latitude = Some(1.0);
        dispatch.longitude = Some(2.0);
        assert!(format!("{:?}", from_config(&dispatch)).contains("FixedLocation"));
    }
}
