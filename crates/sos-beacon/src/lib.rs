//! `sos-beacon` - Shake-triggered emergency alerting
//!
//! This library keeps a device's emergency contacts and profile, turns a shake
//! or a cancellable countdown into an SOS sent to every contact, and records
//! alerts and motion samples in append-only JSON logs served over HTTP.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod append_log;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod countdown;
pub mod dispatch;
pub mod error;
pub mod location;
pub mod logging;
pub mod model;
pub mod motion;
pub mod opener;
pub mod server;
pub mod sink;
pub mod store;
pub mod ui;

pub use append_log::AppendLog;
pub use config::Config;
pub use contacts::{ContactBook, SharedContactBook};
pub use countdown::{Countdown, CountdownState, StartOutcome};
pub use dispatch::{AlertDispatcher, DispatchReport};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Contact, Location, MotionSample, SosRecord, Trigger, UserProfile};
pub use motion::{AccelerationReading, MonitorHandle, MotionAccess, MotionMonitor, ShakeEvent};
pub use store::Store;
pub use ui::{ConsoleUi, Ui};

/// Crate version reported by the server.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
