//! Shake detection over a stream of acceleration readings.
//!
//! [`MotionMonitor::observe`] holds the detection rules and is pure apart from
//! its debounce clock. [`MotionMonitor::run`] drives it from a channel, logs
//! samples above the noise floor and forwards shake events.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MotionConfig;
use crate::error::{Error, Result};
use crate::model::{format_reading, MotionSample};
use crate::sink::AlertLog;
use crate::ui::Ui;

/// Question asked before the monitor reads any sensor.
pub const ACCESS_PROMPT: &str = "Allow access to motion sensors?";

/// Warning shown when access is refused.
pub const ACCESS_DENIED: &str = "Permission denied. Please allow motion access in settings.";

/// One accelerometer reading including gravity, in m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationReading {
    /// X axis.
    pub x: f64,
    /// Y axis.
    pub y: f64,
    /// Z axis.
    pub z: f64,
}

impl AccelerationReading {
    /// Create a reading.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the three axes.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Parses `x y z`, separated by whitespace or commas.
impl FromStr for AccelerationReading {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidReading {
            input: s.to_string(),
        };

        let axes = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        match axes.as_slice() {
            [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => {
                Ok(Self::new(*x, *y, *z))
            }
            _ => Err(invalid()),
        }
    }
}

/// Whether the monitor may read the sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAccess {
    /// Readings may be taken.
    Granted,
    /// The user refused; the monitor stays inactive.
    Denied,
}

impl MotionAccess {
    /// Ask the user once. A refusal is reported on the front end.
    pub fn request(ui: &dyn Ui) -> Self {
        if ui.confirm(ACCESS_PROMPT) {
            Self::Granted
        } else {
            ui.warn(ACCESS_DENIED);
            Self::Denied
        }
    }
}

impl fmt::Display for MotionAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// A detected shake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    /// Magnitude of the reading that crossed the threshold.
    pub intensity: f64,
    /// When it was observed.
    pub at: DateTime<Utc>,
}

/// What one reading produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Magnitude of the reading.
    pub magnitude: f64,
    /// Sample to log, when above the noise floor.
    pub sample: Option<MotionSample>,
    /// Shake event, when above the threshold and outside the debounce window.
    pub shake: Option<ShakeEvent>,
}

/// Status of a motion monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    /// Whether readings are being processed.
    pub is_running: bool,
    /// Sensor access.
    pub access: MotionAccess,
    /// Samples above the noise floor.
    pub samples_logged: u64,
    /// Shake events raised.
    pub shakes_detected: u64,
    /// Human-readable status message.
    pub message: String,
}

impl MonitorStatus {
    fn running(samples_logged: u64, shakes_detected: u64) -> Self {
        Self {
            is_running: true,
            access: MotionAccess::Granted,
            samples_logged,
            shakes_detected,
            message: "✅ Motion sensors active. Shake to trigger SOS.".to_string(),
        }
    }

    fn stopped(samples_logged: u64, shakes_detected: u64) -> Self {
        Self {
            is_running: false,
            access: MotionAccess::Granted,
            samples_logged,
            shakes_detected,
            message: "Motion monitor stopped".to_string(),
        }
    }

    fn denied() -> Self {
        Self {
            is_running: false,
            access: MotionAccess::Denied,
            samples_logged: 0,
            shakes_detected: 0,
            message: ACCESS_DENIED.to_string(),
        }
    }
}

/// A cloneable handle that stops a running monitor.
#[derive(Debug, Clone, Default)]
pub struct MonitorHandle {
    stop_signal: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl MonitorHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the monitor to stop.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        while !self.should_stop() {
            self.wake.notified().await;
        }
    }
}

/// Turns acceleration readings into logged samples and shake events.
#[derive(Debug, Clone)]
pub struct MotionMonitor {
    noise_floor: f64,
    threshold: f64,
    debounce: Duration,
    last_shake: Option<Instant>,
    samples_logged: u64,
    shakes_detected: u64,
}

impl MotionMonitor {
    /// Create a monitor with the configured thresholds.
    #[must_use]
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            noise_floor: config.noise_floor,
            threshold: config.shake_threshold,
            debounce: Duration::from_millis(config.debounce_ms),
            last_shake: None,
            samples_logged: 0,
            shakes_detected: 0,
        }
    }

    /// Current counters as a running status.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        MonitorStatus::running(self.samples_logged, self.shakes_detected)
    }

    /// Apply the detection rules to one reading taken at `now`.
    ///
    /// Both comparisons are strict. A shake less than the debounce window
    /// after the previous one is ignored but its sample is still logged.
    pub fn observe(&mut self, reading: AccelerationReading, now: Instant) -> Observation {
        let magnitude = reading.magnitude();
        let at = Utc::now();

        let sample = (magnitude > self.noise_floor).then(|| {
            self.samples_logged += 1;
            MotionSample::new(magnitude, reading.x, reading.y, reading.z, at)
        });

        let outside_window = self
            .last_shake
            .map_or(true, |last| now.duration_since(last) >= self.debounce);

        let shake = (magnitude > self.threshold && outside_window).then(|| {
            self.last_shake = Some(now);
            self.shakes_detected += 1;
            ShakeEvent {
                intensity: magnitude,
                at,
            }
        });

        Observation {
            magnitude,
            sample,
            shake,
        }
    }

    /// Process readings until the channel closes or `handle` is stopped.
    ///
    /// Shake events go to `shakes` before the sample is logged. A shake that
    /// arrives while `shakes` is full is dropped, so a slow consumer never
    /// stalls sample logging. Logging is best-effort. Returns the final status.
    ///
    /// # Errors
    ///
    /// Returns a permission error without reading anything if `access` was
    /// denied.
    pub async fn run(
        mut self,
        access: MotionAccess,
        mut readings: mpsc::Receiver<AccelerationReading>,
        log: Arc<dyn AlertLog>,
        shakes: mpsc::Sender<ShakeEvent>,
        handle: MonitorHandle,
    ) -> Result<MonitorStatus> {
        if access == MotionAccess::Denied {
            warn!("Motion access denied, monitor inactive");
            return Err(Error::permission_missing(
                "Motion sensors",
                "Please allow motion access in settings.",
            ));
        }

        info!(
            noise_floor = self.noise_floor,
            threshold = self.threshold,
            "Motion monitor started"
        );

        loop {
            let reading = tokio::select! {
                () = handle.stopped() => break,
                reading = readings.recv() => match reading {
                    Some(reading) => reading,
                    None => break,
                },
            };

            let observation = self.observe(reading, Instant::now());

            if let Some(event) = observation.shake {
                info!(intensity = %format_reading(event.intensity), "Shake detected");
                match shakes.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!("Previous shake still being handled, dropping this one");
                    }
                    Err(TrySendError::Closed(_)) => debug!("Shake receiver dropped"),
                }
            }

            if let Some(sample) = observation.sample {
                if let Err(e) = log.record_motion(&sample).await {
                    debug!(error = %e, "Motion sample not logged");
                }
            }
        }

        info!(
            samples = self.samples_logged,
            shakes = self.shakes_detected,
            "Motion monitor stopped"
        );
        Ok(MonitorStatus::stopped(
            self.samples_logged,
            self.shakes_detected,
        ))
    }

    /// The status reported for a denied monitor.
    #[must_use]
    pub fn denied_status() -> MonitorStatus {
        MonitorStatus::denied()
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`;
/// malformed lines are reported and also yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<AccelerationReading> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.parse() {
        Ok(reading) => Some(reading),
        Err(e) => {
            warn!(error = %e, "Skipping reading");
            None
        }
    }
}

/// Read `x y z` lines from `reader` into `tx` until end of input.
///
/// Returns the number of readings sent.
///
/// # Errors
///
/// Returns an error if reading fails.
pub async fn feed_lines<R>(reader: R, tx: mpsc::Sender<AccelerationReading>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;

    while let Some(line) = lines.next_line().await? {
        let Some(reading) = parse_line(&line) else {
            continue;
        };
        if tx.send(reading).await.is_err() {
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::MemoryLog;
    use crate::ui::testing::RecordingUi;

    fn monitor() -> MotionMonitor {
        MotionMonitor::new(&MotionConfig::default())
    }

    fn reading_of(magnitude: f64) -> AccelerationReading {
        AccelerationReading::new(0.0, 0.0, magnitude)
    }

    #[test]
    fn test_magnitude() {
        assert!((AccelerationReading::new(3.0, 4.0, 12.0).magnitude() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_reading() {
        let reading: AccelerationReading = "1.5 -2 9.81".parse().unwrap();
        assert_eq!(reading, AccelerationReading::new(1.5, -2.0, 9.81));

        let reading: AccelerationReading = "1,2, 3".parse().unwrap();
        assert_eq!(reading, AccelerationReading::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for input in ["", "1 2", "1 2 3 4", "1 two 3", "1 2 NaN", "1 2 inf"] {
            let err = input.parse::<AccelerationReading>().unwrap_err();
            assert!(matches!(err, Error::InvalidReading { .. }), "{input}");
        }
    }

    #[test]
    fn test_noise_floor_is_strict() {
        let mut monitor = monitor();
        let now = Instant::now();

        assert!(monitor.observe(reading_of(5.0), now).sample.is_none());
        let observation = monitor.observe(reading_of(5.01), now);
        assert_eq!(observation.sample.unwrap().intensity, "5.01");
        assert!(observation.shake.is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut monitor = monitor();
        let now = Instant::now();

        let at_threshold = monitor.observe(reading_of(15.0), now);
        assert!(at_threshold.sample.is_some());
        assert!(at_threshold.shake.is_none());

        let shake = monitor.observe(reading_of(15.5), now).shake.unwrap();
        assert!((shake.intensity - 15.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_debounce_window() {
        let mut monitor = monitor();
        let start = Instant::now();

        assert!(monitor.observe(reading_of(20.0), start).shake.is_some());
        assert!(monitor
            .observe(reading_of(20.0), start + Duration::from_millis(1999))
            .shake
            .is_none());
        assert!(monitor
            .observe(reading_of(20.0), start + Duration::from_millis(2000))
            .shake
            .is_some());
        assert!(monitor
            .observe(reading_of(20.0), start + Duration::from_millis(2500))
            .shake
            .is_none());

        let status = monitor.status();
        assert_eq!(status.shakes_detected, 2);
        assert_eq!(status.samples_logged, 4);
    }

    #[test]
    fn test_request_access() {
        let ui = RecordingUi::answering(true);
        assert_eq!(MotionAccess::request(&ui), MotionAccess::Granted);

        let ui = RecordingUi::answering(false);
        assert_eq!(MotionAccess::request(&ui), MotionAccess::Denied);
        assert_eq!(ui.warnings(), vec![ACCESS_DENIED.to_string()]);
    }

    #[tokio::test]
    async fn test_denied_monitor_reads_nothing() {
        let (tx, rx) = mpsc::channel(4);
        let (shake_tx, _shake_rx) = mpsc::channel(4);
        tx.send(reading_of(30.0)).await.unwrap();

        let err = monitor()
            .run(
                MotionAccess::Denied,
                rx,
                Arc::new(MemoryLog::default()),
                shake_tx,
                MonitorHandle::new(),
            )
            .await
            .unwrap_err();

        assert!(err.is_permission_error());
        assert!(!MotionMonitor::denied_status().is_running);
    }

    #[tokio::test]
    async fn test_run_logs_and_forwards() {
        let (tx, rx) = mpsc::channel(16);
        let (shake_tx, mut shake_rx) = mpsc::channel(16);
        let log = Arc::new(MemoryLog::default());

        for magnitude in [1.0, 9.81, 25.0, 26.0] {
            tx.send(reading_of(magnitude)).await.unwrap();
        }
        drop(tx);

        let status = monitor()
            .run(
                MotionAccess::Granted,
                rx,
                log.clone(),
                shake_tx,
                MonitorHandle::new(),
            )
            .await
            .unwrap();

        assert!(!status.is_running);
        assert_eq!(status.samples_logged, 3);
        assert_eq!(status.shakes_detected, 1);
        assert_eq!(log.motion_samples().len(), 3);

        let event = shake_rx.recv().await.unwrap();
        assert!((event.intensity - 25.0).abs() < f64::EPSILON);
        assert!(shake_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_log_failure_is_ignored() {
        let (tx, rx) = mpsc::channel(4);
        let (shake_tx, mut shake_rx) = mpsc::channel(4);
        tx.send(reading_of(20.0)).await.unwrap();
        drop(tx);

        let status = monitor()
            .run(
                MotionAccess::Granted,
                rx,
                Arc::new(MemoryLog::failing()),
                shake_tx,
                MonitorHandle::new(),
            )
            .await
            .unwrap();

        assert_eq!(status.shakes_detected, 1);
        assert!(shake_rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_shake_does_not_stall_sample_logging() {
        crate::logging::init_test_logging();
        let (tx, rx) = mpsc::channel(64);
        let (shake_tx, _shake_rx) = mpsc::channel(1);
        let log = Arc::new(MemoryLog::default());

        let task = tokio::spawn(monitor().run(
            MotionAccess::Granted,
            rx,
            log.clone(),
            shake_tx,
            MonitorHandle::new(),
        ));

        // Nobody drains the shake channel, as during a long dispatch
        for _ in 0..3 {
            tx.send(reading_of(20.0)).await.unwrap();
            for _ in 0..5 {
                tx.send(reading_of(8.0)).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(2100)).await;
        }
        drop(tx);

        let status = tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .expect("monitor stalled on a full shake channel")
            .unwrap()
            .unwrap();

        assert_eq!(status.shakes_detected, 3);
        assert_eq!(status.samples_logged, 18);
        assert_eq!(log.motion_samples().len(), 18);
    }

    #[tokio::test]
    async fn test_handle_stops_idle_monitor() {
        let (_tx, rx) = mpsc::channel(4);
        let (shake_tx, _shake_rx) = mpsc::channel(4);
        let handle = MonitorHandle::new();

        let task = tokio::spawn(monitor().run(
            MotionAccess::Granted,
            rx,
            Arc::new(MemoryLog::default()),
            shake_tx,
            handle.clone(),
        ));

        handle.stop();
        let status = task.await.unwrap().unwrap();
        assert!(!status.is_running);
    }

    #[test]
    fn test_handle_clone_shares_signal() {
        let handle = MonitorHandle::new();
        let other = handle.clone();

        handle.stop();
        assert!(other.should_stop());
    }

    #[tokio::test]
    async fn test_feed_lines() {
        let input = "# header\n0 0 9.81\n\nbad line\n1,2,3\n";
        let (tx, mut rx) = mpsc::channel(8);

        let sent = feed_lines(input.as_bytes(), tx).await.unwrap();

        assert_eq!(sent, 2);
        assert_eq!(rx.recv().await, Some(AccelerationReading::new(0.0, 0.0, 9.81)));
        assert_eq!(rx.recv().await, Some(AccelerationReading::new(1.0, 2.0, 3.0)));
        assert_eq!(rx.recv().await, None);
    }
}
