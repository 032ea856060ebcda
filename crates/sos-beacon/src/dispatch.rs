//! Alert composition and fan-out.
//!
//! [`AlertDispatcher::dispatch`] is the one place an SOS leaves the device.
//! It snapshots contacts and profile, waits a bounded time for a location
//! fix, then opens one messaging link per contact concurrently while the
//! alert is recorded. Nothing in here aborts a dispatch: a missing fix becomes
//! `Unknown,Unknown`, a failed log write is logged, and a blocked link is
//! reported for that contact only.

use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::DispatchConfig;
use crate::contacts::SharedContactBook;
use crate::location::{self, LocationProvider, LocationRequest};
use crate::model::{format_reading, Contact, Location, SosRecord, UserProfile};
use crate::opener::{self, LinkOpener, OpenOutcome};
use crate::sink::AlertLog;
use crate::ui::{ContactLink, Ui};

/// First line of every alert.
pub const ALERT_HEADER: &str = "🚨 *EMERGENCY SOS ALERT*";

/// Last line of every alert.
pub const ALERT_FOOTER: &str = "This is an automated emergency alert. Please respond immediately.";

fn non_digits() -> &'static Regex {
    static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
    NON_DIGITS.get_or_init(|| Regex::new(r"[^0-9]").expect("Invalid regex pattern"))
}

/// Strip everything but ASCII digits from a phone number.
#[must_use]
pub fn phone_digits(phone: &str) -> String {
    non_digits().replace_all(phone, "").into_owned()
}

/// Characters left as-is in the `text` parameter. Everything else,
/// including spaces, is percent-encoded.
const TEXT_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build the messaging link for one contact.
///
/// The message travels percent-encoded in the `text` parameter, with spaces
/// as `%20`.
#[must_use]
pub fn messaging_link(base_url: &str, phone: &str, message: &str) -> String {
    let text = utf8_percent_encode(message, TEXT_UNRESERVED);
    format!("{base_url}{}?text={text}", phone_digits(phone))
}

/// Human-readable local time as shown in alerts, e.g. `5/1/2024, 10:00:00 AM`.
#[must_use]
pub fn format_local_time(at: DateTime<Local>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Build the alert text.
///
/// Optional lines appear only when their value is present and non-empty.
#[must_use]
pub fn compose_message(
    profile: &UserProfile,
    map_link: &str,
    intensity: Option<f64>,
    time: &str,
) -> String {
    let mut message = format!("{ALERT_HEADER}\n\n");
    message.push_str(&format!("👤 Name: {}\n", profile.display_name()));
    message.push_str(&format!("📅 Time: {time}\n"));
    message.push_str(&format!("📍 Location: {map_link}\n"));

    if let Some(intensity) = intensity {
        message.push_str(&format!("⚠️ Shake Intensity: {}\n", format_reading(intensity)));
    }
    if !profile.blood_type.is_empty() {
        message.push_str(&format!("🩸 Blood Type: {}\n", profile.blood_type));
    }
    if !profile.medical_info.is_empty() {
        message.push_str(&format!("💊 Medical Info: {}\n", profile.medical_info));
    }
    if !profile.emergency_note.is_empty() {
        message.push_str(&format!("\n📝 Note: {}\n", profile.emergency_note));
    }

    message.push('\n');
    message.push_str(ALERT_FOOTER);
    message
}

/// What one dispatch did.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// Location included in the alert.
    pub location: Location,
    /// The alert text.
    pub message: String,
    /// One link per contact, in contact order.
    pub links: Vec<ContactLink>,
    /// Number of contacts the alert was addressed to.
    pub sent: usize,
    /// Whether the alert reached the alert log.
    pub logged: bool,
}

impl DispatchReport {
    /// Number of links that were actually opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.links.iter().filter(|l| l.opened).count()
    }
}

/// Sends alerts to every contact in the book.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    book: SharedContactBook,
    ui: Arc<dyn Ui>,
    log: Arc<dyn AlertLog>,
    location: Arc<dyn LocationProvider>,
    opener: Arc<dyn LinkOpener>,
    location_timeout: Duration,
    map_url: String,
    messaging_url: String,
}

impl AlertDispatcher {
    /// Create a dispatcher using the location source and link opener
    /// selected by `config`.
    #[must_use]
    pub fn new(
        book: SharedContactBook,
        ui: Arc<dyn Ui>,
        log: Arc<dyn AlertLog>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            book,
            ui,
            log,
            location: Arc::from(location::from_config(config)),
            opener: Arc::from(opener::from_config(config)),
            location_timeout: Duration::from_millis(config.location_timeout_ms),
            map_url: config.map_url.clone(),
            messaging_url: config.messaging_url.clone(),
        }
    }

    /// Replace the location source.
    #[must_use]
    pub fn with_location_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location = provider;
        self
    }

    /// Replace the link opener.
    #[must_use]
    pub fn with_link_opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Number of contacts an alert would go to right now.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.book
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Send an alert to every contact.
    ///
    /// `intensity` is the shake magnitude for motion-triggered alerts and
    /// `None` for manual ones. Not idempotent: every call sends again.
    pub async fn dispatch(&self, intensity: Option<f64>) -> DispatchReport {
        let (contacts, profile) = self.snapshot();
        info!(contacts = contacts.len(), ?intensity, "SOS triggered");

        self.ui.status("📍 Getting location...");
        let location = self.locate().await;

        let map_link = format!("{}{location}", self.map_url);
        let message = compose_message(
            &profile,
            &map_link,
            intensity,
            &format_local_time(Local::now()),
        );

        let sent = contacts.len();
        let record = SosRecord::new(&profile, location, intensity, sent);

        // The log write runs alongside delivery and never delays a link
        let delivery = async {
            self.ui.status(&format!(
                "📤 Sending SOS to {sent} contact(s) with your location..."
            ));
            let links = self.open_links(&contacts, &message).await;

            self.ui.status(&format!(
                "✅ SOS with location sent to {sent} contact(s) via WhatsApp!"
            ));
            self.ui.show_links(&links);
            links
        };
        let (links, logged) = tokio::join!(delivery, self.record(&record));

        DispatchReport {
            location,
            message,
            links,
            sent,
            logged,
        }
    }

    fn snapshot(&self) -> (Vec<Contact>, UserProfile) {
        let book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
        (book.contacts().to_vec(), book.profile().clone())
    }

    async fn record(&self, record: &SosRecord) -> bool {
        match self.log.record_sos(record).await {
            Ok(()) => {
                info!("SOS logged");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to log SOS");
                false
            }
        }
    }

    async fn locate(&self) -> Location {
        let request = LocationRequest::fresh(self.location_timeout);
        match tokio::time::timeout(self.location_timeout, self.location.current(request)).await {
            Ok(Ok(location)) => {
                info!(%location, "Location fetched");
                location
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Location not available");
                Location::Unknown
            }
            Err(_) => {
                warn!(timeout = ?self.location_timeout, "Location request timed out");
                Location::Unknown
            }
        }
    }

    async fn open_links(&self, contacts: &[Contact], message: &str) -> Vec<ContactLink> {
        let mut links: Vec<ContactLink> = contacts
            .iter()
            .map(|contact| ContactLink {
                name: contact.name.clone(),
                phone: contact.phone.clone(),
                url: messaging_link(&self.messaging_url, &contact.phone, message),
                opened: false,
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (index, link) in links.iter().enumerate() {
            let opener = Arc::clone(&self.opener);
            let url = link.url.clone();
            tasks.spawn(async move { (index, opener.open(&url).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Link task failed");
                    continue;
                }
            };
            let link = &mut links[index];
            match outcome {
                OpenOutcome::Opened => {
                    link.opened = true;
                    info!(contact = %link.name, phone = %link.phone, "SOS link opened");
                }
                OpenOutcome::Blocked(reason) => {
                    warn!(contact = %link.name, %reason, "Failed to open link");
                    self.ui.warn(&format!(
                        "Cannot open WhatsApp for {}. Please check popup settings.",
                        link.name
                    ));
                }
                OpenOutcome::Manual => {}
            }
        }

        links
    }
}
