//! User-facing surface of the alert pipeline.
//!
//! The contact book, countdown and dispatcher never print directly. They report
//! through a [`Ui`], so the same pipeline can drive a terminal, a test recorder
//! or any other front end.

use std::io::{self, BufRead, Write};

use crate::model::{Contact, UserProfile};

/// A messaging link prepared for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLink {
    /// Contact name.
    pub name: String,
    /// Contact phone as entered.
    pub phone: String,
    /// The outbound link.
    pub url: String,
    /// Whether the link was opened automatically.
    pub opened: bool,
}

/// What the pipeline needs from a front end.
pub trait Ui: Send + Sync + std::fmt::Debug {
    /// Show a progress or result message.
    fn status(&self, message: &str);

    /// Show a warning the user should act on.
    fn warn(&self, message: &str);

    /// Ask a yes/no question.
    fn confirm(&self, question: &str) -> bool;

    /// Show the remaining countdown.
    fn countdown(&self, remaining: u32);

    /// Show the contact list.
    fn render_contacts(&self, contacts: &[Contact]);

    /// Show the profile.
    fn render_profile(&self, profile: &UserProfile);

    /// Offer links for manual opening after a dispatch.
    fn show_links(&self, links: &[ContactLink]);
}

/// Text shown for an empty contact list.
pub const NO_CONTACTS_TEXT: &str = "No emergency contacts added yet";

/// One-line profile status.
#[must_use]
pub fn profile_status(profile: &UserProfile) -> String {
    if profile.has_name() {
        format!("Profile saved as: {}", profile.name)
    } else {
        "Profile not set - please add your name".to_string()
    }
}

/// Terminal front end.
///
/// Status goes to stdout and warnings to stderr. With `assume_yes` every
/// confirmation is answered yes without prompting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleUi {
    assume_yes: bool,
}

impl ConsoleUi {
    /// Create a console front end.
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Ui for ConsoleUi {
    fn status(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        print!("{question} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn countdown(&self, remaining: u32) {
        println!("Sending SOS in {remaining}... (Ctrl-C to cancel)");
    }

    fn render_contacts(&self, contacts: &[Contact]) {
        if contacts.is_empty() {
            println!("{NO_CONTACTS_TEXT}");
            return;
        }
        for (index, contact) in contacts.iter().enumerate() {
            println!("{index:>3}  {:<20} {}", contact.name, contact.phone);
        }
    }

    fn render_profile(&self, profile: &UserProfile) {
        println!("{}", profile_status(profile));
        println!("  Name:           {}", profile.name);
        println!("  Blood type:     {}", profile.blood_type);
        println!("  Medical info:   {}", profile.medical_info);
        println!("  Emergency note: {}", profile.emergency_note);
    }

    fn show_links(&self, links: &[ContactLink]) {
        if links.is_empty() {
            return;
        }
        println!();
        println!("Open manually if a link did not open:");
        for link in links {
            let label = if link.name.is_empty() {
                &link.phone
            } else {
                &link.name
            };
            println!("  {label}: {}", link.url);
        }
    }
}
