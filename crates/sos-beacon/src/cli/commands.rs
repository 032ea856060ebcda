//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::model::UserProfile;

/// Server command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind (overrides the configuration)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides the configuration)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of static files to serve
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,
}

/// Emergency contact commands.
#[derive(Debug, Subcommand)]
pub enum ContactsCommand {
    /// List emergency contacts
    List,

    /// Add an emergency contact
    Add {
        /// Contact name
        name: String,

        /// Phone number with country code, e.g. +919876543210
        #[arg(allow_hyphen_values = true)]
        phone: String,
    },

    /// Remove the contact at a position shown by `list`
    Remove {
        /// Position in the list, starting at 0
        index: usize,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace all contacts with the defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the profile
    Show,

    /// Update the profile; omitted fields keep their value
    Set(ProfileFields),

    /// Reset the profile to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Profile fields accepted by `profile set`.
#[derive(Debug, Default, Args)]
pub struct ProfileFields {
    /// Your name as shown in alerts
    #[arg(long)]
    pub name: Option<String>,

    /// Blood type, e.g. O+
    #[arg(long)]
    pub blood_type: Option<String>,

    /// Allergies, conditions or medication
    #[arg(long)]
    pub medical_info: Option<String>,

    /// Note appended to every alert
    #[arg(long)]
    pub note: Option<String>,
}

impl ProfileFields {
    /// Overlay the given fields on `current`.
    #[must_use]
    pub fn apply(self, current: &UserProfile) -> UserProfile {
        UserProfile {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            blood_type: self.blood_type.unwrap_or_else(|| current.blood_type.clone()),
            medical_info: self
                .medical_info
                .unwrap_or_else(|| current.medical_info.clone()),
            emergency_note: self.note.unwrap_or_else(|| current.emergency_note.clone()),
        }
    }
}

/// SOS command arguments.
#[derive(Debug, Args)]
pub struct SosCommand {
    /// Send immediately without the countdown
    #[arg(long)]
    pub now: bool,
}

/// Monitor command arguments.
#[derive(Debug, Args)]
pub struct MonitorCommand {
    /// Read `x y z` lines from this file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Grant motion access without asking
    #[arg(short, long)]
    pub yes: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
