//! Command-line interface for sos-beacon.
//!
//! This module provides the CLI structure and command handlers for the
//! `sosbeacon` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ContactsCommand, MonitorCommand, ProfileCommand, ProfileFields, ServeCommand,
    SosCommand, StatusCommand,
};

/// sosbeacon - Shake or press to alert your emergency contacts
///
/// Keeps a list of emergency contacts and a short medical profile, sends an
/// SOS with your location to every contact, and runs the alert log server.
#[derive(Debug, Parser)]
#[command(name = "sosbeacon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the alert log server
    Serve(ServeCommand),

    /// Manage emergency contacts
    #[command(subcommand)]
    Contacts(ContactsCommand),

    /// View or edit your profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Send an SOS to all contacts
    Sos(SosCommand),

    /// Watch acceleration readings and send an SOS on a shake
    Monitor(MonitorCommand),

    /// Show contacts, profile and log status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
