//! `sosbeacon` - CLI for sos-beacon
//!
//! This binary manages contacts and profile, sends alerts, feeds the motion
//! monitor and runs the alert log server.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use sos_beacon::cli::{
    Cli, Command, ConfigCommand, ContactsCommand, MonitorCommand, ProfileCommand, ServeCommand,
    SosCommand,
};
use sos_beacon::countdown::{Countdown, StartOutcome};
use sos_beacon::motion::{self, MonitorHandle, MotionAccess, MotionMonitor};
use sos_beacon::ui::profile_status;
use sos_beacon::{
    init_logging, server, sink, AlertDispatcher, AppendLog, Config, ConsoleUi, ContactBook,
    Store, Ui,
};

/// Buffered readings between the input and the monitor.
const READING_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd).await,
        Command::Contacts(cmd) => handle_contacts(&config, cmd),
        Command::Profile(cmd) => handle_profile(&config, cmd),
        Command::Sos(cmd) => handle_sos(&config, &cmd).await,
        Command::Monitor(cmd) => handle_monitor(&config, cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_book(config: &Config, ui: Arc<dyn Ui>) -> anyhow::Result<ContactBook> {
    let path = config.database_path();
    let store = Store::open(&path)
        .with_context(|| format!("opening settings store {}", path.display()))?;

    let mut book = ContactBook::new(store, config.features.clone(), ui);
    book.restore()?;
    Ok(book)
}

fn build_dispatcher(
    config: &Config,
    ui: &Arc<ConsoleUi>,
) -> anyhow::Result<AlertDispatcher> {
    let book = open_book(config, ui.clone())?.into_shared();
    let log = sink::from_config(config)?;
    Ok(AlertDispatcher::new(book, ui.clone(), log, &config.dispatch))
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    if cmd.static_dir.is_some() {
        config.server.static_dir = cmd.static_dir;
    }

    server::serve(&config, server::interrupted(tokio::signal::ctrl_c())).await?;
    Ok(())
}

fn handle_contacts(config: &Config, cmd: ContactsCommand) -> anyhow::Result<()> {
    let assume_yes = matches!(
        cmd,
        ContactsCommand::Remove { yes: true, .. } | ContactsCommand::Reset { yes: true }
    );
    let ui = Arc::new(ConsoleUi::new(assume_yes));
    let mut book = open_book(config, ui.clone())?;

    match cmd {
        ContactsCommand::List => ui.render_contacts(book.contacts()),
        ContactsCommand::Add { name, phone } => {
            book.add_contact(&name, &phone)?;
        }
        ContactsCommand::Remove { index, .. } => match book.remove_contact(index)? {
            Some(contact) => println!("Removed {}", contact.name),
            None => println!("Nothing removed."),
        },
        ContactsCommand::Reset { .. } => {
            if !book.reset_contacts()? {
                println!("Contacts unchanged.");
            }
        }
    }
    Ok(())
}

fn handle_profile(config: &Config, cmd: ProfileCommand) -> anyhow::Result<()> {
    let assume_yes = matches!(cmd, ProfileCommand::Reset { yes: true });
    let ui = Arc::new(ConsoleUi::new(assume_yes));
    let mut book = open_book(config, ui.clone())?;

    match cmd {
        ProfileCommand::Show => ui.render_profile(book.profile()),
        ProfileCommand::Set(fields) => {
            let profile = fields.apply(book.profile());
            book.save_profile(profile)?;
        }
        ProfileCommand::Reset { .. } => {
            if !book.reset_profile()? {
                println!("Profile unchanged.");
            }
        }
    }
    Ok(())
}

async fn handle_sos(config: &Config, cmd: &SosCommand) -> anyhow::Result<()> {
    let ui = Arc::new(ConsoleUi::default());
    let dispatcher = build_dispatcher(config, &ui)?;

    if cmd.now {
        dispatcher.dispatch(None).await;
        return Ok(());
    }

    let countdown = Countdown::new(Arc::new(dispatcher), ui, &config.countdown);
    if countdown.start() != StartOutcome::Started {
        return Ok(());
    }

    tokio::select! {
        () = countdown.wait_idle() => {}
        () = server::interrupted(tokio::signal::ctrl_c()) => {
            // Too late to cancel once the alert is going out
            if !countdown.cancel() {
                countdown.wait_idle().await;
            }
        }
    }
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up exit.
fn feed_stdin(tx: mpsc::Sender<motion::AccelerationReading>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Some(reading) = motion::parse_line(&line) else {
                continue;
            };
            if tx.blocking_send(reading).is_err() {
                break;
            }
        }
    });
}

async fn feed_file(path: PathBuf, tx: mpsc::Sender<motion::AccelerationReading>) {
    match tokio::fs::File::open(&path).await {
        Ok(file) => {
            if let Err(e) = motion::feed_lines(BufReader::new(file), tx).await {
                tracing::error!(path = %path.display(), error = %e, "Reading input failed");
            }
        }
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Cannot open input"),
    }
}

async fn handle_monitor(config: &Config, cmd: MonitorCommand) -> anyhow::Result<()> {
    let ui = Arc::new(ConsoleUi::new(cmd.yes));
    let access = MotionAccess::request(ui.as_ref());
    if access == MotionAccess::Denied {
        println!("Motion monitor inactive. `sosbeacon sos` still works.");
        return Ok(());
    }

    let dispatcher = build_dispatcher(config, &ui)?;
    let log = sink::from_config(config)?;

    let (reading_tx, reading_rx) = mpsc::channel(READING_BUFFER);
    let (shake_tx, mut shake_rx) = mpsc::channel(1);
    let handle = MonitorHandle::new();

    let monitor = MotionMonitor::new(&config.motion);
    ui.status(&monitor.status().message);
    let monitor_task = tokio::spawn(monitor.run(
        access,
        reading_rx,
        log,
        shake_tx,
        handle.clone(),
    ));

    match cmd.input {
        Some(path) => {
            tokio::spawn(feed_file(path, reading_tx));
        }
        None => feed_stdin(reading_tx),
    }

    loop {
        tokio::select! {
            event = shake_rx.recv() => match event {
                Some(event) => {
                    ui.status("🚨 Shake detected! Sending SOS...");
                    dispatcher.dispatch(Some(event.intensity)).await;
                }
                None => break,
            },
            () = server::interrupted(tokio::signal::ctrl_c()) => handle.stop(),
        }
    }

    let status = monitor_task.await??;
    println!(
        "Monitor stopped: {} sample(s) logged, {} shake(s) detected",
        status.samples_logged, status.shakes_detected
    );
    Ok(())
}

/// Entry count of a log, or a short reason it is unavailable.
async fn log_summary(log: &AppendLog) -> serde_json::Value {
    match log.entries().await {
        Ok(entries) => serde_json::json!(entries.len()),
        Err(e) => serde_json::json!(e.to_string()),
    }
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let ui = Arc::new(ConsoleUi::default());
    let book = open_book(config, ui)?;

    let sos_log = AppendLog::new(config.sos_log_path());
    let shake_log = AppendLog::new(config.shake_log_path());
    let sos_entries = log_summary(&sos_log).await;
    let shake_entries = log_summary(&shake_log).await;
    let sink = config
        .dispatch
        .server_url
        .clone()
        .unwrap_or_else(|| "local files".to_string());

    if json {
        let status = serde_json::json!({
            "contacts": book.contacts(),
            "profile": book.profile(),
            "database_path": config.database_path(),
            "alert_log": sink,
            "sos_log": { "path": sos_log.path(), "entries": sos_entries },
            "shake_log": { "path": shake_log.path(), "entries": shake_entries },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("sosbeacon status");
        println!("----------------");
        println!("Contacts:      {}", book.len());
        println!("Profile:       {}", profile_status(book.profile()));
        println!("Database:      {}", config.database_path().display());
        println!("Alert log:     {sink}");
        println!("SOS log:       {} ({sos_entries})", sos_log.path().display());
        println!("Shake log:     {} ({shake_entries})", shake_log.path().display());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Address:            {}:{}", config.server.host, config.server.port);
                println!("  Data directory:     {}", config.data_dir().display());
                println!("  Uploads directory:  {}", config.uploads_dir().display());
                println!();
                println!("[Motion]");
                println!("  Noise floor:        {}", config.motion.noise_floor);
                println!("  Shake threshold:    {}", config.motion.shake_threshold);
                println!("  Debounce (ms):      {}", config.motion.debounce_ms);
                println!();
                println!("[Countdown]");
                println!("  Duration (s):       {}", config.countdown.duration_secs);
                println!();
                println!("[Dispatch]");
                println!(
                    "  Alert log:          {}",
                    config.dispatch.server_url.as_deref().unwrap_or("local files")
                );
                println!("  Open links:         {}", config.dispatch.open_links);
                println!(
                    "  Location timeout:   {} ms",
                    config.dispatch.location_timeout_ms
                );
                println!();
                println!("[Features]");
                println!(
                    "  Default contacts:   {}",
                    config.features.auto_load_default_contacts
                );
                println!(
                    "  Manage contacts:    {}",
                    config.features.allow_contact_management
                );
                println!(
                    "  Edit profile:       {}",
                    config.features.allow_profile_editing
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
