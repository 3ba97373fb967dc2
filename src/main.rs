//! Vivalink CLI - file manager for the Viiiiva heart rate monitor.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{Local, TimeZone};
use clap::Parser;
use colored::Colorize;

use vivalink::cli::{Cli, ClockArgs, Commands, CopyArgs, EraseArgs, ListArgs};
use vivalink::config::{init_logging, LoggingConfig, Preferences};
use vivalink::error::{Error, Result, TransportError};
use vivalink::transport::{Session, TransportConfig};
use vivalink::types::{self, DirectoryEntry};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    let log_config = LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
    };
    if let Err(err) = init_logging(&log_config) {
        eprintln!("{err}");
        std::process::exit(2);
    }

    if let Err(err) = run(cli).await {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let prefs_path = cli
        .config
        .clone()
        .unwrap_or_else(Preferences::default_path);
    let mut prefs = Preferences::load(&prefs_path)?;

    let mut transport_config = TransportConfig {
        scan_timeout: Duration::from_secs(cli.scan_timeout),
        device: cli.device.clone().or_else(|| prefs.last_device.clone()),
        ..Default::default()
    };

    let mut session = match Session::connect(&transport_config).await {
        Ok(session) => session,
        // A remembered device may be gone; rescan for any Viiiiva unless the
        // user asked for a specific one.
        Err(Error::Transport(TransportError::DeviceNotFound))
            if cli.device.is_none() && prefs.last_device.is_some() =>
        {
            transport_config.device = None;
            Session::connect(&transport_config).await?
        }
        Err(err) => return Err(err),
    };

    let device_id = session.device_id();
    if prefs.last_device.as_deref() != Some(device_id.as_str()) {
        prefs.last_device = Some(device_id);
        prefs.save(&prefs_path)?;
    }

    let result = match cli.command {
        Commands::List(args) => run_list(&mut session, &args).await,
        Commands::Copy(args) => run_copy(&mut session, &args).await,
        Commands::Erase(args) => run_erase(&mut session, &args).await,
        Commands::Clock(args) => run_clock(&mut session, &args).await,
    };
    let disconnect = session.disconnect().await;
    result.and(disconnect)
}

async fn run_list(session: &mut Session, args: &ListArgs) -> Result<()> {
    let (clock, entries) = session.list_directory().await?;

    if args.clock {
        println!("{} {}", "device clock:".bold(), format_time(clock));
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &DirectoryEntry) {
    let file_name = entry.file_name();
    let name = match entry.file_type {
        vivalink::FileType::FitActivity => file_name.as_str().green().to_string(),
        _ => file_name,
    };
    println!(
        "{name}  {:>8}  {:>8}  {}",
        entry.length,
        entry.file_type.to_string(),
        format_time(entry.posix_time)
    );
}

async fn run_copy(session: &mut Session, args: &CopyArgs) -> Result<()> {
    let index = parse_name(&args.name)?;
    let data = session.download_file(index).await?;

    if args.dest == Path::new("-") {
        std::io::stdout().write_all(&data)?;
    } else {
        std::fs::write(&args.dest, &data)?;
        println!(
            "{} -> {} ({} bytes)",
            args.name,
            args.dest.display(),
            data.len()
        );
    }
    Ok(())
}

async fn run_erase(session: &mut Session, args: &EraseArgs) -> Result<()> {
    let index = parse_name(&args.name)?;
    if session.erase_file(index).await? {
        println!("erased {}", args.name);
        Ok(())
    } else {
        Err(Error::DeviceFailure(format!(
            "device refused to erase {}",
            args.name
        )))
    }
}

async fn run_clock(session: &mut Session, args: &ClockArgs) -> Result<()> {
    if args.set {
        if !session.set_time_now().await? {
            return Err(Error::DeviceFailure("device did not accept the clock".into()));
        }
        println!("device clock set");
    } else {
        let (clock, _) = session.list_directory().await?;
        println!("{}", format_time(clock));
    }
    Ok(())
}

fn parse_name(name: &str) -> Result<u16> {
    types::parse_file_name(name).ok_or_else(|| Error::InvalidFileName(name.to_string()))
}

fn format_time(posix_time: i64) -> String {
    match Local.timestamp_opt(posix_time, 0) {
        chrono::LocalResult::Single(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("@{posix_time}"),
    }
}
