//! Command-line interface for Vivalink.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Vivalink - file manager for the Viiiiva heart rate monitor
#[derive(Parser, Debug)]
#[command(
    name = "vivalink",
    author,
    version,
    about = "File manager for the Viiiiva heart rate monitor",
    long_about = r#"
Vivalink talks to a Viiiiva heart rate monitor over Bluetooth LE and manages
the .FIT activity logs it records while away from a phone.

Files are addressed by the synthetic names shown by `vivalink list`: four hex
digits of the device file index followed by `.fit`.

QUICK START:
  vivalink list
  vivalink copy 0002.fit ride.fit
  vivalink erase 0002.fit
  vivalink clock --set
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Preferences file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Peripheral identifier to connect to, overriding the remembered one
    #[arg(short, long, global = true)]
    pub device: Option<String>,

    /// Seconds to scan for the device before giving up
    #[arg(long, global = true, default_value = "15")]
    pub scan_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the files stored on the device
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Download a file from the device
    #[command(visible_alias = "cp")]
    Copy(CopyArgs),

    /// Erase a file from the device
    #[command(visible_alias = "rm")]
    Erase(EraseArgs),

    /// Read or set the device clock
    Clock(ClockArgs),
}

/// List command arguments
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also print the device clock
    #[arg(long)]
    pub clock: bool,
}

/// Copy command arguments
#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source file name on the device (e.g. 0002.fit)
    pub name: String,

    /// Destination path, or `-` for stdout
    pub dest: PathBuf,
}

/// Erase command arguments
#[derive(Args, Debug)]
pub struct EraseArgs {
    /// File name on the device (e.g. 0002.fit)
    pub name: String,
}

/// Clock command arguments
#[derive(Args, Debug)]
pub struct ClockArgs {
    /// Set the device clock from the host clock instead of reading it
    #[arg(long)]
    pub set: bool,
}
