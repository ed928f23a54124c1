//! s40link CLI - file system access for Nokia S40 phones.
//!
//! ## Features
//!
//! - Show phone identity (firmware, model, IMEI)
//! - List directories, recursively or as JSON
//! - Fetch and store files with progress bars
//! - Dump whole directory trees to the host
//! - Delete files and reboot the phone
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;

mod commands;
mod config;
mod connect;

use config::Config;

/// Errors classified for exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing settings.
    #[error("{0}")]
    Usage(String),
    /// Unusable configuration file.
    #[error("{0}")]
    Config(String),
    /// Cancelled by the user.
    #[error("{0}")]
    Cancelled(String),
}

/// Process exit codes.
pub(crate) mod exit_code {
    /// Unexpected failure.
    pub const GENERIC: i32 = 1;
    /// Usage error.
    pub const USAGE: i32 = 2;
    /// Configuration error.
    pub const CONFIG: i32 = 3;
    /// Phone unreachable or link failure.
    pub const DEVICE: i32 = 4;
    /// Remote path missing or of the wrong kind.
    pub const REMOTE_PATH: i32 = 5;
    /// Cancelled.
    pub const CANCELLED: i32 = 130;
}

/// Map an error to its exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => exit_code::USAGE,
                CliError::Config(_) => exit_code::CONFIG,
                CliError::Cancelled(_) => exit_code::CANCELLED,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<s40link::Error>() {
            use s40link::Error as E;
            return match lib_err {
                E::Connect(_)
                | E::Io(_)
                | E::Serial(_)
                | E::Timeout(_)
                | E::Protocol(_)
                | E::SessionClosed
                | E::SessionUnusable => exit_code::DEVICE,
                E::NotFound(_) | E::IsDirectory(_) | E::NotADirectory(_) | E::InvalidPath(_) => {
                    exit_code::REMOTE_PATH
                },
                E::Config(_) => exit_code::CONFIG,
                E::Decode(_) | E::Transfer(_) => exit_code::GENERIC,
            };
        }
    }
    exit_code::GENERIC
}

/// s40link - File system access for Nokia S40 phones over Bluetooth.
///
/// Environment variables:
///   S40LINK_ADDRESS           - Phone Bluetooth address (12 hex digits)
///   S40LINK_CHANNEL           - RFCOMM channel of the phone's file service
///   S40LINK_DEVICE            - Serial device bound to the phone
///   S40LINK_BAUD              - Baud rate for the serial device
///   S40LINK_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "s40link")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Phone Bluetooth address, 12 hex digits without separators.
    #[arg(short, long, global = true, env = "S40LINK_ADDRESS")]
    pub address: Option<String>,

    /// RFCOMM channel of the phone's file service.
    #[arg(
        short,
        long,
        global = true,
        env = "S40LINK_CHANNEL",
        allow_negative_numbers = true
    )]
    pub channel: Option<i32>,

    /// Serial device bound to the phone (e.g. /dev/rfcomm0, COM5).
    #[arg(short, long, global = true, env = "S40LINK_DEVICE")]
    pub device: Option<String>,

    /// Baud rate for the serial device.
    #[arg(short, long, global = true, env = "S40LINK_BAUD")]
    pub baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "S40LINK_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show firmware version, model and IMEI.
    Identify {
        /// Output identity as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Reboot the phone.
    Reboot,

    /// Fetch a file from the phone.
    Get {
        /// Path on the phone (e.g. /c/Ringtones/ring.mid).
        remote: String,

        /// Local file (defaults to the remote file name).
        local: Option<PathBuf>,
    },

    /// Store a file on the phone.
    Put {
        /// Path on the phone.
        remote: String,

        /// Local file (defaults to the remote file name).
        local: Option<PathBuf>,
    },

    /// Delete a file on the phone.
    Delete {
        /// Path on the phone.
        remote: String,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// List a directory on the phone.
    List {
        /// Directory on the phone.
        #[arg(default_value = "/")]
        dir: String,

        /// Descend into sub-directories.
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Output entries as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Copy every file of a directory to the host.
    Dump {
        /// Directory on the phone.
        dir: String,

        /// Descend into sub-directories.
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Host directory to write to.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// List serial ports, Bluetooth links first.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)?
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Identify { json } => commands::device::cmd_identify(cli, &mut config, *json),
        Commands::Reboot => commands::device::cmd_reboot(cli, &mut config),
        Commands::ListPorts { json } => commands::device::cmd_list_ports(*json),
        Commands::Get { remote, local } => {
            commands::files::cmd_get(cli, &mut config, remote, local.as_deref())
        },
        Commands::Put { remote, local } => {
            commands::files::cmd_put(cli, &mut config, remote, local.as_deref())
        },
        Commands::Delete { remote, yes } => {
            commands::files::cmd_delete(cli, &mut config, remote, *yes)
        },
        Commands::List {
            dir,
            recursive,
            json,
        } => commands::listing::cmd_list(cli, &mut config, dir, *recursive, *json),
        Commands::Dump {
            dir,
            recursive,
            output,
        } => commands::listing::cmd_dump(cli, &mut config, dir, *recursive, output),
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

fn main() {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "s40link v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code_for(&err));
    }
}
