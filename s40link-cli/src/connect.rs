//! Resolving the phone connection from flags, environment and config.
//!
//! The phone's RFCOMM channel has to be bound to a host serial device
//! before s40link can use it. When no device is configured the Bluetooth
//! serial ports the OS reports are offered for selection:
//! - Exactly one Bluetooth port is used directly
//! - Several ports are offered interactively via dialoguer
//! - Non-interactive mode fails instead of prompting

use {
    crate::{Cli, CliError, config::Config},
    anyhow::{Context, Result},
    console::style,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, error},
    s40link::{
        NativePort, NativePortEnumerator, Phone, PortEnumerator, PortInfo, SerialConfig,
        SerialConnector, Session,
    },
    std::io::IsTerminal,
};

/// Default baud rate for opening the serial device.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Phone hardware address.
    pub address: String,
    /// RFCOMM channel.
    pub channel: i32,
    /// Serial device, if one is configured.
    pub device: Option<String>,
    /// Baud rate.
    pub baud: u32,
}

impl ConnectionSettings {
    /// Combine flags (which already include `S40LINK_*` variables) with the
    /// configuration files.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let conn = &config.connection;
        let address = cli
            .address
            .clone()
            .or_else(|| conn.address.clone())
            .ok_or_else(|| {
                CliError::Usage(
                    "no phone address given; use --address or set connection.address".into(),
                )
            })?;
        let channel = cli.channel.or(conn.channel).ok_or_else(|| {
            CliError::Usage(
                "no channel given; use --channel or set connection.channel".into(),
            )
        })?;

        Ok(Self {
            address,
            channel,
            device: cli.device.clone().or_else(|| conn.device.clone()),
            baud: cli.baud.or(conn.baud).unwrap_or(DEFAULT_BAUD),
        })
    }
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("device selection cancelled".into()).into()
            } else {
                usage_err("device prompt failed")
            }
        },
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "selecting a device needs a terminal; use --device or set connection.device",
        ))
    }
}

/// Pick a serial device when none is configured.
fn select_device(cli: &Cli, config: &mut Config) -> Result<String> {
    let ports = NativePortEnumerator::bluetooth_ports().unwrap_or_else(|e| {
        debug!("Port enumeration failed: {e}");
        Vec::new()
    });
    choose_device(ports, cli.non_interactive, config)
}

fn choose_device(mut ports: Vec<PortInfo>, non_interactive: bool, config: &mut Config) -> Result<String> {
    match ports.len() {
        0 => Err(usage_err(
            "no Bluetooth serial device found; bind the phone (e.g. rfcomm bind) and pass --device",
        )),
        1 => {
            let port = ports.remove(0);
            debug!("Using the only Bluetooth serial device {}", port.name);
            Ok(port.name)
        },
        _ if non_interactive => Err(usage_err(
            "multiple Bluetooth serial devices found; choose one with --device",
        )),
        _ => {
            ensure_interactive_terminal()?;
            let labels: Vec<String> = ports
                .iter()
                .map(|p| match &p.product {
                    Some(product) => format!("{} - {}", p.name, style(product).dim()),
                    None => p.name.clone(),
                })
                .collect();
            let index = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select the serial device bound to the phone")
                .items(&labels)
                .default(0)
                .interact_opt()
                .map_err(map_prompt_error)?
                .ok_or_else(|| CliError::Cancelled("device selection cancelled".into()))?;
            let device = ports.swap_remove(index).name;

            let remember = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Remember this device in s40link.toml?")
                .default(false)
                .interact_opt()
                .map_err(map_prompt_error)?
                .unwrap_or(false);
            if remember {
                if let Err(e) = config.remember_device(&device) {
                    error!("Failed to save device configuration: {e}");
                }
            }
            Ok(device)
        },
    }
}

/// Connect to the phone and perform the handshake.
pub fn open_phone(cli: &Cli, config: &mut Config) -> Result<Phone<NativePort>> {
    let settings = ConnectionSettings::resolve(cli, config)?;
    let device = match settings.device.clone() {
        Some(device) => device,
        None => select_device(cli, config)?,
    };

    if !cli.quiet {
        eprintln!(
            "{} Connecting to {} (channel {}) via {}",
            style("→").cyan(),
            style(&settings.address).bold(),
            settings.channel,
            style(&device).cyan()
        );
    }

    let connector = SerialConnector::new(SerialConfig::new(device, settings.baud));
    let session = Session::open_with_config(
        &settings.address,
        settings.channel,
        &connector,
        &config.session_config(),
    )
    .context("Failed to connect to the phone")?;

    Ok(Phone::new(session))
}
