//! Identity, reboot and port listing command implementations.

use {
    crate::{Cli, config::Config, connect::open_phone},
    anyhow::{Context, Result},
    console::style,
    log::debug,
    s40link::{NativePortEnumerator, PortEnumerator, PortInfo},
};

/// Identify command implementation.
pub(crate) fn cmd_identify(cli: &Cli, config: &mut Config, json: bool) -> Result<()> {
    let phone = open_phone(cli, config)?;
    let identity = phone.identify().context("Failed to query phone identity")?;
    phone.close()?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": identity,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Model:     {}", identity.info.model);
    println!("Firmware:  {}", identity.info.firmware_version);
    println!("Date:      {}", identity.info.firmware_date);
    println!("IMEI:      {}", identity.imei);
    Ok(())
}

/// Reboot command implementation.
pub(crate) fn cmd_reboot(cli: &Cli, config: &mut Config) -> Result<()> {
    let phone = open_phone(cli, config)?;
    phone.reboot().context("Failed to reboot the phone")?;
    if !cli.quiet {
        eprintln!("{} Phone is rebooting", style("✓").green());
    }
    Ok(())
}

/// Bluetooth links first, then by name.
fn sorted_ports(mut ports: Vec<PortInfo>) -> Vec<PortInfo> {
    ports.sort_by(|a, b| b.bluetooth.cmp(&a.bluetooth).then_with(|| a.name.cmp(&b.name)));
    ports
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = sorted_ports(NativePortEnumerator::list_ports().unwrap_or_else(|e| {
        debug!("Port enumeration failed: {e}");
        Vec::new()
    }));

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "ports": ports,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());
    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let kind = if port.bluetooth {
            format!(" [{}]", style("bluetooth").yellow())
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();
        eprintln!("  {} {}{kind}{product}", style("•").green(), style(&port.name).cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_ports_listed_first() {
        let ports = sorted_ports(vec![
            PortInfo {
                name: "/dev/ttyS0".into(),
                bluetooth: false,
                product: None,
            },
            PortInfo {
                name: "/dev/rfcomm1".into(),
                bluetooth: true,
                product: None,
            },
            PortInfo {
                name: "/dev/rfcomm0".into(),
                bluetooth: true,
                product: None,
            },
        ]);
        let names: Vec<_> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["/dev/rfcomm0", "/dev/rfcomm1", "/dev/ttyS0"]);
    }
}
