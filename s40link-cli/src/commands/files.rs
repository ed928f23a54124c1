//! Get, put and delete command implementations.

use {
    super::{byte_progress, remote_file_name},
    crate::{Cli, CliError, config::Config, connect::open_phone},
    anyhow::{Context, Result},
    console::style,
    dialoguer::{Confirm, theme::ColorfulTheme},
    std::{
        fs::File,
        io::{BufReader, IsTerminal},
        path::{Path, PathBuf},
    },
};

/// Local path for a remote file when none is given.
fn default_local(remote: &str, local: Option<&Path>) -> Result<PathBuf> {
    match local {
        Some(path) => Ok(path.to_path_buf()),
        None => remote_file_name(remote)
            .map(PathBuf::from)
            .ok_or_else(|| CliError::Usage(format!("'{remote}' does not name a file")).into()),
    }
}

/// Get command implementation.
pub(crate) fn cmd_get(
    cli: &Cli,
    config: &mut Config,
    remote: &str,
    local: Option<&Path>,
) -> Result<()> {
    let target = default_local(remote, local)?;
    let phone = open_phone(cli, config)?;

    let pb = byte_progress(cli.quiet, 0);
    pb.set_message(remote.to_string());
    let info = phone
        .get_to_file(remote, &target, &mut |done, total| {
            pb.set_length(total);
            pb.set_position(done);
        })
        .with_context(|| format!("Failed to fetch {remote}"))?;
    pb.finish_and_clear();
    phone.close()?;

    if !cli.quiet {
        eprintln!(
            "{} {} -> {} ({} bytes)",
            style("✓").green(),
            remote,
            target.display(),
            info.size
        );
    }
    Ok(())
}

/// Put command implementation.
pub(crate) fn cmd_put(
    cli: &Cli,
    config: &mut Config,
    remote: &str,
    local: Option<&Path>,
) -> Result<()> {
    let source_path = default_local(remote, local)?;
    let file = File::open(&source_path)
        .with_context(|| format!("Failed to open {}", source_path.display()))?;
    let total = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut source = BufReader::new(file);

    let phone = open_phone(cli, config)?;
    let pb = byte_progress(cli.quiet, total);
    pb.set_message(remote.to_string());
    let written = phone
        .put(remote, &mut source, &mut |done| pb.set_position(done))
        .with_context(|| format!("Failed to store {remote}"))?;
    pb.finish_and_clear();
    phone.close()?;

    if !cli.quiet {
        eprintln!(
            "{} {} -> {} ({written} bytes)",
            style("✓").green(),
            source_path.display(),
            remote
        );
    }
    Ok(())
}

/// Ask before deleting unless told not to.
fn confirm_delete(cli: &Cli, remote: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if cli.non_interactive || !std::io::stdin().is_terminal() {
        return Err(CliError::Usage(format!(
            "refusing to delete {remote} without confirmation; pass --yes"
        ))
        .into());
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete {remote} on the phone?"))
        .default(false)
        .interact_opt()
        .map_err(|e| CliError::Usage(format!("prompt failed: {e}")))?
        .unwrap_or(false);
    Ok(confirmed)
}

/// Delete command implementation.
pub(crate) fn cmd_delete(cli: &Cli, config: &mut Config, remote: &str, yes: bool) -> Result<()> {
    if !confirm_delete(cli, remote, yes)? {
        return Err(CliError::Cancelled("delete cancelled".into()).into());
    }

    let phone = open_phone(cli, config)?;
    phone
        .delete(remote)
        .with_context(|| format!("Failed to delete {remote}"))?;
    phone.close()?;

    if !cli.quiet {
        eprintln!("{} Deleted {remote}", style("✓").green());
    }
    Ok(())
}
