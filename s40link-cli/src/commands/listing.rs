//! List and dump command implementations.

use {
    crate::{Cli, config::Config, connect::open_phone},
    anyhow::{Context, Result},
    console::style,
    s40link::{DirectoryEntry, EntryKind},
    serde::Serialize,
    std::path::Path,
};

/// One listed entry with its full path.
#[derive(Debug, Serialize)]
struct ListedEntry {
    path: String,
    depth: usize,
    #[serde(flatten)]
    entry: DirectoryEntry,
}

/// One line of human-readable listing output.
fn format_entry(entry: &DirectoryEntry, depth: usize) -> Option<String> {
    let info = entry.info()?;
    let indent = "  ".repeat(depth);
    let (marker, name) = match entry.kind() {
        EntryKind::Directory => ("d", format!("{}/", info.name)),
        _ => ("-", info.name.clone()),
    };
    Some(format!(
        "{marker} {:>10}  {}  {indent}{name}",
        info.size, info.timestamp
    ))
}

/// List command implementation.
pub(crate) fn cmd_list(
    cli: &Cli,
    config: &mut Config,
    dir: &str,
    recursive: bool,
    json: bool,
) -> Result<()> {
    let phone = open_phone(cli, config)?;

    let mut listed = Vec::new();
    phone
        .walk(dir, recursive, &mut |path, depth, entry| {
            listed.push(ListedEntry {
                path: path.to_string(),
                depth,
                entry: entry.clone(),
            });
        })
        .with_context(|| format!("Failed to list {dir}"))?;
    phone.close()?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "dir": dir,
                "entries": listed,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if listed.is_empty() && !cli.quiet {
        eprintln!("  {}", style("(empty)").dim());
    }
    for item in &listed {
        if let Some(line) = format_entry(&item.entry, item.depth) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Dump command implementation.
pub(crate) fn cmd_dump(
    cli: &Cli,
    config: &mut Config,
    dir: &str,
    recursive: bool,
    output: &Path,
) -> Result<()> {
    let phone = open_phone(cli, config)?;
    let quiet = cli.quiet;
    let count = phone
        .dump(dir, output, recursive, &mut |remote| {
            if !quiet {
                eprintln!("  {} {remote}", style("↓").cyan());
            }
        })
        .with_context(|| format!("Failed to dump {dir}"))?;
    phone.close()?;

    if !cli.quiet {
        eprintln!(
            "{} {count} files from {dir} written to {}",
            style("✓").green(),
            output.display()
        );
    }
    Ok(())
}
