//! Subcommand handlers

use crate::{Command, OutputFormat};
use anyhow::{Context, Result, bail};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;
use vexfs::{MountHandle, Vfs, VfsConfig};

/// Run `command`, writing results to `out`
pub fn run(command: Command, config: VfsConfig, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let vfs = Vfs::new(config).context("Invalid configuration")?;
    match command {
        Command::Info { pack } => {
            let handle = mount(&vfs, &pack)?;
            info_cmd(&vfs, handle, format, out)
        }
        Command::List { pack, prefix } => {
            let handle = mount(&vfs, &pack)?;
            list_cmd(&vfs, handle, prefix.as_deref(), format, out)
        }
        Command::Cat { path, packs } => {
            for pack in &packs {
                mount(&vfs, pack)?;
            }
            let mut stream = vfs
                .open(&path)
                .with_context(|| format!("Failed to open {path}"))?;
            io::copy(&mut stream, out)?;
            Ok(())
        }
        Command::Extract { pack, output } => {
            let handle = mount(&vfs, &pack)?;
            extract_cmd(&vfs, handle, &output, format, out)
        }
        Command::Verify { pack } => {
            let handle = mount(&vfs, &pack)?;
            verify_cmd(&vfs, handle, format, out)
        }
    }
}

fn mount(vfs: &Vfs, pack: &Path) -> Result<MountHandle> {
    vfs.mount(pack)
        .with_context(|| format!("Failed to mount {}", pack.display()))
}

fn info_cmd(vfs: &Vfs, handle: MountHandle, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let info = vfs.pack_info(handle)?;
    match format {
        OutputFormat::Text => {
            writeln!(out, "Pack:        {}", info.directory_path.display())?;
            writeln!(out, "Version:     {}", info.version)?;
            writeln!(out, "Tree size:   {} bytes", info.tree_size)?;
            writeln!(out, "Entries:     {}", info.entry_count)?;
            writeln!(out, "Data parts:  {}", info.archive_count)?;
            writeln!(out, "Embedded:    {}", info.embedded_count)?;
            writeln!(out, "Total size:  {} bytes", info.total_size)?;
        }
        OutputFormat::Json => {
            let doc = json!({
                "pack": info.directory_path.display().to_string(),
                "version": info.version,
                "tree_size": info.tree_size,
                "entries": info.entry_count,
                "data_parts": info.archive_count,
                "embedded": info.embedded_count,
                "total_size": info.total_size,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
    }
    Ok(())
}

fn list_cmd(
    vfs: &Vfs,
    handle: MountHandle,
    prefix: Option<&str>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let pack = vfs.pack(handle)?;
    let catalog = pack.catalog();
    let prefix = prefix.map(|p| p.trim_matches('/')).unwrap_or_default();

    let entries: Vec<_> = catalog
        .paths_under(prefix)
        .filter_map(|path| catalog.get(path).map(|entry| (path, entry)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (path, entry) in &entries {
                let location = if entry.is_embedded() {
                    "dir".to_string()
                } else {
                    format!("{:03}", entry.archive_index)
                };
                writeln!(
                    out,
                    "{:08x} {:>10} {:>5} {}",
                    entry.crc32,
                    entry.size(),
                    location,
                    path
                )?;
            }
        }
        OutputFormat::Json => {
            let doc: Vec<_> = entries
                .iter()
                .map(|(path, entry)| {
                    json!({
                        "path": path,
                        "size": entry.size(),
                        "crc32": format!("{:08x}", entry.crc32),
                        "preload": entry.preload_len(),
                        "archive_index": entry.archive_index,
                        "offset": entry.entry_offset,
                        "length": entry.entry_length,
                    })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
    }
    Ok(())
}

fn extract_cmd(
    vfs: &Vfs,
    handle: MountHandle,
    output: &Path,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let pack = vfs.pack(handle)?;
    let mut written = 0usize;
    let mut bytes = 0u64;

    for (path, entry) in pack.catalog().iter() {
        if path.split('/').any(|part| part == ".." || part.is_empty()) {
            bail!("Refusing to extract unsafe path {path}");
        }
        let target = output.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut stream = pack
            .open_entry(entry, vfs.config().read_block_size)
            .with_context(|| format!("Failed to open {path}"))?;
        let mut file = fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        bytes += io::copy(&mut stream, &mut file)
            .with_context(|| format!("Failed to extract {path}"))?;
        written += 1;
    }

    info!("Extracted {} files ({} bytes) to {}", written, bytes, output.display());
    if format == OutputFormat::Json {
        writeln!(out, "{}", json!({ "files": written, "bytes": bytes }))?;
    }
    Ok(())
}

fn verify_cmd(vfs: &Vfs, handle: MountHandle, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let report = vfs.verify_pack(handle)?;

    match format {
        OutputFormat::Text => {
            for mismatch in &report.mismatches {
                writeln!(
                    out,
                    "MISMATCH {} expected {:08x} got {:08x}",
                    mismatch.path, mismatch.expected, mismatch.actual
                )?;
            }
            for (path, error) in &report.failures {
                writeln!(out, "UNREADABLE {path}: {error}")?;
            }
            writeln!(
                out,
                "{} checked, {} mismatched, {} unreadable",
                report.checked,
                report.mismatches.len(),
                report.failures.len()
            )?;
        }
        OutputFormat::Json => {
            let doc = json!({
                "checked": report.checked,
                "mismatches": report.mismatches.iter().map(|m| json!({
                    "path": m.path,
                    "expected": format!("{:08x}", m.expected),
                    "actual": format!("{:08x}", m.actual),
                })).collect::<Vec<_>>(),
                "failures": report.failures.iter().map(|(path, error)| json!({
                    "path": path,
                    "error": error,
                })).collect::<Vec<_>>(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
    }

    if !report.is_ok() {
        bail!(
            "{} of {} entries failed verification",
            report.mismatches.len() + report.failures.len(),
            report.checked + report.failures.len()
        );
    }
    Ok(())
}
