//! `ststm32 boards`: listing, description and validation of boards.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ststm32_board::parse::{board_to_toml, generate_template, validate_board, MANIFEST_SUFFIX};
use ststm32_board::{classify, BoardCatalog};
use ststm32_upload::debug_tools;

/// List all known boards.
pub fn list(catalog: &BoardCatalog) -> Result<()> {
    println!("Known boards:");
    println!();
    for board in catalog.iter() {
        println!("  {:<24} {:<16} {}", board.id, board.build.mcu, board.name);
    }
    println!();
    println!("Use 'ststm32 boards describe <id>' for details.");
    Ok(())
}

/// Describe a board in detail.
pub fn describe(catalog: &BoardCatalog, id: &str, format: &str) -> Result<()> {
    let board = catalog.get(id)?;
    match format {
        "toml" => {
            print!("{}", board_to_toml(board)?);
            return Ok(());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(board)?);
            return Ok(());
        }
        "text" => {}
        other => bail!("unknown format '{other}' (expected text, toml or json)"),
    }

    println!("=== Board: {} ===", board.id);
    println!("Name:   {}", board.name);
    println!("Vendor: {}", board.vendor);
    if let Some(url) = &board.url {
        println!("URL:    {url}");
    }
    println!();

    println!("--- MCU ---");
    let mcu = board.mcu_part()?;
    println!("  Part:   {mcu}");
    println!("  CPU:    {} @ {} Hz", board.build.cpu, board.build.f_cpu);
    match classify(&mcu) {
        Some(traits) => {
            println!("  Series: {}", mcu.series_symbol());
            println!("  Arch:   {}", traits.tier.arch());
            println!("  FPU:    {}", traits.fpu.map_or("none", |f| f.name()));
        }
        None => println!("  Series: unsupported"),
    }
    println!();

    println!("--- Memory ---");
    println!("  Flash: {} bytes", board.flash_bytes());
    println!("  RAM:   {} bytes", board.ram_bytes());
    println!("  Upload offset: 0x{:08X}", board.upload_offset());
    println!();

    println!("--- Frameworks ---");
    let frameworks: Vec<_> = board.frameworks.iter().map(|f| f.as_str()).collect();
    println!("  {}", frameworks.join(", "));
    println!();

    println!("--- Upload ---");
    println!("  Default:   {}", board.upload.protocol.as_deref().unwrap_or("-"));
    println!("  Protocols: {}", board.upload.protocols.join(", "));

    Ok(())
}

/// Validate a board definition, failing on any error-severity issue.
pub fn validate(catalog: &BoardCatalog, id: &str) -> Result<()> {
    let board = catalog.get(id)?;
    match validate_board(board) {
        Ok(()) => {
            println!("Board '{}' is valid.", board.id);
            Ok(())
        }
        Err(issues) => {
            let mut errors = 0;
            for issue in &issues {
                println!("  [{}] {}", issue.severity, issue.message);
                if issue.severity == "error" {
                    errors += 1;
                }
            }
            if errors > 0 {
                bail!("board '{}' has {errors} error(s)", board.id);
            }
            println!("Board '{}' is valid with {} warning(s).", board.id, issues.len());
            Ok(())
        }
    }
}

/// Write a template manifest for board `id` into `boards_dir`.
pub fn new(boards_dir: &Path, id: &str) -> Result<()> {
    let path = boards_dir.join(format!("{id}{MANIFEST_SUFFIX}"));
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::create_dir_all(boards_dir)
        .with_context(|| format!("creating {}", boards_dir.display()))?;
    std::fs::write(&path, generate_template(id)?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

/// Print the debug probes of a board as JSON.
pub fn debug(catalog: &BoardCatalog, id: &str) -> Result<()> {
    let board = catalog.get(id)?;
    let tools = debug_tools(board)?;
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
