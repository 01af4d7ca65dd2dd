//! `ststm32 resolve`: print the resolved build configuration.

use anyhow::{bail, Context, Result};
use serde_json::json;
use ststm32_board::{BoardDescriptor, Framework};
use ststm32_resolve::{resolve, ResolvedBuildConfig};

use super::{catalog, Project};

/// Resolve the project's board and framework, with optional replacements.
pub fn resolve_project(
    project: &Project,
    board: Option<&str>,
    framework: Option<Framework>,
) -> Result<(BoardDescriptor, ResolvedBuildConfig)> {
    let catalog = catalog(Some(project))?;
    let board = catalog.get(board.unwrap_or(project.manifest.project.board.as_str()))?.clone();
    let framework = framework.unwrap_or(project.manifest.project.framework);
    let config = resolve(&board, framework, &project.packages(), &project.manifest.user_options())
        .with_context(|| format!("resolving board '{}' for framework '{framework}'", board.id))?;
    Ok((board, config))
}

/// Resolve and print the configuration.
pub fn run(project: &Project, board: Option<&str>, framework: Option<Framework>, format: &str) -> Result<()> {
    let (_, config) = resolve_project(project, board, framework)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&to_json(&config)?)?),
        "text" => print_text(&config)?,
        other => bail!("unknown format '{other}' (expected text or json)"),
    }
    for warning in &config.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn to_json(config: &ResolvedBuildConfig) -> Result<serde_json::Value> {
    let mut libraries = Vec::new();
    for lib in config.libraries.iter() {
        libraries.push(json!({
            "name": lib.name,
            "root": lib.root,
            "filter": lib.filter.as_str(),
            "build-dir": lib.build_dir,
            "sources": lib.collect_sources()?,
        }));
    }
    Ok(json!({
        "board": config.board_id,
        "framework": config.framework,
        "mcu": config.mcu.as_str(),
        "series": config.series_symbol,
        "core": config.core_tier.arch(),
        "fpu": config.fpu.map(|f| f.name()),
        "variant": config.variant,
        "linker-script": config.linker_script_path(),
        "startup-file": config.startup_file,
        "flags": config.flags,
        "libraries": libraries,
        "upload": {
            "protocol": config.upload.protocol,
            "offset": format!("0x{:08x}", config.upload.offset),
        },
        "warnings": config.warnings,
    }))
}

fn print_text(config: &ResolvedBuildConfig) -> Result<()> {
    println!("=== {} / {} ===", config.board_id, config.framework);
    println!("MCU:     {} ({}, {})", config.mcu, config.series_symbol, config.core_tier.arch());
    println!("FPU:     {}", config.fpu.map_or("none", |f| f.name()));
    if let Some(variant) = &config.variant {
        println!("Variant: {variant}");
    }
    if let Some(path) = config.linker_script_path() {
        let how = if config.linker_script.is_synthesized() { " (generated)" } else { "" };
        println!("Linker script: {}{how}", path.display());
    }
    if let Some(startup) = &config.startup_file {
        println!("Startup file:  {startup}");
    }
    println!();

    let flags = &config.flags;
    println!("--- Flags ---");
    println!("  CCFLAGS:   {}", flags.ccflags.join(" "));
    if !flags.cxxflags.is_empty() {
        println!("  CXXFLAGS:  {}", flags.cxxflags.join(" "));
    }
    println!("  DEFINES:   {}", flags.define_args().join(" "));
    println!("  LINKFLAGS: {}", flags.linkflags.join(" "));
    println!("  LIBS:      {}", flags.libs.join(" "));
    for path in &flags.cpppath {
        println!("  CPPPATH:   {}", path.display());
    }
    for path in &flags.libpath {
        println!("  LIBPATH:   {}", path.display());
    }
    println!();

    println!("--- Libraries ---");
    for lib in config.libraries.iter() {
        let sources = lib.collect_sources()?;
        println!("  {:<24} {} source(s) from {}", lib.name, sources.len(), lib.root.display());
    }
    println!();

    println!("--- Upload ---");
    println!("  Protocol: {}", config.upload.protocol.as_deref().unwrap_or("-"));
    println!("  Offset:   0x{:08X}", config.upload.offset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::create_project;
    use crate::commands::ldscript::write_template;
    use crate::manifest::ProjectManifest;

    fn project(dir: &std::path::Path, board: &str) -> Project {
        let path = dir.join("p");
        create_project(&path, "p", board, Framework::Bare).unwrap();
        let (manifest, dir) = ProjectManifest::find_and_load(&path).unwrap().unwrap();
        let project = Project { manifest, dir };
        write_template(&project.packages().ldscripts.join("tpl/linker.tpl")).unwrap();
        project
    }

    #[test]
    fn json_names_the_generated_script() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "bluepill_f103c8");
        let (_, config) = resolve_project(&project, None, None).unwrap();
        let value = to_json(&config).unwrap();
        assert_eq!(value["series"], "STM32F1");
        assert_eq!(value["fpu"], serde_json::Value::Null);
        assert_eq!(value["upload"]["offset"], "0x08000000");
        let script = value["linker-script"].as_str().unwrap();
        assert!(script.contains("_DEFAULT_"));
        assert_eq!(value["warnings"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn board_override() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "bluepill_f103c8");
        let (board, config) = resolve_project(&project, Some("nucleo_l476rg"), None).unwrap();
        assert_eq!(board.id, "nucleo_l476rg");
        assert!(config.has_fpu());
        assert!(config.flags.ccflags.iter().any(|f| f.starts_with("-mfloat-abi")));
    }

    #[test]
    fn unsupported_framework_names_the_board() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "maple_mini");
        let err = resolve_project(&project, None, Some(Framework::Zephyr)).unwrap_err();
        assert!(format!("{err:#}").contains("maple_mini"));
    }

    #[test]
    fn unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "bluepill_f103c8");
        assert!(run(&project, None, None, "yaml").is_err());
        run(&project, None, None, "text").unwrap();
    }
}
