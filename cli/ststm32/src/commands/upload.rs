//! `ststm32 upload`: flash the built firmware.

use anyhow::{bail, Context, Result};
use ststm32_upload::{select_uploader, UploadContext};

use super::resolve::resolve_project;
use super::Project;

/// Resolve the project, pick the uploader and run it (or print it).
pub fn run(project: &Project, port: Option<&str>, protocol: Option<&str>, dry_run: bool) -> Result<()> {
    let (board, config) = resolve_project(project, None, None)?;
    let packages = project.packages();
    let settings = &project.manifest.project;

    let mut ctx = UploadContext::new(&project.dir, &packages.build, config.framework);
    ctx.port = port.map(str::to_string).or_else(|| settings.upload_port.clone());
    ctx.offset = config.upload.offset;
    ctx.custom_command = settings.upload_command.clone();
    ctx.openocd_scripts = project
        .manifest
        .packages
        .openocd_scripts
        .as_ref()
        .map(|p| project.dir.join(p));

    let protocol = protocol.map(str::to_string).or(config.upload.protocol);
    let plan = select_uploader(protocol.as_deref(), &board, &ctx)
        .with_context(|| format!("selecting the uploader for board '{}'", board.id))?;
    for warning in &plan.warnings {
        eprintln!("warning: {warning}");
    }
    let Some(action) = plan.action else {
        println!("Nothing to upload with.");
        return Ok(());
    };

    if dry_run {
        println!("{action}");
        return Ok(());
    }
    if !ctx.firmware_bin.is_file() {
        bail!("{} does not exist (build the firmware first)", ctx.firmware_bin.display());
    }
    action.run()?;
    println!("Uploaded {}", ctx.firmware_bin.display());
    Ok(())
}
