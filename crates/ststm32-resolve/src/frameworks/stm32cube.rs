//! STM32Cube HAL.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ststm32_board::Framework;

use super::{FrameworkContext, FrameworkSetup, LibrarySpec, LinkerSource};
use crate::error::{ResolveError, Result};
use crate::library::SourceFilter;
use crate::startup::{find_startup_file, startup_search_dir};

pub const HAL_DRIVER_FILTER: &str = "+<*> -<Src/*_template.c> -<Src/Legacy>";

/// Board id to Cube BSP variant overrides, `platformio/variants_remap.json`.
pub fn load_variant_remap(fw: &Path) -> Result<BTreeMap<String, String>> {
    let path = fw.join("platformio").join("variants_remap.json");
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|source| ResolveError::Json { path, source })
}

/// Copy `<family>xx_hal_conf_template.h` to `<family>xx_hal_conf.h` unless
/// the configuration already exists. Returns the configuration path.
pub fn ensure_hal_config(hal_inc: &Path, family: &str) -> Result<PathBuf> {
    let config = hal_inc.join(format!("{family}xx_hal_conf.h"));
    if config.is_file() {
        return Ok(config);
    }
    let template = hal_inc.join(format!("{family}xx_hal_conf_template.h"));
    if !template.is_file() {
        return Err(ResolveError::MissingHalConfTemplate { path: template });
    }
    std::fs::copy(&template, &config)?;
    log::info!("generated {}", config.display());
    Ok(config)
}

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let fw = ctx.packages.framework_dir(Framework::Stm32cube)?;
    let series_root = fw.join(ctx.mcu.core_dir());
    let drivers = series_root.join("Drivers");
    let port = ctx.mcu.series_port();
    let hal_dir = drivers.join(format!("{port}_HAL_Driver"));
    let device_dir = drivers.join("CMSIS").join("Device").join("ST").join(&port);

    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;
    add.define_flag("USE_HAL_DRIVER");
    let requested: Vec<&String> = ctx.requested.cppdefines.keys().collect();
    if requested.iter().any(|d| d.ends_with("F103xC")) {
        add.define_flag("STM32F103xE");
    } else if requested.iter().any(|d| d.ends_with("F103x8")) {
        add.define_flag("STM32F103xB");
    }

    add.cpppath.extend([
        drivers.join("CMSIS").join("Include"),
        device_dir.join("Include"),
        hal_dir.join("Inc"),
        drivers.join("BSP").join("Components").join("Common"),
    ]);
    add.libpath.extend([
        drivers.join("CMSIS").join("Lib").join("GCC"),
        fw.join("platformio").join("ldscripts"),
    ]);
    add.linkflags.extend(["--specs=nano.specs", "--specs=nosys.specs"].map(String::from));

    setup.linker = LinkerSource::Chain {
        script_dir: Some(fw.join("platformio").join("ldscripts")),
    };

    let variant = load_variant_remap(fw)?
        .remove(&ctx.board.id)
        .unwrap_or_else(|| ctx.board.id.to_uppercase());

    ensure_hal_config(&hal_dir.join("Inc"), ctx.mcu.family())?;

    let components = drivers.join("BSP").join("Components");
    if components.is_dir() {
        let mut names: Vec<String> = std::fs::read_dir(&components)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        for name in names {
            setup
                .libraries
                .push(LibrarySpec::new(format!("BSP-{name}"), components.join(&name)));
        }
    }

    let bsp_dir = drivers.join("BSP").join(&variant);
    if bsp_dir.is_dir() {
        setup.layer.add.cpppath.push(bsp_dir.clone());
        setup.libraries.push(LibrarySpec::new("FrameworkBSP", bsp_dir));
    } else {
        setup.warn(format!("no BSP for variant {variant}, building without board support"));
    }

    setup.libraries.push(
        LibrarySpec::new("FrameworkHALDriver", &hal_dir)
            .with_filter(SourceFilter::parse(HAL_DRIVER_FILTER)?),
    );

    let startup = find_startup_file(
        ctx.mcu,
        ctx.board.build.startup_file.as_deref(),
        &startup_search_dir(&series_root, ctx.mcu),
    )?;
    let filter = SourceFilter::parse(&format!("-<*> +<*.c> +<gcc/{startup}>"))?;
    setup.libraries.push(
        LibrarySpec::new("FrameworkCMSISDevice", device_dir.join("Source").join("Templates"))
            .with_filter(filter),
    );
    setup.startup_file = Some(startup);
    setup.variant = Some(variant);
    Ok(setup)
}
