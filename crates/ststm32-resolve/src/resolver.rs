//! Resolution pipeline orchestrator.

use ststm32_board::{classify, BoardDescriptor, FamilyTraits, Framework};
use ststm32_ldscript::{LinkerError, LinkerOutcome, LinkerRequest, LinkerScriptProvider};

use crate::config::{ResolvedBuildConfig, UploadDefaults};
use crate::error::{ResolveError, Result};
use crate::flags::{merge_layers, FlagLayer};
use crate::frameworks::{self, FrameworkContext, LinkerSource};
use crate::library::LibrarySet;
use crate::packages::PackageDirs;

/// Project-level settings layered on top of the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOptions {
    /// Raw compiler-style flags, applied last.
    pub build_flags: Vec<String>,
    /// Upload protocol replacing the board default.
    pub upload_protocol: Option<String>,
}

/// Compiler and linker flags every build starts from.
pub fn toolchain_defaults(board: &BoardDescriptor, traits: &FamilyTraits) -> FlagLayer {
    let mut layer = FlagLayer::new();
    let add = &mut layer.add;
    let mcpu = format!("-mcpu={}", board.build.cpu);

    add.asflags = vec!["-x".into(), "assembler-with-cpp".into()];
    add.ccflags = [
        "-g",
        "-Os",
        "-ffunction-sections",
        "-fdata-sections",
        "-Wall",
        "-mthumb",
        "-nostdlib",
    ]
    .map(String::from)
    .to_vec();
    add.ccflags.push(mcpu.clone());
    add.ccflags.extend(traits.float_flags());
    add.cxxflags = vec!["-fno-rtti".into(), "-fno-exceptions".into()];
    add.define("F_CPU", format!("{}L", board.build.f_cpu));
    if let Some(variant) = &board.build.variant {
        add.define_flag(variant.to_uppercase());
    }
    add.linkflags = ["-Os", "-Wl,--gc-sections,--relax", "-mthumb", "-nostartfiles", "-nostdlib"]
        .map(String::from)
        .to_vec();
    add.linkflags.push(mcpu);
    add.linkflags.extend(traits.float_flags());
    add.libs = ["c", "gcc", "m", "stdc++", "nosys"].map(String::from).to_vec();
    layer
}

/// Resolve the build configuration of `board` for `framework`.
///
/// Runs the stages in a fixed order and stops at the first fatal error.
/// Non-fatal findings are collected in [`ResolvedBuildConfig::warnings`].
pub fn resolve(
    board: &BoardDescriptor,
    framework: Framework,
    packages: &PackageDirs,
    user: &UserOptions,
) -> Result<ResolvedBuildConfig> {
    // Stage 1: Framework support
    if !board.supports(framework) {
        return Err(ResolveError::UnsupportedFramework {
            board: board.id.clone(),
            framework,
        });
    }

    // Stage 2: MCU classification
    let mcu = board.mcu_part()?;
    let traits = classify(&mcu).ok_or_else(|| ResolveError::UnknownMcu {
        board: board.id.clone(),
        mcu: mcu.to_string(),
    })?;
    log::info!("MCU family: {} ({})", mcu.family(), traits.tier.arch());

    // Stage 3: Framework configuration and flag layering
    let defaults = toolchain_defaults(board, traits);
    let board_layer = FlagLayer::parse(&board.build.extra_flags);
    let user_layer = FlagLayer::parse(&user.build_flags);
    let requested = merge_layers(&[&board_layer, &user_layer]);
    let upload_protocol = user
        .upload_protocol
        .clone()
        .or_else(|| board.upload.protocol.clone());

    let ctx = FrameworkContext {
        board,
        mcu: &mcu,
        traits,
        packages,
        requested: &requested,
        upload_protocol: upload_protocol.as_deref(),
    };
    let mut setup = frameworks::configure(framework, &ctx)?;

    let board_layer = board_layer.without(&setup.layer.remove);
    let mut flags = merge_layers(&[&defaults, &setup.layer, &board_layer, &user_layer]);
    let ccflags = flags.ccflags.clone();
    flags.asflags.extend(ccflags);

    // Stage 4: Linker script
    let request = LinkerRequest {
        mcu: mcu.clone(),
        cpu: board.build.cpu.clone(),
        ram_bytes: board.ram_bytes(),
        flash_bytes: board.flash_bytes(),
        override_path: board.build.ldscript.clone(),
    };
    let linker_script = match (&request.override_path, &setup.linker) {
        (None, LinkerSource::Direct(path)) => {
            if path.is_file() {
                LinkerOutcome::Found(path.clone())
            } else {
                LinkerOutcome::NotFound(format!("{} does not exist", path.display()))
            }
        }
        (_, source) => {
            let script_dir = match source {
                LinkerSource::Chain {
                    script_dir: Some(dir),
                } => dir.clone(),
                _ => packages.ldscripts.clone(),
            };
            LinkerScriptProvider::new(script_dir, &packages.cache).provide(&request)?
        }
    };
    match &linker_script {
        LinkerOutcome::NotFound(reason) => {
            return Err(LinkerError::NotFound {
                mcu: mcu.canonical().to_string(),
                reason: reason.clone(),
            }
            .into());
        }
        LinkerOutcome::Synthesized(path) => setup.warnings.push(format!(
            "no precompiled linker script for {}, linking with generated {}",
            mcu.canonical(),
            path.display()
        )),
        LinkerOutcome::Found(path) => log::info!("linker script: {}", path.display()),
    }

    // Stage 5: Libraries
    let mut libraries = LibrarySet::new(&packages.build);
    for lib in setup.libraries {
        libraries.register(&lib.name, lib.root, lib.filter)?;
    }

    // Stage 6: Upload defaults
    let upload = UploadDefaults {
        protocol: upload_protocol,
        offset: setup.upload_offset.unwrap_or_else(|| board.upload_offset()),
    };

    Ok(ResolvedBuildConfig {
        board_id: board.id.clone(),
        framework,
        series_symbol: mcu.series_symbol(),
        core_tier: traits.tier,
        fpu: traits.fpu,
        mcu,
        variant: setup.variant,
        flags,
        linker_script,
        startup_file: setup.startup_file,
        libraries,
        upload,
        warnings: setup.warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ststm32_board::builtin;
    use ststm32_ldscript::LinkerTemplate;

    use super::*;
    use crate::frameworks::testutil::touch;

    fn packages(dir: &Path) -> PackageDirs {
        PackageDirs {
            ldscripts: dir.join("ldscripts"),
            cache: dir.join("cache"),
            build: dir.join("build"),
            project_src: dir.join("src"),
            ..Default::default()
        }
    }

    #[test]
    fn bluepill_arduino() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["arduino/STM32F1/variants/generic_stm32f103c/ld/jtag_c8.ld"]);
        let packages = packages(dir.path()).with_framework(Framework::Arduino, dir.path().join("arduino"));
        let config = resolve(
            &builtin::bluepill_f103c8(),
            Framework::Arduino,
            &packages,
            &UserOptions::default(),
        )
        .unwrap();

        assert_eq!(config.series_symbol, "STM32F1");
        assert!(!config.has_fpu());
        assert_eq!(config.variant.as_deref(), Some("generic_stm32f103c"));
        assert_eq!(config.upload.offset, 0x0800_0000);
        assert_eq!(config.upload.protocol.as_deref(), Some("stlink"));
        assert!(!config.flags.linkflags.contains(&"-nostdlib".to_string()));
        assert!(!config.flags.libs.contains(&"c".to_string()));
        assert!(config.flags.libs.contains(&"gcc".to_string()));
        assert!(config.flags.has_define("STM32F1"));
        assert_eq!(&config.flags.ccflags[..2], &["-g".to_string(), "-Os".to_string()]);
        assert!(config.flags.asflags.contains(&"-g".to_string()));
        assert_eq!(
            config.linker_script_path(),
            Some(dir.path().join("arduino/STM32F1/variants/generic_stm32f103c/ld/jtag_c8.ld").as_path())
        );
        let names: Vec<_> = config.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["FrameworkArduinoVariant", "FrameworkArduino"]);
        assert_eq!(
            config.libraries.by_name("FrameworkArduino").unwrap().build_dir,
            dir.path().join("build/FrameworkArduino")
        );
    }

    #[test]
    fn dfu_override_moves_upload_offset() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["arduino/STM32F1/variants/generic_stm32f103c/ld/bootloader_20.ld"]);
        let packages = packages(dir.path()).with_framework(Framework::Arduino, dir.path().join("arduino"));
        let user = UserOptions {
            upload_protocol: Some("dfu".into()),
            ..Default::default()
        };
        let config = resolve(&builtin::bluepill_f103c8(), Framework::Arduino, &packages, &user).unwrap();
        assert_eq!(config.upload.offset, 0x0800_2000);
        assert_eq!(config.upload.protocol.as_deref(), Some("dfu"));
    }

    #[test]
    fn unsupported_framework() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(
            &builtin::maple_mini(),
            Framework::Stm32cube,
            &packages(dir.path()),
            &UserOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnsupportedFramework { framework: Framework::Stm32cube, .. }
        ));
    }

    #[test]
    fn unknown_family() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = builtin::nucleo_f401re();
        board.build.mcu = "stm32w108cbu6".into();
        let err = resolve(&board, Framework::Bare, &packages(dir.path()), &UserOptions::default()).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownMcu { ref mcu, .. } if mcu == "stm32w108cbu6"));
    }

    #[test]
    fn bare_with_precompiled_script() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["ldscripts/STM32F401RE_FLASH.ld"]);
        let config = resolve(
            &builtin::nucleo_f401re(),
            Framework::Bare,
            &packages(dir.path()),
            &UserOptions::default(),
        )
        .unwrap();

        let flags = &config.flags;
        assert_eq!(flags.define_value("F_CPU"), Some("84000000L"));
        assert!(flags.has_define("STM32F401xE"));
        assert!(flags.ccflags.contains(&"-mfpu=fpv4-sp-d16".to_string()));
        assert!(flags.linkflags.contains(&"-mfloat-abi=hard".to_string()));
        assert_eq!(&flags.asflags[..2], &["-x".to_string(), "assembler-with-cpp".to_string()]);
        assert!(flags.asflags.contains(&"-mcpu=cortex-m4".to_string()));
        assert_eq!(
            config.linker_script,
            LinkerOutcome::Found(dir.path().join("ldscripts/STM32F401RE_FLASH.ld"))
        );
        assert!(config.warnings.is_empty());
        assert!(config.libraries.is_empty());
    }

    #[test]
    fn synthesized_script_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ldscripts/tpl")).unwrap();
        std::fs::write(
            dir.path().join("ldscripts/tpl/linker.tpl"),
            LinkerTemplate::builtin().text(),
        )
        .unwrap();
        let config = resolve(
            &builtin::nucleo_l476rg(),
            Framework::Bare,
            &packages(dir.path()),
            &UserOptions::default(),
        )
        .unwrap();
        assert!(config.linker_script.is_synthesized());
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn no_script_anywhere_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(
            &builtin::nucleo_l476rg(),
            Framework::Bare,
            &packages(dir.path()),
            &UserOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::Linker(LinkerError::NotFound { .. })));
    }

    #[test]
    fn board_ldscript_beats_framework_script() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["custom/app.ld", "arduino/STM32F1/cores/maple/main.cpp"]);
        let packages = packages(dir.path()).with_framework(Framework::Arduino, dir.path().join("arduino"));
        let mut board = builtin::bluepill_f103c8();
        board.build.ldscript = Some(dir.path().join("custom/app.ld"));
        let config = resolve(&board, Framework::Arduino, &packages, &UserOptions::default()).unwrap();
        assert_eq!(
            config.linker_script,
            LinkerOutcome::Found(dir.path().join("custom/app.ld"))
        );
    }

    #[test]
    fn user_flags_win() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["ldscripts/STM32F401RE_FLASH.ld"]);
        let user = UserOptions {
            build_flags: vec!["-DF_CPU=16000000L -UNUCLEO_F401RE -O3".into()],
            ..Default::default()
        };
        let mut board = builtin::nucleo_f401re();
        board.build.variant = Some("nucleo_f401re".into());
        let config = resolve(&board, Framework::Bare, &packages(dir.path()), &user).unwrap();

        let flags = &config.flags;
        assert_eq!(flags.cppdefines.get_index(0).map(|(k, _)| k.as_str()), Some("F_CPU"));
        assert_eq!(flags.define_value("F_CPU"), Some("16000000L"));
        assert!(!flags.has_define("NUCLEO_F401RE"));
        assert_eq!(flags.ccflags.last().map(String::as_str), Some("-O3"));
    }

    #[test]
    fn official_core_drops_board_series_define_unless_user_sets_it() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["arduino/STM32/variants/NUCLEO_F401RE/ldscript.ld"]);
        let packages = packages(dir.path()).with_framework(Framework::Arduino, dir.path().join("arduino"));
        let board = builtin::nucleo_f401re();

        let config = resolve(&board, Framework::Arduino, &packages, &UserOptions::default()).unwrap();
        assert!(!config.flags.has_define("STM32F4"));
        assert!(!config.flags.has_define("F_CPU"));
        assert!(config.flags.has_define("STM32F4xx"));

        let user = UserOptions {
            build_flags: vec!["-DSTM32F4".into()],
            ..Default::default()
        };
        let config = resolve(&board, Framework::Arduino, &packages, &user).unwrap();
        assert!(config.flags.has_define("STM32F4"));
    }

    #[test]
    fn stm32cube_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let cube = dir.path().join("cube");
        touch(
            &cube,
            &[
                "f4/Drivers/STM32F4xx_HAL_Driver/Inc/stm32f4xx_hal_conf_template.h",
                "f4/Drivers/CMSIS/Device/ST/STM32F4xx/Source/Templates/gcc/startup_stm32f401xe.s",
                "platformio/ldscripts/STM32F401RE_FLASH.ld",
            ],
        );
        let packages = packages(dir.path()).with_framework(Framework::Stm32cube, &cube);
        let config = resolve(
            &builtin::nucleo_f401re(),
            Framework::Stm32cube,
            &packages,
            &UserOptions::default(),
        )
        .unwrap();

        assert_eq!(
            config.linker_script_path(),
            Some(cube.join("platformio/ldscripts/STM32F401RE_FLASH.ld").as_path())
        );
        assert_eq!(config.startup_file.as_deref(), Some("startup_stm32f401xe.s"));
        assert!(config.flags.has_define("USE_HAL_DRIVER"));
        assert!(config.flags.linkflags.contains(&"--specs=nosys.specs".to_string()));
        let device = config.libraries.by_name("FrameworkCMSISDevice").unwrap();
        assert!(device.filter.matches(Path::new("gcc/startup_stm32f401xe.s")));
        assert_eq!(device.build_dir, dir.path().join("build/FrameworkCMSISDevice"));
    }
}
