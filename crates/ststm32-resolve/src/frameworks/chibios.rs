//! ChibiOS.
//!
//! ChibiOS is configured through its own makefiles. The sources and include
//! directories of every makefile the build needs are scraped and turned into
//! a single `FrameworkChibios` library rooted at the package directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ststm32_board::Framework;
use ststm32_ldscript::{merge_includes, LinkerError};
use ststm32_mkscrape::{extract, included_makefiles, Kind};
use walkdir::WalkDir;

use super::{FrameworkContext, FrameworkSetup, LibrarySpec, LinkerSource};
use crate::error::{ResolveError, Result};
use crate::flags::BuildFlags;
use crate::library::{walk_error, SourceFilter};

/// Project headers that configure the kernel and the HAL.
pub const CONFIG_HEADERS: &[&str] = &["chconf.h", "mcuconf.h", "halconf.h", "osalconf.h"];

/// File the board map is written to, under the cache directory.
pub const BOARD_MAP_FILE: &str = "chibios_board_map.json";

const DEFAULT_STACK_SIZE: &str = "0x400";

/// Discovery board letters tried in order when mapping a ChibiOS board.
const DISCOVERY_PIN_CODES: &[char] = &['a', 'c', 'n', 'r', 'v', 'z'];

/// Operating system abstraction the HAL runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Osal {
    Nil,
    Rt,
    OsLess,
}

impl Osal {
    pub fn from_defines(defines: &BuildFlags) -> Self {
        if defines.has_define("PIO_CHIBIOS_USE_NIL") {
            Osal::Nil
        } else if defines.has_define("PIO_CHIBIOS_USE_RT") {
            Osal::Rt
        } else {
            Osal::OsLess
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Osal::Nil => "nil",
            Osal::Rt => "rt",
            Osal::OsLess => "os-less",
        }
    }

    /// Directory holding `osal.mk`.
    fn dir(&self, os: &Path) -> PathBuf {
        let osal = os.join("hal").join("osal");
        match self {
            Osal::OsLess => osal.join("os-less").join("ARMCMx"),
            _ => osal.join(self.name()),
        }
    }

    fn has_kernel(&self) -> bool {
        !matches!(self, Osal::OsLess)
    }
}

/// A makefile to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Makefile {
    pub path: PathBuf,
    /// Variable prefix, `HAL` for `HALSRC`/`HALINC`.
    pub prefix: String,
    /// Directory `$(CHIBIOS)/<top>` resolves to for this makefile.
    pub root: PathBuf,
}

impl Makefile {
    fn new(path: PathBuf, prefix: &str, root: &Path) -> Self {
        Self {
            path,
            prefix: prefix.to_string(),
            root: root.to_path_buf(),
        }
    }
}

/// Map platform board ids to ChibiOS board directory names.
///
/// `known` decides which platform board ids exist.
pub fn board_map(boards_dir: &Path, known: impl Fn(&str) -> bool) -> Result<BTreeMap<String, String>> {
    let mut names: Vec<String> = std::fs::read_dir(boards_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut map = BTreeMap::new();
    for name in names {
        if name.contains("NUCLEO") {
            if let Some(tail) = name.get(name.len().saturating_sub(6)..) {
                let id = format!("nucleo_{}", tail.to_lowercase());
                if known(&id) {
                    map.insert(id, name.clone());
                }
            }
        }
        if name.contains("DISCOVERY") {
            let part = name.replace("ST_STM32", "").replace("_DISCOVERY", "").to_lowercase();
            if part.len() == 5 {
                let (line, tail) = part.split_at(4);
                if let Some(id) = DISCOVERY_PIN_CODES
                    .iter()
                    .map(|c| format!("disco_{line}{c}{tail}"))
                    .find(|id| known(id))
                {
                    map.insert(id, name.clone());
                }
            }
        }
    }
    Ok(map)
}

/// Directories below `src` holding ChibiOS configuration headers, sorted.
pub fn config_dirs(src: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = BTreeSet::new();
    if !src.is_dir() {
        return Ok(Vec::new());
    }
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_file() && CONFIG_HEADERS.iter().any(|h| entry.file_name() == *h) {
            if let Some(dir) = entry.path().parent() {
                dirs.insert(dir.to_path_buf());
            }
        }
    }
    Ok(dirs.into_iter().collect())
}

/// Low-level driver directories included by the port's `platform.mk`.
fn lld_drivers(os: &Path, platform_mk: &Path, i2c_fallback: bool) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(platform_mk)?;
    let drivers: Vec<PathBuf> = included_makefiles(&text, os)
        .into_iter()
        .filter_map(|mk| {
            let dir = mk.parent()?.to_path_buf();
            let is_i2c = dir
                .file_name()
                .is_some_and(|n| n.to_string_lossy().contains("I2C"));
            Some(if is_i2c && i2c_fallback {
                os.join("hal").join("lib").join("fallback").join("I2C")
            } else {
                dir
            })
        })
        .collect();
    if drivers.is_empty() {
        log::warn!("{} includes no driver makefiles", platform_mk.display());
    }
    Ok(drivers)
}

/// The makefiles needed for the configuration in `defines`.
fn makefiles(root: &Path, port: &str, board: &str, osal: Osal, arch: &str, defines: &BuildFlags) -> Vec<Makefile> {
    let os = root.join("os");
    let gcc = os.join("common").join("startup").join("ARMCMx").join("compilers").join("GCC");
    let mut list = vec![
        Makefile::new(os.join("license/license.mk"), "LIC", &os),
        Makefile::new(
            gcc.join("mk").join(format!("startup_{}.mk", port.to_lowercase())),
            "STARTUP",
            &os,
        ),
        Makefile::new(os.join("hal/hal.mk"), "HAL", &os),
        Makefile::new(os.join("hal/ports/STM32").join(port).join("platform.mk"), "PLATFORM", &os),
        Makefile::new(os.join("hal/boards").join(board).join("board.mk"), "BOARD", &os),
        Makefile::new(osal.dir(&os).join("osal.mk"), "OSAL", &os),
        Makefile::new(os.join("hal/lib/streams/streams.mk"), "STREAMS", &os),
    ];
    if osal.has_kernel() {
        list.push(Makefile::new(
            os.join(osal.name()).join(format!("{}.mk", osal.name())),
            "KERN",
            &os,
        ));
        list.push(Makefile::new(
            os.join("common/ports/ARMCMx/compilers/GCC/mk")
                .join(format!("port_{arch}.mk")),
            "PORT",
            &os,
        ));
    }
    if defines.has_define("PIO_CHIBIOS_USE_CPP") {
        list.push(Makefile::new(os.join("various/cpp_wrappers/chcpp.mk"), "CHCPP", &os));
    }
    if defines.has_define("PIO_CHIBIOS_USE_TEST") {
        let test = root.join("test");
        list.push(Makefile::new(test.join("lib/test.mk"), "TEST", &test));
        list.push(Makefile::new(
            test.join(osal.name()).join(format!("{}_test.mk", osal.name())),
            "",
            &test,
        ));
        list.push(Makefile::new(test.join("oslib/oslib_test.mk"), "", &test));
    }
    list
}

/// Merge the part's ChibiOS linker script into the cache directory.
fn merged_linker_script(os: &Path, ctx: &FrameworkContext<'_>) -> Result<(PathBuf, PathBuf)> {
    let ld_dir = os.join("common/startup/ARMCMx/compilers/GCC/ld");
    let name = format!(
        "{}x{}",
        ctx.mcu.line().to_uppercase(),
        ctx.mcu.flash_code().to_ascii_uppercase()
    );
    let script = ld_dir.join(format!("{name}.ld"));
    if !script.is_file() {
        return Err(LinkerError::NotFound {
            mcu: ctx.mcu.canonical().to_string(),
            reason: format!("ChibiOS has no {}", script.display()),
        }
        .into());
    }
    let out = ctx.packages.cache.join(format!("{name}_MERGED.ld"));
    let merged = merge_includes(&script, &ld_dir, &out)?;
    Ok((merged, ld_dir))
}

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let root = ctx.packages.framework_dir(Framework::Chibios)?;
    let os = root.join("os");
    let defines = ctx.requested;
    let port = ctx.mcu.series_port();
    let osal = Osal::from_defines(defines);
    let arch = ctx.traits.tier.chibios_port();
    let i2c_fallback = defines.has_define("PIO_CHIBIOS_I2C_FALLBACK");
    log::info!("ChibiOS for {}: osal {}, port {arch}", ctx.mcu.family(), osal.name());

    let builtin_ids: Vec<String> = ststm32_board::builtin::all().into_iter().map(|b| b.id).collect();
    let map = board_map(&os.join("hal").join("boards"), |id| {
        id == ctx.board.id || builtin_ids.iter().any(|b| b == id)
    })?;
    std::fs::create_dir_all(&ctx.packages.cache)?;
    let map_path = ctx.packages.cache.join(BOARD_MAP_FILE);
    let json = serde_json::to_string_pretty(&map).map_err(|source| ResolveError::Json {
        path: map_path.clone(),
        source,
    })?;
    std::fs::write(&map_path, json)?;
    let board = map
        .get(&ctx.board.id)
        .ok_or_else(|| ResolveError::UnknownChibiosBoard {
            board: ctx.board.id.clone(),
        })?;
    log::info!("board {} => {board}", ctx.board.id);

    let main_stack = defines.define_value("USE_MAIN_STACKSIZE").unwrap_or(DEFAULT_STACK_SIZE);
    let process_stack = defines.define_value("USE_PROCESS_STACKSIZE").unwrap_or(DEFAULT_STACK_SIZE);
    log::debug!("stack sizes: main {main_stack}, process {process_stack}");

    let mut setup = FrameworkSetup::default();
    let layer = &mut setup.layer;
    layer.remove.ccflags.extend(["-Os", "-mfpu=*", "-mfloat-abi=*"].map(String::from));
    layer.remove.linkflags.extend(["-Os", "-mfpu=*", "-mfloat-abi=*"].map(String::from));
    layer.add.ccflags.extend(
        [
            "-ggdb",
            "-fomit-frame-pointer",
            "-falign-functions=16",
            "-O2",
            "-fno-common",
            "-Wextra",
            "-Wundef",
            "-Wstrict-prototypes",
            "-Wp,-w",
        ]
        .map(String::from),
    );
    layer.add.linkflags.extend([
        "-O2".to_string(),
        "--specs=nano.specs".to_string(),
        "--specs=nosys.specs".to_string(),
        format!("-Wl,--defsym=__main_stack_size__={main_stack}"),
        format!("-Wl,--defsym=__process_stack_size__={process_stack}"),
    ]);
    if defines.has_define("PIO_CHIBIOS_USE_FPU") {
        layer.add.define("CORTEX_USE_FPU", "TRUE").define("__FPU_PRESENT", 1);
        layer.add.ccflags.extend(
            ["-mfloat-abi=softfp", "-mfpu=fpv4-sp-d16", "-fsingle-precision-constant"]
                .map(String::from),
        );
    } else {
        layer.add.define("CORTEX_USE_FPU", "FALSE").define("__FPU_PRESENT", 0);
    }

    let mut includes = config_dirs(&ctx.packages.project_src)?;
    let mut sources = BTreeSet::new();
    for mk in makefiles(root, &port, board, osal, arch, defines) {
        includes.extend(extract(&mk.path, &mk.prefix, Kind::Inc, &mk.root)?);
        sources.extend(extract(&mk.path, &mk.prefix, Kind::Src, &mk.root)?);
        sources.extend(extract(&mk.path, &mk.prefix, Kind::Asm, &mk.root)?);
    }

    let platform_mk = os.join("hal/ports/STM32").join(&port).join("platform.mk");
    let drivers = lld_drivers(&os, &platform_mk, i2c_fallback)?;
    includes.extend(drivers.iter().cloned());
    for include in includes {
        if !layer.add.cpppath.contains(&include) {
            layer.add.cpppath.push(include);
        }
    }

    let mut rules = vec!["-<*>".to_string()];
    for path in sources.iter().chain(&drivers) {
        match path.strip_prefix(root) {
            Ok(rel) => rules.push(format!("+<{}>", rel.display())),
            Err(_) => log::warn!("{} is outside {}", path.display(), root.display()),
        }
    }
    let filter = SourceFilter::parse(&rules.join(" "))?;
    setup.libraries.push(LibrarySpec::new("FrameworkChibios", root).with_filter(filter));

    let (script, ld_dir) = merged_linker_script(&os, ctx)?;
    setup.layer.add.libpath.push(ld_dir);
    setup.linker = LinkerSource::Direct(script);
    setup.variant = Some(board.clone());
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use ststm32_board::builtin;

    use super::*;
    use crate::frameworks::testutil::{touch, Fixture};
    use crate::packages::PackageDirs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    /// A trimmed ChibiOS tree for an STM32F4 Nucleo board.
    fn chibios_tree(root: &Path) {
        touch(
            root,
            &[
                "os/license/license.mk",
                "os/common/startup/ARMCMx/compilers/GCC/mk/startup_stm32f4xx.mk",
                "os/hal/boards/ST_NUCLEO64_F401RE/board.mk",
                "os/hal/boards/ST_STM32F429I_DISCOVERY/board.mk",
                "os/hal/boards/ST_STM32F4_DISCOVERY/board.mk",
                "os/hal/osal/os-less/ARMCMx/osal.mk",
                "os/hal/lib/streams/streams.mk",
            ],
        );
        write(
            root,
            "os/hal/hal.mk",
            "HALSRC := $(CHIBIOS)/os/hal/src/hal.c \\\n          $(CHIBIOS)/os/hal/src/hal_pal.c\n\nHALINC := $(CHIBIOS)/os/hal/include\n\n",
        );
        write(
            root,
            "os/hal/ports/STM32/STM32F4xx/platform.mk",
            "PLATFORMSRC := $(CHIBIOS)/os/hal/ports/STM32/STM32F4xx/stm32_isr.c\n\n\
             include $(CHIBIOS)/os/hal/ports/STM32/LLD/GPIOv2/driver.mk\n\
             include $(CHIBIOS)/os/hal/ports/STM32/LLD/I2Cv1/driver.mk\n\n",
        );
        write(
            root,
            "os/common/startup/ARMCMx/compilers/GCC/ld/STM32F401xE.ld",
            "MEMORY { flash0 : org = 0x08000000, len = 512k }\nINCLUDE rules.ld\n",
        );
        write(root, "os/common/startup/ARMCMx/compilers/GCC/ld/rules.ld", "SECTIONS {}\n");
    }

    fn packages(dir: &Path) -> PackageDirs {
        let mut packages =
            PackageDirs::default().with_framework(Framework::Chibios, dir.join("chibios"));
        packages.cache = dir.join("cache");
        packages.project_src = dir.join("src");
        packages
    }

    #[test]
    fn board_map_from_directory_names() {
        let dir = tempfile::tempdir().unwrap();
        chibios_tree(dir.path());
        let map = board_map(&dir.path().join("os/hal/boards"), |id| {
            ["nucleo_f401re", "disco_f429zi"].contains(&id)
        })
        .unwrap();
        assert_eq!(map["nucleo_f401re"], "ST_NUCLEO64_F401RE");
        assert_eq!(map["disco_f429zi"], "ST_STM32F429I_DISCOVERY");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn config_headers_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["src/cfg/chconf.h", "src/cfg/halconf.h", "src/main.c", "src/board/mcuconf.h"]);
        let dirs = config_dirs(&dir.path().join("src")).unwrap();
        assert_eq!(dirs, vec![dir.path().join("src/board"), dir.path().join("src/cfg")]);
    }

    #[test]
    fn nucleo_f401re_setup() {
        let dir = tempfile::tempdir().unwrap();
        chibios_tree(&dir.path().join("chibios"));
        touch(dir.path(), &["src/halconf.h"]);
        let fx = Fixture::new(builtin::nucleo_f401re(), packages(dir.path()));
        let setup = configure(&fx.ctx()).unwrap();

        assert_eq!(setup.variant.as_deref(), Some("ST_NUCLEO64_F401RE"));
        let add = &setup.layer.add;
        assert_eq!(add.cpppath[0], dir.path().join("src"));
        assert!(add.cpppath.contains(&dir.path().join("chibios/os/hal/include")));
        assert!(add.linkflags.contains(&"-Wl,--defsym=__main_stack_size__=0x400".to_string()));
        assert_eq!(add.define_value("CORTEX_USE_FPU"), Some("FALSE"));
        assert!(setup.layer.remove.ccflags.contains(&"-mfpu=*".to_string()));

        let lib = &setup.libraries[0];
        assert_eq!(lib.name, "FrameworkChibios");
        assert!(lib.filter.matches(Path::new("os/hal/src/hal.c")));
        assert!(lib.filter.matches(Path::new("os/hal/ports/STM32/LLD/I2Cv1/hal_i2c_lld.c")));
        assert!(!lib.filter.matches(Path::new("os/rt/src/chsys.c")));

        let LinkerSource::Direct(script) = &setup.linker else {
            panic!("expected a merged script");
        };
        assert_eq!(script, &dir.path().join("cache/STM32F401xE_MERGED.ld"));
        let merged = std::fs::read_to_string(script).unwrap();
        assert!(merged.contains("SECTIONS {}"));
        assert!(dir.path().join("cache").join(BOARD_MAP_FILE).is_file());
    }

    #[test]
    fn i2c_fallback_and_stack_sizes() {
        let dir = tempfile::tempdir().unwrap();
        chibios_tree(&dir.path().join("chibios"));
        let mut board = builtin::nucleo_f401re();
        board.build.extra_flags =
            vec!["-DPIO_CHIBIOS_I2C_FALLBACK -DUSE_MAIN_STACKSIZE=0x800 -DPIO_CHIBIOS_USE_FPU".into()];
        let fx = Fixture::new(board, packages(dir.path()));
        let setup = configure(&fx.ctx()).unwrap();

        let add = &setup.layer.add;
        assert!(add.cpppath.contains(&dir.path().join("chibios/os/hal/lib/fallback/I2C")));
        assert!(add.linkflags.contains(&"-Wl,--defsym=__main_stack_size__=0x800".to_string()));
        assert!(add.linkflags.contains(&"-Wl,--defsym=__process_stack_size__=0x400".to_string()));
        assert!(add.ccflags.contains(&"-mfloat-abi=softfp".to_string()));
        assert_eq!(add.define_value("__FPU_PRESENT"), Some("1"));
        assert!(setup.libraries[0]
            .filter
            .matches(Path::new("os/hal/lib/fallback/I2C/hal_i2c_lld.c")));
    }

    #[test]
    fn unmapped_board_is_error() {
        let dir = tempfile::tempdir().unwrap();
        chibios_tree(&dir.path().join("chibios"));
        let fx = Fixture::new(builtin::nucleo_l476rg(), packages(dir.path()));
        assert!(matches!(
            configure(&fx.ctx()).unwrap_err(),
            ResolveError::UnknownChibiosBoard { ref board } if board == "nucleo_l476rg"
        ));
    }

    #[test]
    fn kernel_makefiles_follow_osal() {
        let mut defines = BuildFlags::new();
        defines.define_flag("PIO_CHIBIOS_USE_RT").define_flag("PIO_CHIBIOS_USE_TEST");
        let osal = Osal::from_defines(&defines);
        let root = Path::new("/fw/chibios");
        let list = makefiles(root, "STM32F4xx", "ST_NUCLEO64_F401RE", osal, "v7m", &defines);
        let names: Vec<_> = list
            .iter()
            .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"rt.mk".to_string()));
        assert!(names.contains(&"port_v7m.mk".to_string()));
        assert!(names.contains(&"rt_test.mk".to_string()));
        let test = list.iter().find(|m| m.prefix == "TEST").unwrap();
        assert_eq!(test.root, root.join("test"));
    }
}
