//! Prioritized linker script resolution.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use ststm32_board::descriptor::SRAM_ORIGIN;
use ststm32_board::McuPart;

use crate::error::{LinkerError, Result};
use crate::template::LinkerTemplate;

/// Template file looked up under the script directory.
pub const TEMPLATE_PATH: &str = "tpl/linker.tpl";

/// How a linker script was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkerOutcome {
    /// An override or precompiled vendor script.
    Found(PathBuf),
    /// Rendered from a template into the cache directory.
    Synthesized(PathBuf),
    /// Nothing matched; the reason lists what was tried.
    NotFound(String),
}

impl LinkerOutcome {
    /// The script path, if one was resolved.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LinkerOutcome::Found(p) | LinkerOutcome::Synthesized(p) => Some(p),
            LinkerOutcome::NotFound(_) => None,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, LinkerOutcome::Synthesized(_))
    }
}

/// Inputs for resolving one linker script.
#[derive(Debug, Clone)]
pub struct LinkerRequest {
    pub mcu: McuPart,
    /// `-mcpu` tag, used to break ties between precompiled candidates.
    pub cpu: String,
    pub ram_bytes: u64,
    pub flash_bytes: u64,
    /// Explicit script from the board or framework.
    pub override_path: Option<PathBuf>,
}

/// Resolves linker scripts against a directory of precompiled scripts.
#[derive(Debug, Clone)]
pub struct LinkerScriptProvider {
    script_dir: PathBuf,
    cache_dir: PathBuf,
    template: Option<LinkerTemplate>,
}

impl LinkerScriptProvider {
    /// A provider searching `script_dir` and caching generated scripts in
    /// `cache_dir`. The template is read from `<script_dir>/tpl/linker.tpl`
    /// unless one is set with [`with_template`](Self::with_template).
    pub fn new(script_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            cache_dir: cache_dir.into(),
            template: None,
        }
    }

    pub fn with_template(mut self, template: LinkerTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Walk the provider chain and report how the script was obtained.
    pub fn provide(&self, req: &LinkerRequest) -> Result<LinkerOutcome> {
        if let Some(path) = &req.override_path {
            return Ok(self.resolve_override(path));
        }

        if let Some(path) = self.find_precompiled(req)? {
            log::debug!("precompiled linker script {}", path.display());
            return Ok(LinkerOutcome::Found(path));
        }

        let template = match self.load_template()? {
            Some(t) => t,
            None => {
                return Ok(LinkerOutcome::NotFound(format!(
                    "no {}_FLASH.ld in {} and no template at {}",
                    req.mcu.canonical().to_uppercase(),
                    self.script_dir.display(),
                    self.script_dir.join(TEMPLATE_PATH).display()
                )))
            }
        };

        let path = self.synthesize(&template, req)?;
        log::warn!(
            "no precompiled linker script for {}, using generated {}",
            req.mcu.canonical(),
            path.display()
        );
        Ok(LinkerOutcome::Synthesized(path))
    }

    /// Resolve a script path, treating [`LinkerOutcome::NotFound`] as fatal.
    pub fn get_linker_script(&self, req: &LinkerRequest) -> Result<PathBuf> {
        match self.provide(req)? {
            LinkerOutcome::Found(p) | LinkerOutcome::Synthesized(p) => {
                log::info!("linker script: {}", p.display());
                Ok(p)
            }
            LinkerOutcome::NotFound(reason) => Err(LinkerError::NotFound {
                mcu: req.mcu.canonical().to_string(),
                reason,
            }),
        }
    }

    fn resolve_override(&self, path: &Path) -> LinkerOutcome {
        if path.is_absolute() {
            if path.is_file() {
                LinkerOutcome::Found(path.to_path_buf())
            } else {
                LinkerOutcome::NotFound(format!("override {} does not exist", path.display()))
            }
        } else {
            let in_dir = self.script_dir.join(path);
            if in_dir.is_file() {
                LinkerOutcome::Found(in_dir)
            } else {
                // Left for the linker's library search path.
                log::debug!("override {} not in {}", path.display(), self.script_dir.display());
                LinkerOutcome::Found(path.to_path_buf())
            }
        }
    }

    fn find_precompiled(&self, req: &LinkerRequest) -> Result<Option<PathBuf>> {
        if !self.script_dir.is_dir() {
            return Ok(None);
        }
        let canonical = req.mcu.canonical().to_uppercase();
        let line = req.mcu.line().to_uppercase();
        let pin = req.mcu.pin_code().to_ascii_uppercase();
        let size = req.mcu.flash_code().to_ascii_uppercase();
        let pattern = format!(
            "{}/{line}[{pin}X][{size}X]*_FLASH*.ld",
            glob::Pattern::escape(&self.script_dir.to_string_lossy())
        );
        let options = glob::MatchOptions {
            case_sensitive: false,
            ..Default::default()
        };

        let mut candidates = Vec::new();
        for entry in glob::glob_with(&pattern, options)? {
            candidates.push(entry.map_err(glob::GlobError::into_error)?);
        }
        log::debug!("{} candidate(s) for {pattern}", candidates.len());

        let tag = cpu_tag(&req.cpu);
        let exact = format!("{canonical}_FLASH.LD");
        candidates.sort_by_key(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_uppercase())
                .unwrap_or_default();
            let has_tag = tag.as_deref().is_some_and(|t| name.contains(t));
            (!has_tag, name != exact, name)
        });
        Ok(candidates.into_iter().next())
    }

    fn load_template(&self) -> Result<Option<LinkerTemplate>> {
        if let Some(t) = &self.template {
            return Ok(Some(t.clone()));
        }
        let path = self.script_dir.join(TEMPLATE_PATH);
        if path.is_file() {
            Ok(Some(LinkerTemplate::from_file(&path)?))
        } else {
            Ok(None)
        }
    }

    fn synthesize(&self, template: &LinkerTemplate, req: &LinkerRequest) -> Result<PathBuf> {
        let stack = SRAM_ORIGIN
            .checked_add(req.ram_bytes)
            .filter(|end| *end <= u64::from(u32::MAX))
            .ok_or(LinkerError::RamOverflow {
                ram_bytes: req.ram_bytes,
            })?;
        let vars = BTreeMap::from([
            ("stack", format!("{stack:#x}")),
            ("ram", format!("{}K", req.ram_bytes / 1024)),
            ("flash", format!("{}K", req.flash_bytes / 1024)),
        ]);
        let rendered = template.substitute(&vars)?;

        let digest = Sha256::digest(rendered.as_bytes());
        let hash8: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
        let path = self.cache_dir.join(format!(
            "{}_DEFAULT_{hash8}.ld",
            req.mcu.canonical().to_uppercase()
        ));

        write_if_changed(&self.cache_dir, &path, &rendered)?;
        Ok(path)
    }
}

/// `CM<n>` tag used in multi-core vendor script names (`cortex-m7` → `CM7`).
fn cpu_tag(cpu: &str) -> Option<String> {
    cpu.strip_prefix("cortex-m")
        .filter(|n| !n.is_empty())
        .map(|n| format!("CM{}", n.to_uppercase()))
}

/// Write `content` to `path` through a temp file in `dir`, unless it is already there.
pub(crate) fn write_if_changed(dir: &Path, path: &Path, content: &str) -> Result<()> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == content {
            log::debug!("reusing cached {}", path.display());
            return Ok(());
        }
    }
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mcu: &str, cpu: &str, ram: u64, flash: u64) -> LinkerRequest {
        LinkerRequest {
            mcu: McuPart::parse(mcu).unwrap(),
            cpu: cpu.into(),
            ram_bytes: ram,
            flash_bytes: flash,
            override_path: None,
        }
    }

    fn fixture() -> (tempfile::TempDir, LinkerScriptProvider) {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("ldscripts");
        std::fs::create_dir_all(scripts.join("tpl")).unwrap();
        std::fs::write(
            scripts.join(TEMPLATE_PATH),
            "_estack = $stack;\nRAM = $ram\nFLASH = $flash\n",
        )
        .unwrap();
        let provider = LinkerScriptProvider::new(scripts, dir.path().join("cache"));
        (dir, provider)
    }

    #[test]
    fn synthesized_memory_layout() {
        let (_dir, provider) = fixture();
        let req = request("stm32f103c8t6", "cortex-m3", 20480, 65536);
        let outcome = provider.provide(&req).unwrap();
        assert!(outcome.is_synthesized());

        let path = outcome.path().unwrap();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("STM32F103C8_DEFAULT_"));
        assert!(name.ends_with(".ld"));

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("0x20005000"));
        assert!(text.contains("RAM = 20K"));
        assert!(text.contains("FLASH = 64K"));
    }

    #[test]
    fn oversized_ram_is_an_error() {
        let (dir, provider) = fixture();
        for ram in [u64::MAX, 0x1_0000_0000] {
            let err = provider
                .provide(&request("stm32f103c8t6", "cortex-m3", ram, 65536))
                .unwrap_err();
            assert!(matches!(err, LinkerError::RamOverflow { ram_bytes } if ram_bytes == ram));
        }
        assert!(!dir.path().join("cache").exists());

        // The last byte of the address space still fits.
        let ram = u64::from(u32::MAX) - SRAM_ORIGIN;
        let path = provider
            .get_linker_script(&request("stm32f103c8t6", "cortex-m3", ram, 65536))
            .unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("0xffffffff"));
    }

    #[test]
    fn synthesis_is_idempotent() {
        let (_dir, provider) = fixture();
        let req = request("stm32f103c8t6", "cortex-m3", 20480, 65536);
        let first = provider.get_linker_script(&req).unwrap();
        let first_text = std::fs::read(&first).unwrap();
        let second = provider.get_linker_script(&req).unwrap();
        assert_eq!(first, second);
        assert_eq!(first_text, std::fs::read(&second).unwrap());
    }

    #[test]
    fn different_memory_gets_different_file() {
        let (_dir, provider) = fixture();
        let a = provider
            .get_linker_script(&request("stm32f103c8t6", "cortex-m3", 20480, 65536))
            .unwrap();
        let b = provider
            .get_linker_script(&request("stm32f103c8t6", "cortex-m3", 20480, 131072))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn precompiled_beats_template() {
        let (_dir, provider) = fixture();
        let script = provider.script_dir().join("STM32F401RE_FLASH.ld");
        std::fs::write(&script, "/* vendor */").unwrap();
        let outcome = provider
            .provide(&request("stm32f401ret6", "cortex-m4", 96 * 1024, 512 * 1024))
            .unwrap();
        assert_eq!(outcome, LinkerOutcome::Found(script));
    }

    #[test]
    fn precompiled_matches_package_wildcard() {
        let (_dir, provider) = fixture();
        let script = provider.script_dir().join("STM32F103XB_FLASH.ld");
        std::fs::write(&script, "/* vendor */").unwrap();
        let outcome = provider
            .provide(&request("stm32f103cbt6", "cortex-m3", 20480, 131072))
            .unwrap();
        assert_eq!(outcome, LinkerOutcome::Found(script));
    }

    #[test]
    fn cpu_tag_breaks_ties() {
        let (_dir, provider) = fixture();
        for name in ["STM32H745ZI_FLASH_CM4.ld", "STM32H745ZI_FLASH_CM7.ld"] {
            std::fs::write(provider.script_dir().join(name), "").unwrap();
        }
        let outcome = provider
            .provide(&request("stm32h745zit6", "cortex-m7", 512 * 1024, 1024 * 1024))
            .unwrap();
        assert_eq!(
            outcome,
            LinkerOutcome::Found(provider.script_dir().join("STM32H745ZI_FLASH_CM7.ld"))
        );
    }

    #[test]
    fn exact_name_preferred_over_wildcard() {
        let (_dir, provider) = fixture();
        for name in ["STM32F103X8_FLASH.ld", "STM32F103C8_FLASH.ld"] {
            std::fs::write(provider.script_dir().join(name), "").unwrap();
        }
        let outcome = provider
            .provide(&request("stm32f103c8t6", "cortex-m3", 20480, 65536))
            .unwrap();
        assert_eq!(
            outcome,
            LinkerOutcome::Found(provider.script_dir().join("STM32F103C8_FLASH.ld"))
        );
    }

    #[test]
    fn override_wins() {
        let (dir, provider) = fixture();
        std::fs::write(provider.script_dir().join("STM32F103C8_FLASH.ld"), "").unwrap();
        let custom = dir.path().join("custom.ld");
        std::fs::write(&custom, "").unwrap();

        let mut req = request("stm32f103c8t6", "cortex-m3", 20480, 65536);
        req.override_path = Some(custom.clone());
        assert_eq!(provider.provide(&req).unwrap(), LinkerOutcome::Found(custom));
    }

    #[test]
    fn relative_override_kept_for_linker_search() {
        let (_dir, provider) = fixture();
        let mut req = request("stm32f103c8t6", "cortex-m3", 20480, 65536);
        req.override_path = Some(PathBuf::from("jtag_c8.ld"));
        assert_eq!(
            provider.provide(&req).unwrap(),
            LinkerOutcome::Found(PathBuf::from("jtag_c8.ld"))
        );
    }

    #[test]
    fn missing_absolute_override_not_found() {
        let (dir, provider) = fixture();
        let mut req = request("stm32f103c8t6", "cortex-m3", 20480, 65536);
        req.override_path = Some(dir.path().join("missing.ld"));
        assert!(matches!(provider.provide(&req).unwrap(), LinkerOutcome::NotFound(_)));
    }

    #[test]
    fn no_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LinkerScriptProvider::new(dir.path().join("none"), dir.path().join("cache"));
        let req = request("stm32l476rgt6", "cortex-m4", 128 * 1024, 1024 * 1024);
        assert!(matches!(
            provider.provide(&req).unwrap(),
            LinkerOutcome::NotFound(_)
        ));
        let err = provider.get_linker_script(&req).unwrap_err();
        assert!(matches!(err, LinkerError::NotFound { ref mcu, .. } if mcu == "stm32l476rg"));
    }

    #[test]
    fn builtin_template_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LinkerScriptProvider::new(dir.path().join("none"), dir.path().join("cache"))
            .with_template(LinkerTemplate::builtin());
        let path = provider
            .get_linker_script(&request("stm32f030r8t6", "cortex-m0", 8 * 1024, 64 * 1024))
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("_estack = 0x20002000;"));
        assert!(text.contains("LENGTH = 8K"));
    }

    #[test]
    fn cpu_tags() {
        assert_eq!(cpu_tag("cortex-m7").as_deref(), Some("CM7"));
        assert_eq!(cpu_tag("cortex-m0plus").as_deref(), Some("CM0PLUS"));
        assert_eq!(cpu_tag("arm7"), None);
    }
}
