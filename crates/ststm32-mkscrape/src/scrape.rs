//! Block extraction.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Result, ScrapeError};

/// Variable kind of a makefile block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// C sources.
    Src,
    /// Assembler sources.
    Asm,
    /// Include directories.
    Inc,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Src => "SRC",
            Kind::Asm => "ASM",
            Kind::Inc => "INC",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of leading `/` segments that stand for the framework root
/// (`$(CHIBIOS)/os`).
const ROOT_SEGMENTS: usize = 2;

/// Read `makefile` and extract the `<prefix><kind>` block.
///
/// See [`extract_from_str`].
pub fn extract(makefile: &Path, prefix: &str, kind: Kind, root: &Path) -> Result<BTreeSet<PathBuf>> {
    let text = std::fs::read_to_string(makefile).map_err(|source| ScrapeError::Read {
        path: makefile.to_path_buf(),
        source,
    })?;
    let paths = extract_from_str(&text, prefix, kind, root);
    log::debug!(
        "{}: {} {prefix}{kind} entries",
        makefile.display(),
        paths.len()
    );
    Ok(paths)
}

/// Extract the paths listed in the first `<prefix><kind>` block of `text`.
///
/// The block starts at a line beginning with `<prefix><kind>` and ends at the
/// first blank line. Conditional lines are skipped. Every path has its first
/// two segments replaced by `root`. A missing block yields an empty set.
pub fn extract_from_str(text: &str, prefix: &str, kind: Kind, root: &Path) -> BTreeSet<PathBuf> {
    let pattern = format!(r"(?m)^{}{}[\s\S]*?^\s*$", regex::escape(prefix), kind);
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            log::warn!("makefile block pattern {pattern}: {e}");
            return BTreeSet::new();
        }
    };

    let Some(block) = re.find(text) else {
        return BTreeSet::new();
    };

    let mut paths = BTreeSet::new();
    for raw in block.as_str().lines() {
        let line = raw.replace('\\', "");
        let line = line.trim();
        if ["ifneq", "ifeq", "else", "endif"]
            .iter()
            .any(|kw| line.starts_with(kw))
        {
            continue;
        }
        if line.is_empty() {
            break;
        }
        if let Some(path) = map_to_root(line, root) {
            paths.insert(path);
        }
    }
    paths
}

/// Makefiles pulled in by the first block of `include` lines in `text`,
/// mapped under `root`.
///
/// ChibiOS `platform.mk` files list their low-level drivers this way.
pub fn included_makefiles(text: &str, root: &Path) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .skip_while(|l| !l.starts_with("include"))
        .take_while(|l| !l.is_empty())
        .filter(|l| l.starts_with("include"))
        .filter_map(|l| map_to_root(l, root))
        .collect()
}

fn map_to_root(line: &str, root: &Path) -> Option<PathBuf> {
    let segments: Vec<&str> = line.split('/').collect();
    if segments.len() <= ROOT_SEGMENTS {
        return None;
    }
    let mut path = root.to_path_buf();
    path.extend(segments[ROOT_SEGMENTS..].iter().filter(|s| !s.is_empty()));
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAL_MK: &str = "\
# List of all the ChibiOS/HAL files, there is no need to remove the files
# from this list, you can disable parts of the HAL by editing halconf.h.
ifeq ($(USE_SMART_BUILD),yes)
HALCONF := $(strip $(shell cat $(CONFDIR)/halconf.h | egrep -e \"\\#define\"))
endif

HALSRC := $(CHIBIOS)/os/hal/src/hal.c \\
          $(CHIBIOS)/os/hal/src/hal_buffers.c \\
          $(CHIBIOS)/os/hal/src/hal_queues.c \\
          $(CHIBIOS)/os/hal/src/hal_mmcsd.c
ifneq ($(findstring HAL_USE_ADC TRUE,$(HALCONF)),)
HALSRC += $(CHIBIOS)/os/hal/src/hal_adc.c
endif

# Required include directories
HALINC := $(CHIBIOS)/os/hal/include

# Shared variables
ALLCSRC += $(HALSRC)
";

    const PLATFORM_MK: &str = "\
PLATFORMSRC := $(CHIBIOS)/os/hal/ports/common/ARMCMx/nvic.c \\
               $(CHIBIOS)/os/hal/ports/STM32/STM32F4xx/stm32_isr.c

PLATFORMINC := $(CHIBIOS)/os/hal/ports/common/ARMCMx \\
               $(CHIBIOS)/os/hal/ports/STM32/STM32F4xx

# Drivers compatible with the platform.
include $(CHIBIOS)/os/hal/ports/STM32/LLD/ADCv2/driver.mk
include $(CHIBIOS)/os/hal/ports/STM32/LLD/CANv1/driver.mk
include $(CHIBIOS)/os/hal/ports/STM32/LLD/I2Cv1/driver.mk

# Shared variables
ALLCSRC += $(PLATFORMSRC)
";

    fn root() -> PathBuf {
        PathBuf::from("/fw/chibios/os")
    }

    #[test]
    fn extract_sources_with_conditionals() {
        let srcs = extract_from_str(HAL_MK, "HAL", Kind::Src, &root());
        let expected: BTreeSet<PathBuf> = [
            "hal/src/hal.c",
            "hal/src/hal_adc.c",
            "hal/src/hal_buffers.c",
            "hal/src/hal_mmcsd.c",
            "hal/src/hal_queues.c",
        ]
        .iter()
        .map(|p| root().join(p))
        .collect();
        assert_eq!(srcs, expected);
    }

    #[test]
    fn extract_includes() {
        let incs = extract_from_str(HAL_MK, "HAL", Kind::Inc, &root());
        assert_eq!(incs.into_iter().collect::<Vec<_>>(), vec![root().join("hal/include")]);
    }

    #[test]
    fn block_must_start_a_line() {
        // `ALLCSRC += $(HALSRC)` mentions HALSRC but is not a HALSRC block.
        let srcs = extract_from_str("ALLCSRC += $(HALSRC)\n", "HAL", Kind::Src, &root());
        assert!(srcs.is_empty());
    }

    #[test]
    fn no_matching_block_is_empty() {
        assert!(extract_from_str(HAL_MK, "HAL", Kind::Asm, &root()).is_empty());
        assert!(extract_from_str("", "KERN", Kind::Src, &root()).is_empty());
    }

    #[test]
    fn short_entries_dropped() {
        let text = "TESTSRC = $(CHIBIOS) \\\n  $(CHIBIOS)/test/lib/ch_test.c\n\n";
        let srcs = extract_from_str(text, "TEST", Kind::Src, &root());
        assert_eq!(srcs.into_iter().collect::<Vec<_>>(), vec![root().join("lib/ch_test.c")]);
    }

    #[test]
    fn empty_prefix() {
        let text = "SRC = $(CHIBIOS)/os/rt/src/chsys.c\n";
        let srcs = extract_from_str(text, "", Kind::Src, &root());
        assert!(srcs.contains(&root().join("rt/src/chsys.c")));
    }

    #[test]
    fn extract_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let mk = dir.path().join("platform.mk");
        std::fs::write(&mk, PLATFORM_MK).unwrap();
        let incs = extract(&mk, "PLATFORM", Kind::Inc, &root()).unwrap();
        assert_eq!(incs.len(), 2);
        assert!(incs.contains(&root().join("hal/ports/STM32/STM32F4xx")));
    }

    #[test]
    fn extract_missing_file_is_error() {
        let err = extract(Path::new("/nonexistent/hal.mk"), "HAL", Kind::Src, &root()).unwrap_err();
        assert!(matches!(err, ScrapeError::Read { .. }));
    }

    #[test]
    fn lld_driver_makefiles() {
        let mks = included_makefiles(PLATFORM_MK, &root());
        assert_eq!(
            mks,
            vec![
                root().join("hal/ports/STM32/LLD/ADCv2/driver.mk"),
                root().join("hal/ports/STM32/LLD/CANv1/driver.mk"),
                root().join("hal/ports/STM32/LLD/I2Cv1/driver.mk"),
            ]
        );
    }
}
