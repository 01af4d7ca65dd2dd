//! `ststm32 scrape`: makefile list extraction.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use ststm32_mkscrape::{extract, included_makefiles, Kind};

/// Makefile variable kind as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Src,
    Asm,
    Inc,
}

impl From<KindArg> for Kind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Src => Kind::Src,
            KindArg::Asm => Kind::Asm,
            KindArg::Inc => Kind::Inc,
        }
    }
}

/// Print the `<prefix><kind>` list of `makefile`, mapped under `root`.
pub fn run(makefile: &Path, prefix: &str, kind: KindArg, root: &Path) -> Result<()> {
    let kind = Kind::from(kind);
    let paths = extract(makefile, prefix, kind, root)
        .with_context(|| format!("scraping {}", makefile.display()))?;
    if paths.is_empty() {
        log::warn!("no {prefix}{} block in {}", kind.as_str(), makefile.display());
    }
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

/// Print the makefiles `makefile` includes, mapped under `root`.
pub fn includes(makefile: &Path, root: &Path) -> Result<()> {
    let text = std::fs::read_to_string(makefile)
        .with_context(|| format!("reading {}", makefile.display()))?;
    for path in included_makefiles(&text, root) {
        println!("{}", path.display());
    }
    Ok(())
}
