//! Inline `INCLUDE` directives of a linker script.
//!
//! ChibiOS ships per-MCU scripts that `INCLUDE` shared rule files. The merged
//! script is self-contained and can be passed to the linker without extra
//! search paths.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{LinkerError, Result};
use crate::provider::write_if_changed;

/// Maximum nesting of `INCLUDE` directives.
pub const MAX_INCLUDE_DEPTH: usize = 16;

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^INCLUDE\s+"?([^\."\s]+\.ld)"?[ \t]*$"#).expect("include pattern is valid")
    })
}

/// Merge `script` with every script it includes and write the result to `out`.
///
/// Included files are looked up by name anywhere below `search_dir`. An
/// include that cannot be found is left in place with a warning.
pub fn merge_includes(script: &Path, search_dir: &Path, out: &Path) -> Result<PathBuf> {
    let mut content = std::fs::read_to_string(script)?;

    for _ in 0..MAX_INCLUDE_DEPTH {
        let mut resolved = 0;
        let mut merged = String::with_capacity(content.len());
        let mut last = 0;
        for caps in include_regex().captures_iter(&content) {
            let whole = caps.get(0).expect("group 0 always participates");
            let name = &caps[1];
            merged.push_str(&content[last..whole.start()]);
            last = whole.end();
            match find_file(search_dir, name)? {
                Some(path) => {
                    log::debug!("inlining {}", path.display());
                    merged.push_str(std::fs::read_to_string(&path)?.trim_end());
                    resolved += 1;
                }
                None => merged.push_str(whole.as_str()),
            }
        }
        merged.push_str(&content[last..]);
        content = merged;

        if resolved == 0 {
            for caps in include_regex().captures_iter(&content) {
                log::warn!(
                    "{} includes {} which is not under {}",
                    script.display(),
                    &caps[1],
                    search_dir.display()
                );
            }
            let dir = out.parent().unwrap_or(Path::new("."));
            write_if_changed(dir, out, &content)?;
            return Ok(out.to_path_buf());
        }
    }

    Err(LinkerError::IncludeDepth {
        path: script.to_path_buf(),
        depth: MAX_INCLUDE_DEPTH,
    })
}

/// First file named `name` below `dir`, visiting entries in sorted order.
///
/// Files of a directory are visited before its subdirectories, so the
/// shallowest match wins along each branch.
fn find_file(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
        });
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && entry.file_name() == name {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}
