//! Library build units.
//!
//! A library is a directory of sources compiled into its own archive. Which
//! files take part is decided by a [`SourceFilter`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::error::{ResolveError, Result};

/// Source file extensions compiled by a library.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "cc", "s", "S"];

fn rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([+-])<([^>]*)>").expect("filter pattern is valid"))
}

#[derive(Debug, Clone)]
struct FilterRule {
    include: bool,
    pattern: Pattern,
}

/// Ordered `+<glob>` / `-<glob>` rules.
///
/// A rule matches a path when its glob matches the path or one of the path's
/// ancestor directories, so `-<Src/Legacy>` drops the whole subtree. `*` does
/// not cross `/`. The last matching rule decides; a path no rule matches is
/// excluded.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    raw: String,
    rules: Vec<FilterRule>,
}

impl SourceFilter {
    /// Parse a filter such as `+<*> -<Src/*_template.c>`.
    pub fn parse(filter: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for caps in rule_regex().captures_iter(filter) {
            let pattern = Pattern::new(caps[2].trim()).map_err(|e| ResolveError::InvalidFilter {
                filter: filter.to_string(),
                detail: e.to_string(),
            })?;
            rules.push(FilterRule {
                include: &caps[1] == "+",
                pattern,
            });
        }
        if rules.is_empty() && !filter.trim().is_empty() {
            return Err(ResolveError::InvalidFilter {
                filter: filter.to_string(),
                detail: "expected +<glob> or -<glob> rules".into(),
            });
        }
        Ok(Self {
            raw: filter.trim().to_string(),
            rules,
        })
    }

    /// A filter that includes every source.
    pub fn all() -> Self {
        Self {
            raw: "+<*>".into(),
            rules: vec![FilterRule {
                include: true,
                pattern: Pattern::new("*").expect("`*` is a valid glob"),
            }],
        }
    }

    /// Whether `rel_path` (relative to the library root) is selected.
    pub fn matches(&self, rel_path: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let mut selected = false;
        for rule in &self.rules {
            let hit = rel_path
                .ancestors()
                .filter(|a| !a.as_os_str().is_empty())
                .any(|a| rule.pattern.matches_path_with(a, options));
            if hit {
                selected = rule.include;
            }
        }
        selected
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One library to be compiled.
#[derive(Debug, Clone)]
pub struct LibraryUnit {
    pub name: String,
    pub root: PathBuf,
    pub filter: SourceFilter,
    /// Output directory, `<build>/<name>`.
    pub build_dir: PathBuf,
}

impl LibraryUnit {
    /// Sources under the root selected by the filter, sorted.
    ///
    /// Paths are returned relative to the root.
    pub fn collect_sources(&self) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        if !self.root.is_dir() {
            return Ok(sources);
        }
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(walk_error)?;
            if !is_source_file(&entry) {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if self.filter.matches(rel) {
                sources.push(rel.to_path_buf());
            }
        }
        sources.sort();
        Ok(sources)
    }
}

fn is_source_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Walk failures surface as plain I/O errors.
pub(crate) fn walk_error(err: walkdir::Error) -> ResolveError {
    ResolveError::Io(err.into())
}

/// Index of a registered library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(usize);

/// Libraries of one build, in registration order.
#[derive(Debug, Clone)]
pub struct LibrarySet {
    build_root: PathBuf,
    units: Vec<LibraryUnit>,
}

impl LibrarySet {
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        Self {
            build_root: build_root.into(),
            units: Vec::new(),
        }
    }

    /// Register a library.
    ///
    /// Registering a name again with the same root returns the existing
    /// handle. The same name with a different root is a collision.
    pub fn register(
        &mut self,
        name: &str,
        root: impl Into<PathBuf>,
        filter: SourceFilter,
    ) -> Result<LibraryHandle> {
        let root = root.into();
        if let Some(i) = self.units.iter().position(|u| u.name == name) {
            let existing = &self.units[i];
            if existing.root != root {
                return Err(ResolveError::LibraryCollision {
                    name: name.to_string(),
                    existing: existing.root.clone(),
                    requested: root,
                });
            }
            if existing.filter.as_str() != filter.as_str() {
                log::warn!(
                    "library '{name}' registered twice with different filters, keeping '{}'",
                    existing.filter
                );
            }
            return Ok(LibraryHandle(i));
        }

        log::debug!("library {name}: {} [{filter}]", root.display());
        self.units.push(LibraryUnit {
            name: name.to_string(),
            build_dir: self.build_root.join(name),
            root,
            filter,
        });
        Ok(LibraryHandle(self.units.len() - 1))
    }

    pub fn get(&self, handle: LibraryHandle) -> Option<&LibraryUnit> {
        self.units.get(handle.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&LibraryUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
