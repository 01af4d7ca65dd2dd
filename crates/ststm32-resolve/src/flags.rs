//! Ordered build flag sets and layered merging.
//!
//! Flags are built up from explicit layers applied in order. Each layer first
//! removes entries from what has been accumulated so far, then appends its
//! own. Later layers win: a define set by a later layer replaces the earlier
//! value in place.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

/// Compiler, assembler and linker flags for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildFlags {
    pub asflags: Vec<String>,
    /// Flags shared by C, C++ and assembler-with-cpp.
    pub ccflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    /// Preprocessor defines in insertion order.
    pub cppdefines: IndexMap<String, Option<String>>,
    pub cpppath: Vec<PathBuf>,
    pub linkflags: Vec<String>,
    pub libs: Vec<String>,
    pub libpath: Vec<PathBuf>,
}

impl BuildFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name=value`, replacing an earlier value in place.
    pub fn define(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        self.cppdefines.insert(name.into(), Some(value.to_string()));
        self
    }

    /// Define `name` without a value.
    pub fn define_flag(&mut self, name: impl Into<String>) -> &mut Self {
        self.cppdefines.insert(name.into(), None);
        self
    }

    /// Remove a define, keeping the order of the others.
    pub fn undefine(&mut self, name: &str) -> bool {
        self.cppdefines.shift_remove(name).is_some()
    }

    pub fn has_define(&self, name: &str) -> bool {
        self.cppdefines.contains_key(name)
    }

    /// Value of a define, `None` when undefined or defined without a value.
    pub fn define_value(&self, name: &str) -> Option<&str> {
        self.cppdefines.get(name).and_then(|v| v.as_deref())
    }

    /// `-D` arguments for every define, in order.
    pub fn define_args(&self) -> Vec<String> {
        self.cppdefines
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("-D{name}={v}"),
                None => format!("-D{name}"),
            })
            .collect()
    }

    /// Append `other` to `self`.
    ///
    /// Flag lists are appended as-is. Paths and libraries already present are
    /// not repeated.
    pub fn merge(&mut self, other: &BuildFlags) {
        self.asflags.extend(other.asflags.iter().cloned());
        self.ccflags.extend(other.ccflags.iter().cloned());
        self.cflags.extend(other.cflags.iter().cloned());
        self.cxxflags.extend(other.cxxflags.iter().cloned());
        for (name, value) in &other.cppdefines {
            self.cppdefines.insert(name.clone(), value.clone());
        }
        extend_unique(&mut self.cpppath, &other.cpppath);
        self.linkflags.extend(other.linkflags.iter().cloned());
        extend_unique(&mut self.libs, &other.libs);
        extend_unique(&mut self.libpath, &other.libpath);
    }

    /// Drop every entry named by `removals`.
    pub fn remove(&mut self, removals: &FlagRemovals) {
        self.ccflags.retain(|f| !removals.ccflags.iter().any(|r| flag_matches(r, f)));
        self.linkflags.retain(|f| !removals.linkflags.iter().any(|r| flag_matches(r, f)));
        self.libs.retain(|l| !removals.libs.contains(l));
        for name in &removals.cppdefines {
            self.undefine(name);
        }
    }
}

/// Entries to drop from accumulated flags.
///
/// A flag ending in `*` matches every flag with that prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlagRemovals {
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libs: Vec<String>,
    pub cppdefines: Vec<String>,
}

impl FlagRemovals {
    pub fn is_empty(&self) -> bool {
        self.ccflags.is_empty()
            && self.linkflags.is_empty()
            && self.libs.is_empty()
            && self.cppdefines.is_empty()
    }
}

fn flag_matches(removal: &str, flag: &str) -> bool {
    match removal.strip_suffix('*') {
        Some(prefix) => flag.starts_with(prefix),
        None => removal == flag,
    }
}

fn extend_unique<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

/// One layer of flag changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagLayer {
    pub add: BuildFlags,
    pub remove: FlagRemovals,
}

impl FlagLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw compiler-style flag strings.
    ///
    /// `-D`, `-U`, `-I`, `-L` and `-l` accept their argument attached or as
    /// the next token. `-Wl,` goes to the linker, `-std=` to C or C++ flags,
    /// anything else to the shared compiler flags.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut layer = Self::new();
        let tokens: Vec<String> = raw.iter().flat_map(|s| split_args(s.as_ref())).collect();
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            let mut arg = |attached: &str| -> Option<String> {
                if attached.is_empty() {
                    iter.next()
                } else {
                    Some(attached.to_string())
                }
            };

            if let Some(rest) = token.strip_prefix("-D") {
                if let Some(def) = arg(rest) {
                    match def.split_once('=') {
                        Some((name, value)) => layer.add.define(name, value),
                        None => layer.add.define_flag(def.as_str()),
                    };
                }
            } else if let Some(rest) = token.strip_prefix("-U") {
                if let Some(name) = arg(rest) {
                    layer.remove.cppdefines.push(name);
                }
            } else if let Some(rest) = token.strip_prefix("-I") {
                if let Some(path) = arg(rest) {
                    layer.add.cpppath.push(PathBuf::from(path));
                }
            } else if let Some(rest) = token.strip_prefix("-L") {
                if let Some(path) = arg(rest) {
                    layer.add.libpath.push(PathBuf::from(path));
                }
            } else if let Some(rest) = token.strip_prefix("-l") {
                if let Some(lib) = arg(rest) {
                    layer.add.libs.push(lib);
                }
            } else if token.starts_with("-Wl,") {
                layer.add.linkflags.push(token);
            } else if let Some(std) = token.strip_prefix("-std=") {
                if std.contains("++") {
                    layer.add.cxxflags.push(token);
                } else {
                    layer.add.cflags.push(token);
                }
            } else if matches!(token.as_str(), "--param" | "-include" | "-imacros" | "-isystem") {
                layer.add.ccflags.push(token);
                if let Some(value) = iter.next() {
                    layer.add.ccflags.push(value);
                }
            } else {
                layer.add.ccflags.push(token);
            }
        }
        layer
    }

    /// Apply removals, then additions, to `flags`.
    pub fn apply(&self, flags: &mut BuildFlags) {
        flags.remove(&self.remove);
        flags.merge(&self.add);
    }

    /// This layer with the entries named by `removals` filtered out of its
    /// additions.
    pub fn without(&self, removals: &FlagRemovals) -> Self {
        let mut add = self.add.clone();
        add.remove(removals);
        Self {
            add,
            remove: self.remove.clone(),
        }
    }
}

/// Apply `layers` in order to an empty flag set.
pub fn merge_layers(layers: &[&FlagLayer]) -> BuildFlags {
    let mut flags = BuildFlags::new();
    for layer in layers {
        layer.apply(&mut flags);
    }
    flags
}

/// Split on whitespace outside double quotes. Quotes are kept.
fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in s.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
