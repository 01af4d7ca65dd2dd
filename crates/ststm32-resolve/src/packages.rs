//! Locations of installed framework packages and build directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ststm32_board::Framework;

use crate::error::{ResolveError, Result};

/// Where frameworks are installed and where generated files go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageDirs {
    /// Framework package roots keyed by framework name.
    #[serde(default)]
    pub frameworks: BTreeMap<String, PathBuf>,
    /// Platform directory of precompiled linker scripts.
    #[serde(default)]
    pub ldscripts: PathBuf,
    /// Directory for generated linker scripts and maps.
    #[serde(default)]
    pub cache: PathBuf,
    /// Root of per-library build directories.
    #[serde(default)]
    pub build: PathBuf,
    /// Project source directory.
    #[serde(default)]
    pub project_src: PathBuf,
}

impl PackageDirs {
    /// Installed package root of `framework`.
    pub fn framework_dir(&self, framework: Framework) -> Result<&Path> {
        let path = self
            .frameworks
            .get(framework.as_str())
            .ok_or_else(|| ResolveError::UnconfiguredPackage {
                package: framework.to_string(),
            })?;
        if !path.is_dir() {
            return Err(ResolveError::MissingPackage {
                package: framework.to_string(),
                path: path.clone(),
            });
        }
        Ok(path)
    }

    /// Package root of `framework` if it is configured and installed.
    pub fn installed(&self, framework: Framework) -> Option<&Path> {
        self.framework_dir(framework).ok()
    }

    /// Set the package root of `framework`.
    pub fn with_framework(mut self, framework: Framework, path: impl Into<PathBuf>) -> Self {
        self.frameworks.insert(framework.as_str().to_string(), path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_framework() {
        let dirs = PackageDirs::default();
        assert!(matches!(
            dirs.framework_dir(Framework::Stm32cube).unwrap_err(),
            ResolveError::UnconfiguredPackage { .. }
        ));
    }

    #[test]
    fn configured_but_missing() {
        let dirs = PackageDirs::default().with_framework(Framework::Spl, "/nonexistent/framework-spl");
        assert!(matches!(
            dirs.framework_dir(Framework::Spl).unwrap_err(),
            ResolveError::MissingPackage { .. }
        ));
        assert!(dirs.installed(Framework::Spl).is_none());
    }

    #[test]
    fn installed_framework() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = PackageDirs::default().with_framework(Framework::Cmsis, dir.path());
        assert_eq!(dirs.framework_dir(Framework::Cmsis).unwrap(), dir.path());
    }

    #[test]
    fn deserialize_package_table() {
        let dirs: PackageDirs = serde_json::from_str(
            r#"{"frameworks": {"stm32cube": "/pkgs/framework-stm32cube"}, "ldscripts": "/pkgs/ldscripts"}"#,
        )
        .unwrap();
        assert_eq!(
            dirs.frameworks["stm32cube"],
            PathBuf::from("/pkgs/framework-stm32cube")
        );
        assert_eq!(dirs.cache, PathBuf::new());
    }
}
