//! Compiler configuration
//!
//! §6 lists the CLI flags directly; this module additionally accepts an
//! optional `cnext.toml` project file (teacher precedent: `lint.rs` loading
//! lint TOML config) supplying defaults that CLI flags override.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fs::FileSystem;

pub const PROJECT_CONFIG_FILE: &str = "cnext.toml";

/// Resolved configuration for one compiler invocation: the union of
/// `cnext.toml` defaults and CLI overrides (§6, §A.3).
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    pub cpp: bool,
    pub out_dir: PathBuf,
    pub header_out_dir: Option<PathBuf>,
    pub base_path: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub target: String,
    pub debug: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            cpp: false,
            out_dir: PathBuf::from("."),
            header_out_dir: None,
            base_path: PathBuf::from("."),
            include_dirs: Vec::new(),
            target: "host".to_string(),
            debug: false,
        }
    }
}

impl CompilerConfig {
    /// Overlays a project file's values onto `self`; `None` fields in
    /// `file` leave the current value untouched. CLI flags are applied by
    /// the caller *after* this, so they always win.
    pub fn apply_file(&mut self, file: ProjectFileConfig) {
        if let Some(cpp) = file.cpp {
            self.cpp = cpp;
        }
        if let Some(out) = file.out {
            self.out_dir = out;
        }
        if let Some(header_out) = file.header_out {
            self.header_out_dir = Some(header_out);
        }
        if let Some(target) = file.target {
            self.target = target;
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        self.include_dirs.extend(file.include);
    }
}

/// The subset of `CompilerConfig` a `cnext.toml` may supply. Every field is
/// optional so a project file only needs to name the defaults it cares
/// about.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProjectFileConfig {
    pub cpp: Option<bool>,
    pub out: Option<PathBuf>,
    pub header_out: Option<PathBuf>,
    #[serde(default)]
    pub include: Vec<PathBuf>,
    pub target: Option<String>,
    pub debug: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads `cnext.toml` from `base_path` if present. A missing file is not an
/// error (`Ok(None)`); a present-but-unparsable file is, leaving the
/// decision to fall back to defaults up to the caller, per §A.3.
pub fn load_project_config(fs: &dyn FileSystem, base_path: &Path) -> Result<Option<ProjectFileConfig>, ConfigError> {
    let path = base_path.join(PROJECT_CONFIG_FILE);
    if !fs.is_file(&path) {
        return Ok(None);
    }
    let text = fs.read(&path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    let parsed = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn missing_project_file_is_not_an_error() {
        let fs = MockFileSystem::new();
        let result = load_project_config(&fs, Path::new("/proj")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn loads_and_applies_project_file() {
        let fs = MockFileSystem::new().with_file(
            "/proj/cnext.toml",
            "cpp = true\nout = \"build\"\ninclude = [\"vendor\"]\ntarget = \"cortex-m4\"\n",
        );
        let file = load_project_config(&fs, Path::new("/proj")).unwrap().unwrap();
        let mut config = CompilerConfig::default();
        config.apply_file(file);
        assert!(config.cpp);
        assert_eq!(config.out_dir, PathBuf::from("build"));
        assert_eq!(config.include_dirs, vec![PathBuf::from("vendor")]);
        assert_eq!(config.target, "cortex-m4");
    }

    #[test]
    fn malformed_project_file_is_an_error() {
        let fs = MockFileSystem::new().with_file("/proj/cnext.toml", "cpp = not-a-bool\n");
        assert!(load_project_config(&fs, Path::new("/proj")).is_err());
    }

    #[test]
    fn cli_override_after_apply_file_wins() {
        let fs = MockFileSystem::new().with_file("/proj/cnext.toml", "cpp = false\n");
        let file = load_project_config(&fs, Path::new("/proj")).unwrap().unwrap();
        let mut config = CompilerConfig::default();
        config.apply_file(file);
        config.cpp = true; // simulates a `--cpp` CLI flag applied after file defaults
        assert!(config.cpp);
    }
}
