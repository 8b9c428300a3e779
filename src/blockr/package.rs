use super::cmake::CMakeBuild;
use super::error::ConfigError;
use super::toolchain::Toolchain;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PREFIX: &str = "/usr/local";
pub const DEFAULT_PARALLEL: &str = "$(nproc)";

/// Ordered `NAME -> value` mapping. Insertion order is kept when rendering.
pub type EnvMap = IndexMap<String, String>;

// BuildSpec is the caller-facing description of a CMake package build.
//
// Every field but `source` has a default, so a JSON spec only needs to name
// what differs from it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BuildSpec {
    /// Archive URL, git repository or local path. Required.
    pub source: Option<String>,
    /// Name of the unpacked source directory. Derived from `source` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub prefix: String,
    pub cmake_opts: Vec<String>,
    /// Out of tree build directory. Defaults to `<directory>/build`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_directory: Option<String>,
    pub preconfigure: Vec<String>,
    pub postinstall: Vec<String>,
    pub environment: EnvMap,
    pub toolchain: Toolchain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub recursive: bool,
    pub check: bool,
    pub install: bool,
    pub ldconfig: bool,
    pub parallel: String,
    pub devel_environment: EnvMap,
    pub runtime_environment: EnvMap,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            source: None,
            directory: None,
            prefix: DEFAULT_PREFIX.to_string(),
            cmake_opts: vec![],
            build_directory: None,
            preconfigure: vec![],
            postinstall: vec![],
            environment: EnvMap::new(),
            toolchain: Toolchain::default(),
            branch: None,
            commit: None,
            recursive: false,
            check: false,
            install: true,
            ldconfig: false,
            parallel: DEFAULT_PARALLEL.to_string(),
            devel_environment: EnvMap::new(),
            runtime_environment: EnvMap::new(),
        }
    }
}

#[cfg(test)]
impl BuildSpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }
}

impl BuildSpec {
    pub fn load(spec_file: &Path) -> Result<Self> {
        let spec_json = std::fs::read_to_string(spec_file)?;
        let spec: BuildSpec = serde_json::from_str(&spec_json)?;
        Ok(spec)
    }

    pub fn save(&self, spec_file: &Path) -> Result<()> {
        let spec_json = serde_json::to_string_pretty(&self)?;
        std::fs::write(spec_file, spec_json)?;
        Ok(())
    }

    /// Validates the spec and turns it into a renderable build.
    pub fn build(self) -> Result<CMakeBuild, ConfigError> {
        CMakeBuild::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_spec_defaults() {
        let spec = BuildSpec::default();
        assert_eq!(spec.source, None);
        assert_eq!(spec.prefix, "/usr/local");
        assert_eq!(spec.parallel, "$(nproc)");
        assert!(spec.install);
        assert!(!spec.check);
        assert!(!spec.ldconfig);
        assert!(spec.cmake_opts.is_empty());
        assert!(spec.environment.is_empty());
        assert!(spec.toolchain.variables().is_empty());
    }

    #[test]
    fn test_build_spec_partial_json() {
        let spec: BuildSpec = serde_json::from_str(
            r#"{
                "source": "https://github.com/gabime/spdlog/archive/v1.4.2.tar.gz",
                "directory": "spdlog-1.4.2",
                "environment": {"ZED": "1", "ALPHA": "2"},
                "toolchain": {"CC": "gcc"}
            }"#,
        )
        .unwrap();
        assert_eq!(spec.directory.as_deref(), Some("spdlog-1.4.2"));
        assert_eq!(spec.prefix, "/usr/local");
        assert!(spec.install);
        // Insertion order, not sorted
        let names: Vec<&String> = spec.environment.keys().collect();
        assert_eq!(names, vec!["ZED", "ALPHA"]);
        assert_eq!(spec.toolchain.cc.as_deref(), Some("gcc"));
    }

    #[test]
    fn test_build_spec_load_and_save() {
        let temp_dir = TempDir::new().unwrap();
        let spec_file = temp_dir.path().join("blockr.json");

        let mut original = BuildSpec::new("https://github.com/gromacs/gromacs/archive/v2018.2.tar.gz");
        original.directory = Some("gromacs-2018.2".to_string());
        original.prefix = "/usr/local/gromacs".to_string();
        original.cmake_opts = vec!["-D GMX_GPU=ON".to_string()];
        original
            .environment
            .insert("FOO".to_string(), "BAR".to_string());

        original.save(&spec_file).unwrap();
        let loaded = BuildSpec::load(&spec_file).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_build_spec_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let spec_file = temp_dir.path().join("blockr.json");
        std::fs::write(&spec_file, "invalid json").unwrap();

        assert!(BuildSpec::load(&spec_file).is_err());
    }

    #[test]
    fn test_build_spec_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(BuildSpec::load(&temp_dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_build_without_source_fails() {
        let result = BuildSpec::default().build();
        assert!(matches!(result, Err(ConfigError::MissingSource)));
    }
}
