use serde::{Deserialize, Serialize};

/// Compilers and flags handed to the configure step.
///
/// Each set field becomes a `NAME=value` assignment in front of the
/// `cmake` invocation, in the order returned by [`Toolchain::variables`].
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Toolchain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cppflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuda_home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cxx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cxxflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f77: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f90: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flibs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ld_library_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libs: Option<String>,
}

impl Toolchain {
    /// The set variables, sorted by name.
    pub fn variables(&self) -> Vec<(&'static str, &str)> {
        [
            ("CC", &self.cc),
            ("CFLAGS", &self.cflags),
            ("CPPFLAGS", &self.cppflags),
            ("CUDA_HOME", &self.cuda_home),
            ("CXX", &self.cxx),
            ("CXXFLAGS", &self.cxxflags),
            ("F77", &self.f77),
            ("F90", &self.f90),
            ("FC", &self.fc),
            ("FCFLAGS", &self.fcflags),
            ("FFLAGS", &self.fflags),
            ("FLIBS", &self.flibs),
            ("LDFLAGS", &self.ldflags),
            ("LD_LIBRARY_PATH", &self.ld_library_path),
            ("LIBS", &self.libs),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}
