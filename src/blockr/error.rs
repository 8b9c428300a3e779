use thiserror::Error;

/// Errors raised while validating a build spec.
///
/// These are fatal: a `CMakeBuild` is never constructed from a spec that
/// produces one of them.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// No source locator was supplied
    #[error("No source given. Specify a URL, git repository or local path.")]
    MissingSource,

    /// The locator is not a recognised archive, repository or local path
    #[error("Unrecognized source: {0}. Expected a .tar, .tar.gz, .tgz, .tar.bz2, .tbz, .tar.xz, .txz or .zip archive, or a git repository")]
    UnsupportedSource(String),

    /// An option is malformed or conflicts with another one
    #[error("Invalid option {field}: {reason}")]
    InvalidOption { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidOption {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_message() {
        assert!(ConfigError::MissingSource.to_string().contains("No source"));
    }

    #[test]
    fn test_unsupported_source_message() {
        let err = ConfigError::UnsupportedSource("https://foo/bar.sh".to_string());
        assert!(err.to_string().contains("https://foo/bar.sh"));
    }

    #[test]
    fn test_invalid_option_message() {
        let err = ConfigError::invalid("commit", "conflicts with branch");
        assert_eq!(
            err.to_string(),
            "Invalid option commit: conflicts with branch"
        );
    }
}
