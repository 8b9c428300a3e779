// Classifies a source locator and produces the commands that fetch and unpack it.

use super::error::ConfigError;
use super::utils;
use log::debug;

/// Staging area for downloads and unpacked source trees.
pub const STAGING_DIR: &str = "/var/tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

const ARCHIVE_SUFFIXES: &[(&str, ArchiveKind)] = &[
    (".tar.gz", ArchiveKind::TarGz),
    (".tgz", ArchiveKind::TarGz),
    (".tar.bz2", ArchiveKind::TarBz2),
    (".tbz", ArchiveKind::TarBz2),
    (".tar.xz", ArchiveKind::TarXz),
    (".txz", ArchiveKind::TarXz),
    (".tar", ArchiveKind::Tar),
    (".zip", ArchiveKind::Zip),
];

impl ArchiveKind {
    /// Detects the archive format of a file name, returning it with the
    /// suffix stripped. Suffixes match regardless of case.
    pub fn detect(file_name: &str) -> Option<(ArchiveKind, &str)> {
        ARCHIVE_SUFFIXES.iter().find_map(|(suffix, kind)| {
            let split = file_name.len().checked_sub(suffix.len())?;
            if split == 0 || !file_name.is_char_boundary(split) {
                return None;
            }
            let (stem, tail) = file_name.split_at(split);
            tail.eq_ignore_ascii_case(suffix).then_some((*kind, stem))
        })
    }

    fn tar_flag(&self) -> Option<&'static str> {
        match self {
            ArchiveKind::TarGz => Some("-z"),
            ArchiveKind::TarBz2 => Some("-j"),
            ArchiveKind::TarXz => Some("-J"),
            ArchiveKind::Tar | ArchiveKind::Zip => None,
        }
    }

    pub fn extract_command(&self, archive: &str, dest: &str) -> String {
        if matches!(self, ArchiveKind::Zip) {
            return format!("mkdir -p {} && unzip -d {} {}", dest, dest, archive);
        }
        let mut cmd = format!("mkdir -p {} && tar -x -f {} -C {}", dest, archive, dest);
        if let Some(flag) = self.tar_flag() {
            cmd.push(' ');
            cmd.push_str(flag);
        }
        cmd
    }
}

/// Git checkout options, only meaningful for repository sources.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GitRef {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub recursive: bool,
}

impl GitRef {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none() && self.commit.is_none() && !self.recursive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Remote archive downloaded into the staging area
    Url { url: String, archive: ArchiveKind },
    /// Git repository cloned into the staging area
    Repository { url: String, git: GitRef },
    /// Archive already present in the image
    LocalArchive { path: String, archive: ArchiveKind },
    /// Source tree already present in the image
    LocalDirectory { path: String },
}

fn is_remote(locator: &str) -> bool {
    locator.contains("://")
}

// Query strings and fragments are not part of the file name.
fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn is_repository(locator: &str) -> bool {
    locator.starts_with("git@")
        || locator.starts_with("git://")
        || locator.trim_end_matches('/').ends_with(".git")
}

impl Source {
    pub fn parse(locator: &str) -> Result<Self, ConfigError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(ConfigError::MissingSource);
        }

        let source = if is_repository(locator) {
            Source::Repository {
                url: locator.to_string(),
                git: GitRef::default(),
            }
        } else if is_remote(locator) {
            match ArchiveKind::detect(utils::final_segment(strip_query(locator))) {
                Some((archive, _)) => Source::Url {
                    url: locator.to_string(),
                    archive,
                },
                None => return Err(ConfigError::UnsupportedSource(locator.to_string())),
            }
        } else if !locator.starts_with('/') {
            // The generated commands run from an unknown working directory.
            return Err(ConfigError::invalid(
                "source",
                format!("local path {} must be absolute", locator),
            ));
        } else {
            match ArchiveKind::detect(utils::final_segment(locator)) {
                Some((archive, _)) => Source::LocalArchive {
                    path: locator.to_string(),
                    archive,
                },
                None => Source::LocalDirectory {
                    path: locator.trim_end_matches('/').to_string(),
                },
            }
        };
        debug!("Classified source {} as {:?}", locator, source);
        Ok(source)
    }

    /// Attaches git checkout options. Rejects them for anything but a repository.
    pub fn with_git(self, git: GitRef) -> Result<Self, ConfigError> {
        if git.branch.is_some() && git.commit.is_some() {
            return Err(ConfigError::invalid(
                "commit",
                "cannot be combined with branch",
            ));
        }
        match self {
            Source::Repository { url, .. } => Ok(Source::Repository { url, git }),
            other if git.is_empty() => Ok(other),
            other => Err(ConfigError::invalid(
                "branch/commit/recursive",
                format!("only valid for git repositories, not {}", other.locator()),
            )),
        }
    }

    pub fn locator(&self) -> &str {
        match self {
            Source::Url { url, .. } | Source::Repository { url, .. } => url,
            Source::LocalArchive { path, .. } | Source::LocalDirectory { path } => path,
        }
    }

    /// Directory name the source unpacks into when none is given.
    pub fn default_directory(&self) -> String {
        let segment = match self {
            Source::Url { url, .. } => utils::final_segment(strip_query(url)),
            _ => utils::final_segment(self.locator()),
        };
        match self {
            Source::Url { .. } | Source::LocalArchive { .. } => ArchiveKind::detect(segment)
                .map(|(_, stem)| stem)
                .unwrap_or(segment)
                .to_string(),
            Source::Repository { .. } => segment.trim_end_matches(".git").to_string(),
            Source::LocalDirectory { path } => path.clone(),
        }
    }

    /// Location of the archive inside the image, if there is one.
    pub fn archive_path(&self) -> Option<String> {
        match self {
            Source::Url { url, .. } => Some(utils::join_path(
                STAGING_DIR,
                utils::final_segment(strip_query(url)),
            )),
            Source::LocalArchive { path, .. } => Some(path.clone()),
            Source::Repository { .. } | Source::LocalDirectory { .. } => None,
        }
    }

    /// Commands that bring the source into the image.
    pub fn fetch_commands(&self, source_dir: &str) -> Vec<String> {
        match self {
            // Saved under the file name without the query.
            Source::Url { url, .. } if strip_query(url) != url => vec![format!(
                "mkdir -p {} && wget -q --no-check-certificate -O {} {}",
                STAGING_DIR,
                self.archive_path().unwrap_or_default(),
                utils::shell_quote(url)
            )],
            Source::Url { url, .. } => vec![format!(
                "mkdir -p {} && wget -q -nc --no-check-certificate -P {} {}",
                STAGING_DIR,
                STAGING_DIR,
                utils::shell_quote(url)
            )],
            Source::Repository { url, git } => vec![clone_command(url, git, source_dir)],
            Source::LocalArchive { .. } | Source::LocalDirectory { .. } => vec![],
        }
    }

    pub fn unpack_command(&self) -> Option<String> {
        match self {
            Source::Url { archive, .. } | Source::LocalArchive { archive, .. } => {
                let path = self.archive_path()?;
                Some(archive.extract_command(&path, STAGING_DIR))
            }
            Source::Repository { .. } | Source::LocalDirectory { .. } => None,
        }
    }
}

fn clone_command(url: &str, git: &GitRef, dest: &str) -> String {
    let mut opts = vec![];
    if git.commit.is_none() {
        opts.push("--depth=1".to_string());
    }
    if let Some(branch) = &git.branch {
        opts.push(format!("--branch {}", branch));
    }
    if git.recursive {
        opts.push("--recursive".to_string());
    }
    opts.push(url.to_string());
    opts.push(dest.to_string());

    let mut cmd = format!(
        "mkdir -p {} && cd {} && git clone {} && cd -",
        STAGING_DIR,
        STAGING_DIR,
        opts.join(" ")
    );
    if let Some(commit) = &git.commit {
        cmd.push_str(&format!(" && cd {} && git checkout {} && cd -", dest, commit));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_archive_kinds() {
        assert_eq!(
            ArchiveKind::detect("v2018.2.tar.gz"),
            Some((ArchiveKind::TarGz, "v2018.2"))
        );
        assert_eq!(
            ArchiveKind::detect("fftw-3.3.8.tgz"),
            Some((ArchiveKind::TarGz, "fftw-3.3.8"))
        );
        assert_eq!(
            ArchiveKind::detect("boost.tar.bz2"),
            Some((ArchiveKind::TarBz2, "boost"))
        );
        assert_eq!(ArchiveKind::detect("x.tar.xz"), Some((ArchiveKind::TarXz, "x")));
        assert_eq!(ArchiveKind::detect("x.tar"), Some((ArchiveKind::Tar, "x")));
        assert_eq!(ArchiveKind::detect("x.zip"), Some((ArchiveKind::Zip, "x")));
        assert_eq!(
            ArchiveKind::detect("FOO-1.0.TAR.GZ"),
            Some((ArchiveKind::TarGz, "FOO-1.0"))
        );
        assert_eq!(ArchiveKind::detect("Foo.Zip"), Some((ArchiveKind::Zip, "Foo")));
        assert_eq!(ArchiveKind::detect("bar.sh"), None);
        assert_eq!(ArchiveKind::detect(".tar.gz"), None);
    }

    #[test]
    fn test_extract_commands() {
        assert_eq!(
            ArchiveKind::TarGz.extract_command("/var/tmp/a.tar.gz", "/var/tmp"),
            "mkdir -p /var/tmp && tar -x -f /var/tmp/a.tar.gz -C /var/tmp -z"
        );
        assert_eq!(
            ArchiveKind::TarBz2.extract_command("/var/tmp/a.tar.bz2", "/var/tmp"),
            "mkdir -p /var/tmp && tar -x -f /var/tmp/a.tar.bz2 -C /var/tmp -j"
        );
        assert_eq!(
            ArchiveKind::TarXz.extract_command("/var/tmp/a.txz", "/var/tmp"),
            "mkdir -p /var/tmp && tar -x -f /var/tmp/a.txz -C /var/tmp -J"
        );
        assert_eq!(
            ArchiveKind::Tar.extract_command("/var/tmp/a.tar", "/var/tmp"),
            "mkdir -p /var/tmp && tar -x -f /var/tmp/a.tar -C /var/tmp"
        );
        assert_eq!(
            ArchiveKind::Zip.extract_command("/var/tmp/a.zip", "/var/tmp"),
            "mkdir -p /var/tmp && unzip -d /var/tmp /var/tmp/a.zip"
        );
    }

    #[test]
    fn test_parse_url() {
        let source =
            Source::parse("https://github.com/gromacs/gromacs/archive/v2018.2.tar.gz").unwrap();
        assert!(matches!(
            source,
            Source::Url {
                archive: ArchiveKind::TarGz,
                ..
            }
        ));
        assert_eq!(source.default_directory(), "v2018.2");
        assert_eq!(
            source.archive_path(),
            Some("/var/tmp/v2018.2.tar.gz".to_string())
        );
    }

    #[test]
    fn test_parse_url_with_query() {
        let source = Source::parse("https://example.com/dl/fftw-3.3.8.tar.gz?raw=true").unwrap();
        assert_eq!(source.default_directory(), "fftw-3.3.8");
        assert_eq!(
            source.archive_path(),
            Some("/var/tmp/fftw-3.3.8.tar.gz".to_string())
        );

        let fragment = Source::parse("https://example.com/dl/fftw-3.3.8.tar.gz#sha256=ab").unwrap();
        assert_eq!(fragment.default_directory(), "fftw-3.3.8");
    }

    #[test]
    fn test_fetch_url_with_query() {
        let source =
            Source::parse("https://example.com/dl/fftw-3.3.8.tar.gz?raw=true&x=1").unwrap();
        assert_eq!(
            source.fetch_commands("/var/tmp/fftw-3.3.8"),
            vec!["mkdir -p /var/tmp && wget -q --no-check-certificate -O /var/tmp/fftw-3.3.8.tar.gz 'https://example.com/dl/fftw-3.3.8.tar.gz?raw=true&x=1'".to_string()]
        );
    }

    #[test]
    fn test_parse_uppercase_suffix() {
        let source = Source::parse("https://host/FOO.TAR.GZ").unwrap();
        assert!(matches!(
            source,
            Source::Url {
                archive: ArchiveKind::TarGz,
                ..
            }
        ));
        assert_eq!(source.default_directory(), "FOO");
        assert_eq!(source.archive_path(), Some("/var/tmp/FOO.TAR.GZ".to_string()));
    }

    #[test]
    fn test_parse_relative_local_path() {
        for locator in ["src/spdlog", "./spdlog-1.4.2.tar.gz", "spdlog"] {
            assert!(
                matches!(
                    Source::parse(locator),
                    Err(ConfigError::InvalidOption { .. })
                ),
                "{}",
                locator
            );
        }
    }

    #[test]
    fn test_parse_missing() {
        assert_eq!(Source::parse(""), Err(ConfigError::MissingSource));
        assert_eq!(Source::parse("   "), Err(ConfigError::MissingSource));
    }

    #[test]
    fn test_parse_unsupported_url() {
        assert_eq!(
            Source::parse("https://foo/bar.sh"),
            Err(ConfigError::UnsupportedSource("https://foo/bar.sh".to_string()))
        );
    }

    #[test]
    fn test_parse_repositories() {
        for locator in [
            "https://github.com/gabime/spdlog.git",
            "git@github.com:gabime/spdlog.git",
            "git://example.com/spdlog",
        ] {
            let source = Source::parse(locator).unwrap();
            assert!(matches!(source, Source::Repository { .. }), "{}", locator);
            assert_eq!(source.default_directory(), "spdlog");
            assert_eq!(source.archive_path(), None);
            assert_eq!(source.unpack_command(), None);
        }
    }

    #[test]
    fn test_parse_local() {
        let archive = Source::parse("/opt/src/spdlog-1.4.2.tar.bz2").unwrap();
        assert!(matches!(archive, Source::LocalArchive { .. }));
        assert_eq!(archive.default_directory(), "spdlog-1.4.2");
        assert_eq!(
            archive.unpack_command(),
            Some("mkdir -p /var/tmp && tar -x -f /opt/src/spdlog-1.4.2.tar.bz2 -C /var/tmp -j".to_string())
        );
        assert!(archive.fetch_commands("/var/tmp/spdlog-1.4.2").is_empty());

        let dir = Source::parse("/opt/src/spdlog/").unwrap();
        assert_eq!(
            dir,
            Source::LocalDirectory {
                path: "/opt/src/spdlog".to_string()
            }
        );
        assert_eq!(dir.default_directory(), "/opt/src/spdlog");
        assert!(dir.fetch_commands("/opt/src/spdlog").is_empty());
        assert_eq!(dir.unpack_command(), None);
    }

    #[test]
    fn test_fetch_url() {
        let source = Source::parse("https://github.com/gabime/spdlog/archive/v1.4.2.tar.gz").unwrap();
        assert_eq!(
            source.fetch_commands("/var/tmp/spdlog-1.4.2"),
            vec!["mkdir -p /var/tmp && wget -q -nc --no-check-certificate -P /var/tmp https://github.com/gabime/spdlog/archive/v1.4.2.tar.gz".to_string()]
        );
    }

    #[test]
    fn test_clone_variants() {
        let url = "https://github.com/gabime/spdlog.git";
        let plain = Source::parse(url).unwrap();
        assert_eq!(
            plain.fetch_commands("/var/tmp/spdlog"),
            vec!["mkdir -p /var/tmp && cd /var/tmp && git clone --depth=1 https://github.com/gabime/spdlog.git /var/tmp/spdlog && cd -".to_string()]
        );

        let branch = Source::parse(url)
            .unwrap()
            .with_git(GitRef {
                branch: Some("v1.4.2".to_string()),
                recursive: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            branch.fetch_commands("/var/tmp/spdlog"),
            vec!["mkdir -p /var/tmp && cd /var/tmp && git clone --depth=1 --branch v1.4.2 --recursive https://github.com/gabime/spdlog.git /var/tmp/spdlog && cd -".to_string()]
        );

        let commit = Source::parse(url)
            .unwrap()
            .with_git(GitRef {
                commit: Some("a1b2c3".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            commit.fetch_commands("/var/tmp/spdlog"),
            vec!["mkdir -p /var/tmp && cd /var/tmp && git clone https://github.com/gabime/spdlog.git /var/tmp/spdlog && cd - && cd /var/tmp/spdlog && git checkout a1b2c3 && cd -".to_string()]
        );
    }

    #[test]
    fn test_with_git_rejects_conflicts() {
        let err = Source::parse("https://github.com/gabime/spdlog.git")
            .unwrap()
            .with_git(GitRef {
                branch: Some("v1".to_string()),
                commit: Some("abc".to_string()),
                recursive: false,
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));
    }

    #[test]
    fn test_with_git_rejects_non_repository() {
        let source = Source::parse("https://example.com/a.tar.gz").unwrap();
        assert!(source
            .clone()
            .with_git(GitRef {
                recursive: true,
                ..Default::default()
            })
            .is_err());
        assert_eq!(source.clone().with_git(GitRef::default()), Ok(source));
    }
}
