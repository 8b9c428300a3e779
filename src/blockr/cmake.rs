// The generic CMake building block: download, configure, build, install, clean up.

use anyhow::Result;
use log::{debug, warn};

use super::error::ConfigError;
use super::package::{BuildSpec, EnvMap};
use super::recipe::{Context, Renderer};
use super::source::{GitRef, Source, STAGING_DIR};
use super::utils;

/// A validated CMake package build, ready to be rendered.
#[derive(Debug, Clone)]
pub struct CMakeBuild {
    spec: BuildSpec,
    source: Source,
    source_dir: String,
    build_dir: String,
}

fn check_env_names(field: &str, env: &EnvMap) -> Result<(), ConfigError> {
    match env.keys().find(|name| !utils::is_valid_var_name(name)) {
        Some(name) => Err(ConfigError::invalid(
            field,
            format!("{} is not a valid variable name", name),
        )),
        None => Ok(()),
    }
}

impl CMakeBuild {
    pub fn new(spec: BuildSpec) -> Result<Self, ConfigError> {
        let locator = spec.source.as_deref().ok_or(ConfigError::MissingSource)?;
        let git = GitRef {
            branch: spec.branch.clone(),
            commit: spec.commit.clone(),
            recursive: spec.recursive,
        };
        let source = Source::parse(locator)?.with_git(git)?;

        if spec.prefix.trim().is_empty() {
            return Err(ConfigError::invalid("prefix", "must not be empty"));
        }
        check_env_names("environment", &spec.environment)?;
        check_env_names("devel_environment", &spec.devel_environment)?;
        check_env_names("runtime_environment", &spec.runtime_environment)?;

        let source_dir = match &source {
            Source::LocalDirectory { path } => {
                if spec.directory.is_some() {
                    warn!("Ignoring directory for local source tree {}", path);
                }
                path.clone()
            }
            _ => {
                let directory = spec
                    .directory
                    .clone()
                    .unwrap_or_else(|| source.default_directory());
                utils::join_path(STAGING_DIR, &directory)
            }
        };
        let build_dir = spec
            .build_directory
            .clone()
            .unwrap_or_else(|| format!("{}/build", source_dir));
        debug!("Source directory: {}, build directory: {}", source_dir, build_dir);

        Ok(Self {
            spec,
            source,
            source_dir,
            build_dir,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.spec.prefix
    }

    pub fn source_dir(&self) -> &str {
        &self.source_dir
    }

    pub fn build_dir(&self) -> &str {
        &self.build_dir
    }

    fn configure_command(&self) -> String {
        let mut cmd = format!("mkdir -p {} && cd {} && ", self.build_dir, self.build_dir);
        for (name, value) in &self.spec.environment {
            cmd.push_str(&format!("{}={} ", name, utils::shell_quote(value)));
        }
        for (name, value) in self.spec.toolchain.variables() {
            cmd.push_str(&format!("{}={} ", name, utils::shell_quote(value)));
        }
        cmd.push_str(&format!("cmake -DCMAKE_INSTALL_PREFIX={}", self.spec.prefix));
        for opt in &self.spec.cmake_opts {
            cmd.push(' ');
            cmd.push_str(opt);
        }
        cmd.push(' ');
        cmd.push_str(&self.source_dir);
        cmd
    }

    fn build_target(&self, target: &str) -> String {
        format!(
            "cmake --build {} --target {} -- -j{}",
            self.build_dir, target, self.spec.parallel
        )
    }

    pub fn ldconfig_command(&self) -> Option<String> {
        if !self.spec.ldconfig {
            return None;
        }
        Some(format!(
            "echo \"{}/lib\" >> /etc/ld.so.conf.d/{}.conf && ldconfig",
            self.spec.prefix.trim_end_matches('/'),
            utils::final_segment(&self.source_dir)
        ))
    }

    fn cleanup_command(&self) -> Option<String> {
        let mut targets = vec![];
        if let Source::Url { .. } = self.source {
            targets.extend(self.source.archive_path());
        }
        match self.source {
            // A local tree belongs to the caller; only the build output goes.
            Source::LocalDirectory { .. } => targets.push(self.build_dir.clone()),
            _ => {
                targets.push(self.source_dir.clone());
                if !utils::is_within(&self.build_dir, &self.source_dir) {
                    targets.push(self.build_dir.clone());
                }
            }
        }
        if targets.is_empty() {
            return None;
        }
        Some(format!("rm -rf {}", targets.join(" ")))
    }

    /// The full build-stage command sequence, in execution order.
    pub fn build_commands(&self) -> Vec<String> {
        let mut commands = self.source.fetch_commands(&self.source_dir);
        commands.extend(self.source.unpack_command());

        if !self.spec.preconfigure.is_empty() {
            commands.push(format!("cd {}", self.source_dir));
            commands.extend(self.spec.preconfigure.iter().cloned());
        }

        commands.push(self.configure_command());
        commands.push(self.build_target("all"));
        if self.spec.check {
            commands.push(self.build_target("check"));
        }
        if self.spec.install {
            commands.push(self.build_target("install"));
        }

        if !self.spec.postinstall.is_empty() {
            commands.push(format!("cd {}", self.spec.prefix));
            commands.extend(self.spec.postinstall.iter().cloned());
        }

        commands.extend(self.ldconfig_command());
        commands.extend(self.cleanup_command());
        commands
    }

    /// Renders the build-stage fragment.
    pub fn render_build(&self, ctx: &Context) -> Result<String> {
        let renderer = Renderer::new(ctx)?;
        let mut sections = vec![
            renderer.comment(self.source.locator())?,
            renderer.shell(&self.build_commands())?,
        ];
        if !self.spec.devel_environment.is_empty() {
            sections.push(renderer.environment(&self.spec.devel_environment)?);
        }
        Ok(sections.join("\n"))
    }

    /// Renders the runtime-stage fragment, copying the prefix out of stage `from`.
    pub fn render_runtime(&self, ctx: &Context, from: &str) -> Result<String> {
        let renderer = Renderer::new(ctx)?;
        let mut sections = vec![
            renderer.comment(self.source.locator())?,
            renderer.copy(from, &self.spec.prefix, &self.spec.prefix)?,
        ];
        if let Some(ldconfig) = self.ldconfig_command() {
            sections.push(renderer.shell(&[ldconfig])?);
        }
        if !self.spec.runtime_environment.is_empty() {
            sections.push(renderer.environment(&self.spec.runtime_environment)?);
        }
        Ok(sections.join("\n"))
    }
}
