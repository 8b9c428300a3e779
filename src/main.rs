mod blockr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

use blockr::package::BuildSpec;
use blockr::recipe::{ContainerFormat, Context};

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Print debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[arg(long, short, global = true, value_enum, default_value_t = ContainerFormat::Docker)]
    format: ContainerFormat,

    /// Write the result to a file instead of stdout
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SpecOpts {
    /// JSON build spec to start from. Flags below override it.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Archive URL, git repository or local path of the package source
    #[arg(long, short)]
    source: Option<String>,

    #[arg(long, short)]
    directory: Option<String>,

    #[arg(long, short)]
    prefix: Option<String>,

    #[arg(long = "cmake-opt", allow_hyphen_values = true)]
    cmake_opts: Vec<String>,

    #[arg(long, short)]
    build_directory: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    preconfigure: Vec<String>,

    #[arg(long, allow_hyphen_values = true)]
    postinstall: Vec<String>,

    /// NAME=VALUE passed to the configure step
    #[arg(long = "env", value_parser = blockr::utils::parse_env_pair)]
    environment: Vec<(String, String)>,

    #[arg(long)]
    cc: Option<String>,

    #[arg(long)]
    cxx: Option<String>,

    #[arg(long)]
    fc: Option<String>,

    #[arg(long)]
    f77: Option<String>,

    #[arg(long)]
    f90: Option<String>,

    #[arg(long)]
    branch: Option<String>,

    #[arg(long)]
    commit: Option<String>,

    #[arg(long)]
    recursive: bool,

    /// Also build the `check` target
    #[arg(long)]
    check: bool,

    /// Skip the `install` target
    #[arg(long)]
    no_install: bool,

    #[arg(long)]
    ldconfig: bool,

    #[arg(long)]
    parallel: Option<String>,
}

impl SpecOpts {
    // Loads the config file if any, then applies the flag overrides.
    fn resolve(self) -> Result<BuildSpec> {
        let mut spec = match &self.config {
            Some(config) => {
                debug!("Loading build spec from {}", config.display());
                BuildSpec::load(config)?
            }
            None => BuildSpec::default(),
        };

        if let Some(source) = self.source {
            spec.source = Some(source);
        }
        if let Some(directory) = self.directory {
            spec.directory = Some(directory);
        }
        if let Some(prefix) = self.prefix {
            spec.prefix = prefix;
        }
        if let Some(build_directory) = self.build_directory {
            spec.build_directory = Some(build_directory);
        }
        spec.cmake_opts.extend(self.cmake_opts);
        spec.preconfigure.extend(self.preconfigure);
        spec.postinstall.extend(self.postinstall);
        spec.environment.extend(self.environment);

        let tc = &mut spec.toolchain;
        for (field, value) in [
            (&mut tc.cc, self.cc),
            (&mut tc.cxx, self.cxx),
            (&mut tc.fc, self.fc),
            (&mut tc.f77, self.f77),
            (&mut tc.f90, self.f90),
        ] {
            if value.is_some() {
                *field = value;
            }
        }

        if let Some(branch) = self.branch {
            spec.branch = Some(branch);
        }
        if let Some(commit) = self.commit {
            spec.commit = Some(commit);
        }
        if let Some(parallel) = self.parallel {
            spec.parallel = parallel;
        }
        spec.recursive |= self.recursive;
        spec.check |= self.check;
        spec.ldconfig |= self.ldconfig;
        if self.no_install {
            spec.install = false;
        }

        Ok(spec)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[clap(name = "build", about = "Render the build stage fragment.")]
    Build {
        #[clap(flatten)]
        spec: SpecOpts,
    },

    #[clap(name = "runtime", about = "Render the runtime stage fragment.")]
    Runtime {
        #[clap(flatten)]
        spec: SpecOpts,

        /// Stage to copy the installed prefix from
        #[arg(long, default_value = "0")]
        from: String,
    },

    #[clap(name = "recipe", about = "Render a complete two-stage recipe.")]
    Recipe {
        #[clap(flatten)]
        spec: SpecOpts,

        #[arg(long, default_value = "ubuntu:22.04")]
        base_image: String,

        /// Defaults to the base image
        #[arg(long)]
        runtime_image: Option<String>,
    },

    #[clap(
        name = "init",
        about = "Validate the given options and save them as a build spec file."
    )]
    Init {
        #[clap(flatten)]
        spec: SpecOpts,

        #[arg(long, default_value = "blockr.json")]
        path: PathBuf,
    },
}

#[derive(Parser)]
#[command(name = "blockr")]
#[command(about = "Render container build recipes for generic CMake packages.", long_about = None)]
#[command(version)]
pub struct App {
    #[clap(flatten)]
    args: GlobalOpts,

    #[clap(subcommand)]
    command: Command,
}

fn emit(output: Option<PathBuf>, text: String) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, text + "\n")?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn main() -> Result<()> {
    let app = App::parse();
    let args = app.args;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let ctx = Context::new(args.format);

    match app.command {
        Command::Build { spec } => {
            let build = spec.resolve()?.build()?;
            debug!(
                "Source tree {}, build directory {}",
                build.source_dir(),
                build.build_dir()
            );
            emit(args.output, build.render_build(&ctx)?)?;
        }
        Command::Runtime { spec, from } => {
            let build = spec.resolve()?.build()?;
            debug!("Copying {} from stage {}", build.prefix(), from);
            emit(args.output, build.render_runtime(&ctx, &from)?)?;
        }
        Command::Recipe {
            spec,
            base_image,
            runtime_image,
        } => {
            let build = spec.resolve()?.build()?;
            let runtime_image = runtime_image.unwrap_or_else(|| base_image.clone());
            let recipe = blockr::recipe::render_recipe(&build, &ctx, &base_image, &runtime_image)?;
            emit(args.output, recipe.trim_end().to_string())?;
        }
        Command::Init { spec, path } => {
            let spec = spec.resolve()?;
            spec.clone().build()?;
            spec.save(&path)?;
            info!("Saved build spec to {}", path.display());
        }
    }

    Ok(())
}
