use anyhow::Result;
use clap::ValueEnum;
use handlebars::Handlebars;
use log::debug;
use serde::{Deserialize, Serialize};

use super::cmake::CMakeBuild;
use super::package::EnvMap;
use super::templates::{
    COMMENT, DOCKER_COPY, DOCKER_ENVIRONMENT, DOCKER_RECIPE, DOCKER_SHELL, SINGULARITY_COPY,
    SINGULARITY_ENVIRONMENT, SINGULARITY_RECIPE, SINGULARITY_SHELL,
};

/// Stage name used for the build stage of a full recipe.
pub const BUILD_STAGE: &str = "build";

#[derive(Debug, Default, Clone, Copy, ValueEnum, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Docker,
    Singularity,
}

/// The target environment a fragment is rendered for.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Context {
    pub format: ContainerFormat,
}

impl Context {
    pub fn new(format: ContainerFormat) -> Self {
        Self { format }
    }
}

// Renders the individual recipe instructions for one container format.
pub struct Renderer {
    handlebars: Handlebars<'static>,
}

#[derive(Serialize)]
struct Variable<'a> {
    name: &'a str,
    value: &'a str,
}

impl Renderer {
    pub fn new(ctx: &Context) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        let (shell, copy, environment, recipe) = match ctx.format {
            ContainerFormat::Docker => (DOCKER_SHELL, DOCKER_COPY, DOCKER_ENVIRONMENT, DOCKER_RECIPE),
            ContainerFormat::Singularity => (
                SINGULARITY_SHELL,
                SINGULARITY_COPY,
                SINGULARITY_ENVIRONMENT,
                SINGULARITY_RECIPE,
            ),
        };
        handlebars.register_template_string("comment", COMMENT)?;
        handlebars.register_template_string("shell", shell)?;
        handlebars.register_template_string("copy", copy)?;
        handlebars.register_template_string("environment", environment)?;
        handlebars.register_template_string("recipe", recipe)?;

        Ok(Self { handlebars })
    }

    pub fn comment(&self, text: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Data<'a> {
            text: &'a str,
        }
        Ok(self.handlebars.render("comment", &Data { text })?)
    }

    pub fn shell(&self, commands: &[String]) -> Result<String> {
        #[derive(Serialize)]
        struct Data<'a> {
            commands: &'a [String],
        }
        Ok(self.handlebars.render("shell", &Data { commands })?)
    }

    pub fn copy(&self, from: &str, src: &str, dest: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Data<'a> {
            from: &'a str,
            src: &'a str,
            dest: &'a str,
        }
        Ok(self.handlebars.render("copy", &Data { from, src, dest })?)
    }

    pub fn environment(&self, variables: &EnvMap) -> Result<String> {
        #[derive(Serialize)]
        struct Data<'a> {
            variables: Vec<Variable<'a>>,
        }
        let variables = variables
            .iter()
            .map(|(name, value)| Variable {
                name: name.as_str(),
                value: value.as_str(),
            })
            .collect();
        Ok(self.handlebars.render("environment", &Data { variables })?)
    }
}

/// Renders a complete two-stage recipe: the build stage on `base_image`
/// and a runtime stage on `runtime_image` that only receives the prefix.
pub fn render_recipe(
    build: &CMakeBuild,
    ctx: &Context,
    base_image: &str,
    runtime_image: &str,
) -> Result<String> {
    let renderer = Renderer::new(ctx)?;

    #[derive(Serialize)]
    struct Data<'a> {
        base_image: &'a str,
        runtime_image: &'a str,
        stage: &'a str,
        build: String,
        runtime: String,
    }

    debug!(
        "Rendering {:?} recipe: {} -> {}",
        ctx.format, base_image, runtime_image
    );
    let data = Data {
        base_image,
        runtime_image,
        stage: BUILD_STAGE,
        build: build.render_build(ctx)?,
        runtime: build.render_runtime(ctx, BUILD_STAGE)?,
    };
    Ok(renderer.handlebars.render("recipe", &data)?)
}
