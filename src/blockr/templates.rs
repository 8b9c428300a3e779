// Instruction templates, one set per container format.
// Rendered with HTML escaping disabled.

pub static COMMENT: &str = "# {{text}}";

pub static DOCKER_SHELL: &str =
    "RUN {{#each commands}}{{#unless @first}} && \\\n    {{/unless}}{{this}}{{/each}}";

pub static DOCKER_COPY: &str = "COPY --from={{from}} {{src}} {{dest}}";

pub static DOCKER_ENVIRONMENT: &str =
    "ENV {{#each variables}}{{#unless @first}} \\\n    {{/unless}}{{name}}={{value}}{{/each}}";

pub static SINGULARITY_SHELL: &str = "%post\n    cd /{{#each commands}}\n    {{this}}{{/each}}";

pub static SINGULARITY_COPY: &str = "%files from {{from}}\n    {{src}} {{dest}}";

pub static SINGULARITY_ENVIRONMENT: &str = "%environment{{#each variables}}\n    export {{name}}={{value}}{{/each}}\n%post{{#each variables}}\n    export {{name}}={{value}}{{/each}}";

pub static DOCKER_RECIPE: &str = "FROM {{base_image}} AS {{stage}}\n\n{{build}}\n\nFROM {{runtime_image}}\n\n{{runtime}}\n";

pub static SINGULARITY_RECIPE: &str = "BootStrap: docker\nFrom: {{base_image}}\nStage: {{stage}}\n\n{{build}}\n\nBootStrap: docker\nFrom: {{runtime_image}}\n\n{{runtime}}\n";
