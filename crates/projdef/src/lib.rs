//! # projdef - project definitions
//!
//! Loads `snowflake.yml` project definitions, resolves `<% ... %>` references and validates the result against the
//! schema of the declared `definition_version`.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `projdef` works internally.
//!
//! ### Definition files
//!
//! A project definition is one or more yaml documents. This is a valid definition:
//! ```yaml
//! definition_version: 1.1
//! env:
//!   suffix: dev
//! native_app:
//!   name: my_app_<% ctx.env.suffix %>
//!   artifacts:
//!     - setup.sql
//!     - src: app/*
//!       dest: ./
//! ```
//!
//! ### Loading files
//!
//! Every document is parsed into a [value::Value] tree. All scalars are kept as strings at this point (`1.1` above
//! is the string `"1.1"`) so nothing is coerced before templates are resolved. [definition_files::DefinitionFiles]
//! keeps the documents together with their source path and merges them left to right: mappings merge key by key,
//! anything else is replaced by the later document.
//!
//! [project::DefinitionManager] picks the files of a project: `snowflake.yml` and, if present,
//! `snowflake.local.yml`.
//!
//! ### Defaults
//!
//! see [schema::defaults::apply_defaults]
//!
//! Version specific defaults are written into the merged tree before references are resolved, so a template can
//! refer to e.g. `ctx.native_app.package.name` even when the file doesn't set it.
//!
//! ### Resolution
//!
//! see [template::Resolver]
//!
//! The tree is exposed to templates as `ctx`, built-in functions as `fn`. Each string leaf is visited in document
//! order. When it contains `<% ... %>` segments the referenced paths are resolved first (on demand) and the result
//! is written back into the tree.
//!
//! **Example**
//!
//! | **path**           | **raw**                             | **resolved**       |
//! |--------------------|-------------------------------------|--------------------|
//! | `env.suffix`       | `dev`                               | `dev`              |
//! | `native_app.name`  | `my_app_<% ctx.env.suffix %>`       | `my_app_dev`       |
//! | `env.app`          | `<% ctx.native_app.name %>`         | `my_app_dev`       |
//!
//! `ctx.env.<name>` is special: command line overrides and the process environment win over the `env` section and
//! their values are used verbatim (see [environment::ProjectEnvironment]).
//!
//! A value that is exactly one reference keeps the type of what it refers to, otherwise the parts are concatenated
//! into a string.
//!
//! ### Validation
//!
//! see [schema::ProjectDefinition::from_tree]
//!
//! The resolved tree is converted into the typed model of its version. Version `2` replaces the flat sections with
//! `entities` whose `type` selects the model.
//!
//! ### Entities
//!
//! see [workspace::WorkspaceManager]
//!
//! Version `2` entities are wrapped by handlers that perform actions (`bundle`, `deploy`, ...). Statements go through
//! a [workspace::sql::SqlExecutor].
//!
pub mod definition;
pub mod definition_files;
pub mod environment;
pub mod identifiers;
pub mod project;
pub mod schema;
pub mod template;
pub mod value;
mod visit;
pub mod workspace;

pub use definition::{
    load_project, render_definition_template, DefinitionError, OverrideContext, RenderedDefinition,
};
