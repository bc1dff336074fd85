//! Load pipeline: merge, default, resolve, validate
//!
//! ```text
//! files ──merge──> tree ──defaults──> tree ──resolve──> context ──validate──> ProjectDefinition
//! ```
//!
//! For definition version `1` templates in `native_app`, `snowpark` and `streamlit` are left as they are (a single
//! warning is emitted) and defaults only reach the typed model, the context keeps the tree as written.
use crate::definition_files::{DefinitionFiles, LoadError};
use crate::environment::{Ambient, ProjectEnvironment};
use crate::schema::defaults::apply_defaults;
use crate::schema::{DefinitionVersion, ProjectDefinition, SchemaError};
use crate::template::{Resolver, TemplateContext, TemplateError, TemplatingFunctions};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;

/// Sections whose templates are ignored by definition version `1`
const UNTEMPLATED_SECTIONS: &[&str] = &["native_app", "snowpark", "streamlit"];

/// Values supplied by the invoking command
///
/// Corresponds to `{"ctx": {"env": {...}}}`. Override values are never template-expanded.
#[derive(Debug, Clone, Default, PartialEq, derive_new::new)]
pub struct OverrideContext {
    pub env: IndexMap<String, String>,
}

impl OverrideContext {
    /// Build from `KEY=VALUE` pairs, the last assignment of a key wins
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            env: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// A validated definition together with its resolved context
#[derive(Debug, Clone)]
pub struct RenderedDefinition {
    pub project_definition: ProjectDefinition,
    pub project_context: TemplateContext,
    /// Non fatal findings, also logged via tracing
    pub warnings: Vec<String>,
}

impl RenderedDefinition {
    pub fn definition_version(&self) -> DefinitionVersion {
        self.project_definition.definition_version()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DefinitionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Resolve references in a merged tree and validate the result
pub fn render_definition_template(
    mut tree: Value,
    overrides: &OverrideContext,
    ambient: &Ambient,
) -> Result<RenderedDefinition, DefinitionError> {
    let version = DefinitionVersion::from_tree(&tree)?;
    let username = ambient.sanitized_username();
    tracing::debug!(%version, %username, "rendering project definition");

    let mut environment =
        ProjectEnvironment::new(IndexMap::new(), overrides.env.clone()).with_ambient(ambient.clone());

    let (functions, suppressed_sections) = if version.supports_templating() {
        apply_defaults(&mut tree, version, &username);
        (Some(TemplatingFunctions::new(username.clone())), &[] as &[&str])
    } else {
        (None, UNTEMPLATED_SECTIONS)
    };

    let resolution = Resolver::new(tree, &environment, functions.as_ref(), suppressed_sections).resolve()?;

    let project_definition = if version.supports_templating() {
        ProjectDefinition::from_tree(&resolution.tree, version)?
    } else {
        let mut typed = resolution.tree.clone();
        apply_defaults(&mut typed, version, &username);
        ProjectDefinition::from_tree(&typed, version)?
    };

    environment.set_default_env(project_definition.env().cloned().unwrap_or_default());

    Ok(RenderedDefinition {
        project_definition,
        project_context: TemplateContext::new(resolution.tree, environment, functions),
        warnings: resolution.warnings,
    })
}

/// Merge loaded files and render them
pub fn render_files(
    files: &DefinitionFiles,
    overrides: &OverrideContext,
    ambient: &Ambient,
) -> Result<RenderedDefinition, DefinitionError> {
    render_definition_template(files.merged()?, overrides, ambient)
}

/// Load `paths` in order and render the merged definition
pub fn load_project<P: AsRef<Path>>(
    paths: &[P],
    overrides: &OverrideContext,
    ambient: &Ambient,
) -> Result<RenderedDefinition, DefinitionError> {
    let files = DefinitionFiles::load_files(paths)?;
    render_files(&files, overrides, ambient)
}
