//! `<% ... %>` reference expressions
//!
//! See [resolver] for how references are resolved and [parser] for the accepted syntax.
mod functions;
pub mod parser;
mod resolver;

pub use functions::TemplatingFunctions;
pub use resolver::{Resolution, Resolver};

use crate::environment::ProjectEnvironment;
use crate::value::{PathSegment, Value};

pub const TEMPLATING_IGNORED_WARNING: &str = "Ignoring template pattern in project definition file. \
Update 'definition_version' to 1.1 or later in snowflake.yml to enable template expansion.";

/// Whether `text` looks like it was meant to contain a reference
pub fn has_template_markers(text: &str) -> bool {
    text.contains(parser::OPEN)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Could not find template variable {0}")]
    UnknownVariable(String),
    #[error("Template variable {0} does not have a scalar value")]
    NonScalar(String),
    #[error("Cycle detected in templating variable {0}")]
    CycleDetected(String),
    #[error("Template variable {0} exceeds the maximum reference depth of {1}")]
    TooDeep(String, usize),
    #[error("Unexpected templating syntax in {0}")]
    UnexpectedSyntax(String),
    #[error("Error parsing template from project definition file. Value: '{raw}'. Error: {reason}")]
    Parse { raw: String, reason: String },
    #[error("{function} requires at least {count} argument(s)")]
    TooFewArguments { function: String, count: usize },
    #[error("{function} supports at most {count} argument(s)")]
    TooManyArguments { function: String, count: usize },
    #[error("{function} only accepts String values")]
    NonStringArgument { function: String },
}

/// The resolved `ctx`/`env`/`fn` view of a definition
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    ctx: Value,
    env: ProjectEnvironment,
    functions: Option<TemplatingFunctions>,
}

impl TemplateContext {
    pub(crate) fn new(
        ctx: Value,
        env: ProjectEnvironment,
        functions: Option<TemplatingFunctions>,
    ) -> Self {
        Self { ctx, env, functions }
    }

    /// The resolved definition tree
    pub fn ctx(&self) -> &Value {
        &self.ctx
    }

    pub fn env(&self) -> &ProjectEnvironment {
        &self.env
    }

    /// `None` when the definition version does not support templating
    pub fn functions(&self) -> Option<&TemplatingFunctions> {
        self.functions.as_ref()
    }

    /// Look up a dotted `ctx.` path
    ///
    /// `ctx.env.<name>` goes through the environment layers, everything else reads the resolved tree.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').collect();

        match segments.as_slice() {
            ["ctx", "env", name] => self.env.get(name),
            ["ctx", rest @ ..] => {
                let path: Vec<PathSegment> = rest.iter().map(|key| (*key).into()).collect();
                self.ctx.get_path(&path).cloned()
            }
            _ => None,
        }
    }

    pub fn into_ctx(self) -> Value {
        self.ctx
    }
}

impl serde::Serialize for TemplateContext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut ctx = self.ctx.clone();
        if let Some(object) = ctx.as_object_mut() {
            object.insert("env".to_string(), Value::from(self.env.effective()));
        }

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ctx", &ctx)?;
        if let Some(functions) = &self.functions {
            map.serialize_entry("fn", functions)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::environment::Ambient;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn markers() {
        assert!(has_template_markers("<% ctx.env.A %>"));
        assert!(has_template_markers("<% ctx.env.A"));
        assert!(!has_template_markers("ratio 50%>10"));
        assert!(!has_template_markers("plain"));
    }

    #[test]
    fn context_lookup_and_serialization() {
        let env = ProjectEnvironment::new(
            IndexMap::from([("A".to_string(), Value::from("default"))]),
            IndexMap::from([("B".to_string(), "override".to_string())]),
        )
        .with_ambient(Ambient::fixed([("A", "ambient")]));

        let context = TemplateContext::new(
            Value::from(json!({"definition_version": "1.1", "env": {"A": "default"}})),
            env,
            Some(TemplatingFunctions::new("jdoe".to_string())),
        );

        assert_eq!(context.lookup("ctx.env.A"), Some(Value::from("ambient")));
        assert_eq!(context.lookup("ctx.definition_version"), Some(Value::from("1.1")));
        assert_eq!(context.lookup("ctx.missing"), None);

        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            json!({
                "ctx": {"definition_version": "1.1", "env": {"A": "ambient", "B": "override"}},
                "fn": ["id_concat", "str_to_id", "id_to_str", "get_username", "clean_id"],
            })
        );
    }
}
