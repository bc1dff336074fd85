//! Lazy, memoized resolution of reference expressions
//!
//! Every string leaf of the tree is visited in document order. A leaf containing expressions is rendered, which
//! may require other paths to be rendered first. Those are resolved on demand and written back into the tree so
//! each path is rendered at most once.
//!
//! Each path moves through [ResolutionState]: a path that is requested while it is [ResolutionState::InProgress]
//! closes a cycle. Chains of references deeper than [MAX_REFERENCE_DEPTH] are rejected.
use super::functions::TemplatingFunctions;
use super::parser::{parse_template, Expression, Segment, VariablePath, OPEN};
use super::{has_template_markers, TemplateError, TEMPLATING_IGNORED_WARNING};
use crate::environment::ProjectEnvironment;
use crate::value::{display_path, PathSegment, Value};
use crate::visit::VisitStrings;
use std::collections::HashMap;

/// Longest chain of paths that may be rendered while waiting on each other
pub const MAX_REFERENCE_DEPTH: usize = 128;

#[derive(Debug, Clone, Default)]
enum ResolutionState {
    #[default]
    Unvisited,
    InProgress,
    Resolved(Value),
}

/// Outcome of [Resolver::resolve]
#[derive(Debug)]
pub struct Resolution {
    pub tree: Value,
    pub warnings: Vec<String>,
}

pub struct Resolver<'a> {
    tree: Value,
    environment: &'a ProjectEnvironment,
    /// `None` disables the `fn` namespace
    functions: Option<&'a TemplatingFunctions>,
    /// top level sections that are left untouched
    suppressed_sections: &'a [&'a str],
    states: HashMap<Vec<PathSegment>, ResolutionState>,
    /// paths currently [ResolutionState::InProgress]
    depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(
        tree: Value,
        environment: &'a ProjectEnvironment,
        functions: Option<&'a TemplatingFunctions>,
        suppressed_sections: &'a [&'a str],
    ) -> Self {
        Self {
            tree,
            environment,
            functions,
            suppressed_sections,
            states: HashMap::new(),
            depth: 0,
        }
    }

    pub fn resolve(mut self) -> Result<Resolution, TemplateError> {
        let mut leaves = vec![];
        self.tree
            .visit_strings(&mut |path: &[PathSegment], value: &str| {
                leaves.push((path.to_vec(), has_template_markers(value)))
            });

        let mut warnings = vec![];
        for (path, looks_templated) in leaves {
            if self.is_suppressed(&path) {
                if looks_templated && warnings.is_empty() {
                    tracing::warn!("{TEMPLATING_IGNORED_WARNING}");
                    warnings.push(TEMPLATING_IGNORED_WARNING.to_string());
                }
                continue;
            }

            self.resolve_path(&path)?;
        }

        tracing::debug!(resolved = self.states.len(), "template resolution finished");
        Ok(Resolution {
            tree: self.tree,
            warnings,
        })
    }

    fn is_suppressed(&self, path: &[PathSegment]) -> bool {
        match path.first() {
            Some(PathSegment::Key(section)) => self.suppressed_sections.contains(&section.as_str()),
            _ => false,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(path = %display_path(path)))]
    fn resolve_path(&mut self, path: &[PathSegment]) -> Result<Value, TemplateError> {
        match self.states.get(path).cloned().unwrap_or_default() {
            ResolutionState::Resolved(value) => return Ok(value),
            ResolutionState::InProgress => {
                return Err(TemplateError::CycleDetected(context_path(path)))
            }
            ResolutionState::Unvisited => {}
        }

        let Some(current) = self.tree.get_path(path) else {
            return Err(TemplateError::UnknownVariable(context_path(path)));
        };

        let raw = match current {
            Value::String(raw) if raw.contains(OPEN) && !self.is_suppressed(path) => raw.clone(),
            other => {
                let other = other.clone();
                self.states
                    .insert(path.to_vec(), ResolutionState::Resolved(other.clone()));
                return Ok(other);
            }
        };

        if self.depth >= MAX_REFERENCE_DEPTH {
            return Err(TemplateError::TooDeep(context_path(path), MAX_REFERENCE_DEPTH));
        }

        self.states.insert(path.to_vec(), ResolutionState::InProgress);
        self.depth += 1;
        let rendered = self.render(&raw);
        self.depth -= 1;
        let value = rendered?;
        tracing::trace!(%raw, ?value, "rendered");

        self.tree.replace_at(path, value.clone());
        self.states
            .insert(path.to_vec(), ResolutionState::Resolved(value.clone()));
        Ok(value)
    }

    fn render(&mut self, raw: &str) -> Result<Value, TemplateError> {
        let template = parse_template(raw)?;

        if let Some(expression) = template.single_expression() {
            return self.evaluate(expression);
        }

        let mut rendered = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Expression(expression) => {
                    let value = self.evaluate(expression)?;
                    rendered.push_str(&value.to_template_string().unwrap_or_default());
                }
            }
        }

        Ok(Value::String(rendered))
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, TemplateError> {
        match expression {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(path) => self.lookup(path),
            Expression::Call {
                function,
                arguments,
            } => {
                let functions = self.functions;
                let (Some(functions), Some(name)) = (functions, function.function_name()) else {
                    return Err(TemplateError::UnknownVariable(function.to_string()));
                };

                if !TemplatingFunctions::contains(name) {
                    return Err(TemplateError::UnknownVariable(function.to_string()));
                }

                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate(argument))
                    .collect::<Result<Vec<_>, _>>()?;

                functions.call(name, &arguments)
            }
        }
    }

    fn lookup(&mut self, path: &VariablePath) -> Result<Value, TemplateError> {
        match path.segments() {
            [root, rest @ ..] if root == "ctx" => self.lookup_context(path, rest),
            [_, name] if path.function_name().is_some() => {
                if self.functions.is_some() && TemplatingFunctions::contains(name) {
                    Err(TemplateError::NonScalar(path.to_string()))
                } else {
                    Err(TemplateError::UnknownVariable(path.to_string()))
                }
            }
            _ => Err(TemplateError::UnknownVariable(path.to_string())),
        }
    }

    fn lookup_context(
        &mut self,
        path: &VariablePath,
        rest: &[String],
    ) -> Result<Value, TemplateError> {
        match rest {
            [] => Err(TemplateError::NonScalar(path.to_string())),
            [env] if env == "env" => Err(TemplateError::NonScalar(path.to_string())),
            [env, name] if env == "env" => {
                // external values are never expanded
                if let Some(value) = self.environment.external(name) {
                    return Ok(Value::String(value));
                }
                self.lookup_tree(path, vec![PathSegment::from("env"), PathSegment::from(name.as_str())])
            }
            [env, ..] if env == "env" => Err(TemplateError::UnknownVariable(path.to_string())),
            _ => {
                let tree_path = rest
                    .iter()
                    .map(|key| PathSegment::Key(key.clone()))
                    .collect();
                self.lookup_tree(path, tree_path)
            }
        }
    }

    fn lookup_tree(
        &mut self,
        path: &VariablePath,
        tree_path: Vec<PathSegment>,
    ) -> Result<Value, TemplateError> {
        match self.tree.get_path(&tree_path) {
            None => Err(TemplateError::UnknownVariable(path.to_string())),
            Some(value) if !value.is_scalar() => Err(TemplateError::NonScalar(path.to_string())),
            Some(_) => self.resolve_path(&tree_path),
        }
    }
}

/// `ctx.` prefixed path as written in templates
fn context_path(path: &[PathSegment]) -> String {
    format!("ctx.{}", display_path(path))
}
