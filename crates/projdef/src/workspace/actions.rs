//! Actions that can be performed on entities and what they get to work with
use super::sql::{Row, SqlExecutor};
use super::WorkspaceError;
use crate::identifiers::same_identifier;
use crate::schema::entities::{EntityModel, Meta};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityAction {
    Bundle,
    Deploy,
    Drop,
    Events,
    Validate,
}

impl EntityAction {
    pub const ALL: [EntityAction; 5] = [
        EntityAction::Bundle,
        EntityAction::Deploy,
        EntityAction::Drop,
        EntityAction::Events,
        EntityAction::Validate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityAction::Bundle => "bundle",
            EntityAction::Deploy => "deploy",
            EntityAction::Drop => "drop",
            EntityAction::Events => "events",
            EntityAction::Validate => "validate",
        }
    }
}

impl std::str::FromStr for EntityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action \"{s}\""))
    }
}

impl std::fmt::Display for EntityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User facing output of actions
pub trait Console {
    /// A step of a longer running action
    fn step(&self, message: &str);

    fn message(&self, message: &str);

    fn warning(&self, message: &str);
}

/// Prints steps and messages to stdout and warnings to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl Console for StdConsole {
    fn step(&self, message: &str) {
        println!("{message}");
    }

    fn message(&self, message: &str) {
        println!("  {message}");
    }

    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}

/// Everything an action may use besides its own entity
pub struct ActionContext<'a> {
    pub console: &'a dyn Console,
    pub project_root: &'a Path,
    pub default_role: &'a str,
    pub default_warehouse: Option<&'a str>,
    pub executor: &'a dyn SqlExecutor,
    /// All entities of the definition, for actions that follow references
    pub entities: &'a IndexMap<String, EntityModel>,
}

impl ActionContext<'_> {
    pub fn execute(&self, query: &str) -> Result<Vec<Row>, WorkspaceError> {
        tracing::debug!(%query, "executing");
        Ok(self.executor.execute_query(query)?)
    }

    /// Switch to the role and warehouse configured in `meta`, falling back to the defaults
    ///
    /// The role is left alone when the session already uses it. Returns the executed statements.
    pub fn use_role_and_warehouse(&self, meta: Option<&Meta>) -> Result<Vec<String>, WorkspaceError> {
        let role = meta
            .and_then(|meta| meta.role.as_deref())
            .unwrap_or(self.default_role);
        let warehouse = meta
            .and_then(|meta| meta.warehouse.as_deref())
            .or(self.default_warehouse);

        let mut statements = vec![];
        let current_role = self.executor.current_role()?;
        if same_identifier(&current_role, role) {
            tracing::debug!(%role, "role already in use");
        } else {
            statements.push(format!("use role {role}"));
        }
        if let Some(warehouse) = warehouse {
            statements.push(format!("use warehouse {warehouse}"));
        }

        for statement in &statements {
            self.execute(statement)?;
        }
        Ok(statements)
    }
}

/// A source file and where it ends up under the deploy root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMapping {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Result of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Bundled(Vec<ArtifactMapping>),
    /// Statements in execution order
    Executed(Vec<String>),
    Rows(Vec<Row>),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::workspace::sql::DryRunExecutor;

    #[test]
    fn action_names() {
        assert_eq!(EntityAction::Deploy.to_string(), "deploy");
        assert_eq!(
            serde_json::to_value(EntityAction::Events).unwrap(),
            serde_json::json!("events")
        );
        assert_eq!("drop".parse::<EntityAction>(), Ok(EntityAction::Drop));
        assert!("create".parse::<EntityAction>().is_err());
    }

    #[test]
    fn role_switch_is_skipped_for_the_current_role() {
        let executor = DryRunExecutor::new("APP_ROLE".to_string());
        let entities = IndexMap::new();
        let ctx = ActionContext {
            console: &StdConsole,
            project_root: Path::new("."),
            default_role: "other_role",
            default_warehouse: None,
            executor: &executor,
            entities: &entities,
        };
        let meta = |role: &str| Meta {
            warehouse: Some("wh".to_string()),
            role: Some(role.to_string()),
            post_deploy: vec![],
            depends_on: vec![],
        };

        assert_eq!(
            ctx.use_role_and_warehouse(Some(&meta("app_role"))).unwrap(),
            vec!["use warehouse wh".to_string()]
        );
        assert_eq!(
            ctx.use_role_and_warehouse(Some(&meta(r#""app_role""#))).unwrap(),
            vec![r#"use role "app_role""#.to_string(), "use warehouse wh".to_string()]
        );
        assert_eq!(
            ctx.use_role_and_warehouse(None).unwrap(),
            vec!["use role other_role".to_string()]
        );
        assert_eq!(executor.statements().len(), 4);
    }
}
