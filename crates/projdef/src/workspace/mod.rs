//! Entities of a version 2 definition and the actions performed on them
//!
//! [WorkspaceManager] turns entity models into handlers (see [entities::handler_for]) on first use and keeps them for
//! the lifetime of the manager.
pub mod actions;
pub mod entities;
pub mod sql;

use crate::identifiers::to_identifier;
use crate::schema::entities::EntityModel;
use crate::schema::{DefinitionVersion, ProjectDefinition};
use actions::{ActionContext, ActionOutcome, Console, EntityAction};
use entities::{handler_for, EntityHandler};
use indexmap::IndexMap;
use sql::{ExecutorError, SqlExecutor};
use std::path::{Path, PathBuf};

pub const REQUIRED_DEFINITION_VERSION: &str = "2";

#[derive(thiserror::Error, Debug)]
pub enum WorkspaceError {
    #[error("This command requires project definition of version at least {required}. Found version {found}")]
    VersionRequirement {
        required: String,
        found: DefinitionVersion,
    },
    #[error("No such entity ID: {0}")]
    NoSuchEntity(String),
    #[error("This entity type does not support \"{0}\"")]
    UnsupportedAction(EntityAction),
    #[error("Cycle detected in entity dependencies: {0}")]
    DependencyCycle(String),
    #[error("Entity {id} must target an application package, {target} is not one")]
    InvalidTarget { id: String, target: String },
    #[error("No match was found for the specified source in the project directory: {0}")]
    ArtifactNotFound(String),
    #[error("Artifact source {0} can only contain wildcards in its last path component")]
    InvalidArtifact(String),
    #[error("Unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

pub struct WorkspaceManager<'a> {
    entities: &'a IndexMap<String, EntityModel>,
    project_root: PathBuf,
    default_role: String,
    default_warehouse: Option<String>,
    console: &'a dyn Console,
    executor: &'a dyn SqlExecutor,
    handlers: IndexMap<String, Box<dyn EntityHandler>>,
}

impl<'a> WorkspaceManager<'a> {
    /// Requires a definition of version 2 or later
    ///
    /// Without a configured role the current role of the executor's session is used.
    pub fn new(
        project_definition: &'a ProjectDefinition,
        project_root: &Path,
        default_role: Option<String>,
        default_warehouse: Option<&str>,
        console: &'a dyn Console,
        executor: &'a dyn SqlExecutor,
    ) -> Result<Self, WorkspaceError> {
        let version_error = || WorkspaceError::VersionRequirement {
            required: REQUIRED_DEFINITION_VERSION.to_string(),
            found: project_definition.definition_version(),
        };

        if !project_definition.meets_version_requirement(REQUIRED_DEFINITION_VERSION) {
            return Err(version_error());
        }
        let entities = project_definition.entities().ok_or_else(version_error)?;

        let default_role = match default_role {
            Some(role) => role,
            None => executor.current_role()?,
        };

        Ok(Self {
            entities,
            project_root: project_root.to_owned(),
            default_role,
            default_warehouse: default_warehouse.map(to_identifier),
            console,
            executor,
            handlers: IndexMap::new(),
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    pub fn default_warehouse(&self) -> Option<&str> {
        self.default_warehouse.as_deref()
    }

    fn model(&self, entity_id: &str) -> Result<&'a EntityModel, WorkspaceError> {
        self.entities
            .get(entity_id)
            .ok_or_else(|| WorkspaceError::NoSuchEntity(entity_id.to_string()))
    }

    /// Handler for `entity_id`, created on first request and reused afterwards
    pub fn get_entity(&mut self, entity_id: &str) -> Result<&dyn EntityHandler, WorkspaceError> {
        if !self.handlers.contains_key(entity_id) {
            let model = self.model(entity_id)?;
            tracing::debug!(%entity_id, entity_type=%model.entity_type(), "creating entity handler");
            self.handlers
                .insert(entity_id.to_string(), handler_for(entity_id, model));
        }

        self.cached_entity(entity_id)
    }

    /// Number of handlers created so far
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn perform_action(
        &mut self,
        entity_id: &str,
        action: EntityAction,
    ) -> Result<ActionOutcome, WorkspaceError> {
        self.get_entity(entity_id)?;
        let handler = self.cached_entity(entity_id)?;

        if !handler.supports(action) {
            return Err(WorkspaceError::UnsupportedAction(action));
        }

        let ctx = ActionContext {
            console: self.console,
            project_root: &self.project_root,
            default_role: &self.default_role,
            default_warehouse: self.default_warehouse.as_deref(),
            executor: self.executor,
            entities: self.entities,
        };

        tracing::info!(%entity_id, %action, "performing action");
        handler.perform(action, &ctx)
    }

    fn cached_entity(&self, entity_id: &str) -> Result<&dyn EntityHandler, WorkspaceError> {
        self.handlers
            .get(entity_id)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| WorkspaceError::NoSuchEntity(entity_id.to_string()))
    }

    /// Transitive dependencies of `entity_id` (from `meta.depends_on`), dependencies first
    ///
    /// The entity itself is not part of the result.
    pub fn dependencies(&self, entity_id: &str) -> Result<Vec<String>, WorkspaceError> {
        let mut graph = petgraph::Graph::<String, ()>::new();
        let mut nodes = IndexMap::new();
        let mut pending = vec![entity_id.to_string()];

        while let Some(id) = pending.pop() {
            if nodes.contains_key(&id) {
                continue;
            }
            let model = self.model(&id)?;
            nodes.insert(id.clone(), graph.add_node(id.clone()));
            pending.extend(model.depends_on().iter().cloned());
        }

        for (id, &dependent) in &nodes {
            for dependency in self.model(id)?.depends_on() {
                if let Some(&dependency) = nodes.get(dependency) {
                    graph.add_edge(dependency, dependent, ());
                }
            }
        }

        let order = petgraph::algo::toposort(&graph, None).map_err(|cycle| {
            WorkspaceError::DependencyCycle(graph[cycle.node_id()].clone())
        })?;

        Ok(order
            .into_iter()
            .map(|index| graph[index].clone())
            .filter(|id| id != entity_id)
            .collect())
    }
}
