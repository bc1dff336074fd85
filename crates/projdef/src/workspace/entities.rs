//! Handlers that implement actions for each entity type
//!
//! [handler_for] maps every [EntityModel] variant to its handler. A handler only exposes the actions listed in its
//! `ACTIONS` table.
use super::actions::{ActionContext, ActionOutcome, ArtifactMapping, EntityAction};
use super::sql::Row;
use super::WorkspaceError;
use crate::identifiers::{extract_schema, to_identifier, to_string_literal, unquote_identifier};
use crate::schema::entities::{
    ApplicationEntity, ApplicationPackageEntity, EntityModel, EntityType, Identifier, Meta, ServiceEntity,
    SnowparkEntity, StreamlitEntity,
};
use crate::schema::fields::{Distribution, PathMapping, Signature};
use crate::value::Value;
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};

/// Event table used when the account does not configure one
const DEFAULT_EVENT_TABLE: &str = "snowflake.telemetry.events";

pub trait EntityHandler: std::fmt::Debug {
    fn id(&self) -> &str;

    fn supported_actions(&self) -> &'static [EntityAction];

    fn supports(&self, action: EntityAction) -> bool {
        self.supported_actions().contains(&action)
    }

    /// Run a supported action
    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError>;
}

/// Construct the handler for an entity model
pub fn handler_for(id: &str, model: &EntityModel) -> Box<dyn EntityHandler> {
    let id = id.to_string();
    match model {
        EntityModel::ApplicationPackage(model) => Box::new(ApplicationPackage::new(id, model.clone())),
        EntityModel::Application(model) => Box::new(Application::new(id, model.clone())),
        EntityModel::Function(model) => Box::new(Snowpark::new(id, EntityType::Function, model.clone())),
        EntityModel::Procedure(model) => Box::new(Snowpark::new(id, EntityType::Procedure, model.clone())),
        EntityModel::Streamlit(model) => Box::new(Streamlit::new(id, model.clone())),
        EntityModel::Service(model) => Box::new(Service::new(id, model.clone())),
    }
}

/// Collects executed statements
struct Statements<'c, 'a> {
    ctx: &'c ActionContext<'a>,
    executed: Vec<String>,
}

impl<'c, 'a> Statements<'c, 'a> {
    fn start(ctx: &'c ActionContext<'a>, meta: Option<&Meta>) -> Result<Self, WorkspaceError> {
        let executed = ctx.use_role_and_warehouse(meta)?;
        Ok(Self { ctx, executed })
    }

    fn run(&mut self, query: impl Into<String>) -> Result<Vec<Row>, WorkspaceError> {
        let query = query.into();
        let rows = self.ctx.execute(&query)?;
        self.executed.push(query);
        Ok(rows)
    }

    fn upload(&mut self, mappings: &[ArtifactMapping], stage_path: &str) -> Result<(), WorkspaceError> {
        for mapping in mappings {
            let directory = mapping
                .destination
                .parent()
                .map(slash_path)
                .filter(|directory| !directory.is_empty());
            let target = match directory {
                Some(directory) => format!("{stage_path}/{directory}"),
                None => stage_path.to_string(),
            };

            self.ctx
                .console
                .message(&format!("uploading {}", slash_path(&mapping.source)));
            self.run(format!(
                "put 'file://{}' {target} auto_compress = false overwrite = true",
                slash_path(&self.ctx.project_root.join(&mapping.source))
            ))?;
        }
        Ok(())
    }

    fn post_deploy(&mut self, meta: Option<&Meta>) -> Result<(), WorkspaceError> {
        let hooks = meta.map(|meta| meta.post_deploy.as_slice()).unwrap_or_default();
        if !hooks.is_empty() {
            self.ctx.console.step("Executing post-deploy actions");
        }

        for hook in hooks {
            let path = self.ctx.project_root.join(&hook.sql_script);
            let script = std::fs::read_to_string(&path).map_err(|source| WorkspaceError::Io { path, source })?;
            self.run(script)?;
        }
        Ok(())
    }

    fn finish(self) -> ActionOutcome {
        ActionOutcome::Executed(self.executed)
    }
}

#[derive(Debug, derive_new::new)]
pub struct ApplicationPackage {
    id: String,
    model: ApplicationPackageEntity,
}

impl ApplicationPackage {
    const ACTIONS: &'static [EntityAction] = &[
        EntityAction::Bundle,
        EntityAction::Deploy,
        EntityAction::Drop,
        EntityAction::Validate,
    ];

    fn name(&self) -> String {
        object_name(&self.id, self.model.identifier.as_ref())
    }

    fn stage_path(&self) -> String {
        format!("@{}.{}", self.name(), self.model.stage)
    }

    fn deploy(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let mappings = bundle_artifacts(ctx.project_root, &self.model.artifacts)?;
        let name = self.name();
        let meta = self.model.meta.as_ref();

        ctx.console.step(&format!("Creating application package {name}"));
        let mut statements = Statements::start(ctx, meta)?;
        let distribution = match self.model.distribution {
            Distribution::Internal => "internal",
            Distribution::External => "external",
        };
        statements.run(format!(
            "create application package if not exists {name} distribution = {distribution}"
        ))?;
        if let Some(schema) = extract_schema(&self.model.stage) {
            statements.run(format!("create schema if not exists {name}.{schema}"))?;
        }
        statements.run(format!(
            "create stage if not exists {name}.{} encryption = (type = 'SNOWFLAKE_SSE')",
            self.model.stage
        ))?;

        ctx.console.step(&format!("Uploading files to {}", self.stage_path()));
        statements.upload(&mappings, &self.stage_path())?;
        statements.post_deploy(meta)?;

        Ok(statements.finish())
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let mappings = bundle_artifacts(ctx.project_root, &self.model.artifacts)?;
        let manifest = Path::new(&self.model.manifest).file_name();
        if !mappings.iter().any(|mapping| mapping.destination.file_name() == manifest) {
            ctx.console
                .warning(&format!("{} is not part of the artifacts", self.model.manifest));
        }

        let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
        let rows = statements.run(format!(
            "select system$validate_native_app_setup({})",
            to_string_literal(&self.stage_path())
        ))?;
        Ok(ActionOutcome::Rows(rows))
    }
}

impl EntityHandler for ApplicationPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_actions(&self) -> &'static [EntityAction] {
        Self::ACTIONS
    }

    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        match action {
            EntityAction::Bundle => Ok(ActionOutcome::Bundled(bundle_artifacts(
                ctx.project_root,
                &self.model.artifacts,
            )?)),
            EntityAction::Deploy => self.deploy(ctx),
            EntityAction::Drop => {
                let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
                statements.run(format!("drop application package if exists {}", self.name()))?;
                Ok(statements.finish())
            }
            EntityAction::Validate => self.validate(ctx),
            action => Err(WorkspaceError::UnsupportedAction(action)),
        }
    }
}

#[derive(Debug, derive_new::new)]
pub struct Application {
    id: String,
    model: ApplicationEntity,
}

impl Application {
    const ACTIONS: &'static [EntityAction] = &[EntityAction::Deploy, EntityAction::Drop, EntityAction::Events];

    fn name(&self) -> String {
        object_name(&self.id, self.model.identifier.as_ref())
    }

    fn package(&self, ctx: &ActionContext<'_>) -> Result<ApplicationPackage, WorkspaceError> {
        let target = &self.model.from.target;
        match ctx.entities.get(target) {
            Some(EntityModel::ApplicationPackage(package)) => {
                Ok(ApplicationPackage::new(target.clone(), package.clone()))
            }
            Some(_) => Err(WorkspaceError::InvalidTarget {
                id: self.id.clone(),
                target: target.clone(),
            }),
            None => Err(WorkspaceError::NoSuchEntity(target.clone())),
        }
    }

    fn deploy(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let package = self.package(ctx)?;
        let name = self.name();
        let meta = self.model.meta.as_ref();

        ctx.console.step(&format!("Creating application {name}"));
        let mut statements = Statements::start(ctx, meta)?;
        let mut create = format!(
            "create application if not exists {name} from application package {} using {}",
            package.name(),
            to_string_literal(&package.stage_path())
        );
        if let Some(debug) = self.model.debug {
            create.push_str(&format!(" debug_mode = {debug}"));
        }
        statements.run(create)?;
        statements.post_deploy(meta)?;

        Ok(statements.finish())
    }

    fn events(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let parameters = ctx.execute("show parameters like 'event_table' in account")?;
        let event_table = parameters
            .first()
            .and_then(|row| row.get("value"))
            .and_then(Value::as_str)
            .filter(|table| !table.is_empty())
            .unwrap_or(DEFAULT_EVENT_TABLE)
            .to_string();

        let rows = ctx.execute(&format!(
            "select timestamp, record_type, value from {event_table} \
            where resource_attributes:\"snow.database.name\" = {} order by timestamp desc",
            to_string_literal(&unquote_identifier(&self.name()))
        ))?;
        Ok(ActionOutcome::Rows(rows))
    }
}

impl EntityHandler for Application {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_actions(&self) -> &'static [EntityAction] {
        Self::ACTIONS
    }

    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        match action {
            EntityAction::Deploy => self.deploy(ctx),
            EntityAction::Drop => {
                let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
                statements.run(format!("drop application if exists {}", self.name()))?;
                Ok(statements.finish())
            }
            EntityAction::Events => self.events(ctx),
            action => Err(WorkspaceError::UnsupportedAction(action)),
        }
    }
}

/// Function or procedure
#[derive(Debug, derive_new::new)]
pub struct Snowpark {
    id: String,
    kind: EntityType,
    model: SnowparkEntity,
}

impl Snowpark {
    const ACTIONS: &'static [EntityAction] = &[EntityAction::Bundle, EntityAction::Deploy, EntityAction::Drop];

    fn name(&self) -> String {
        object_name(&self.id, self.model.identifier.as_ref())
    }

    fn create_statement(&self, mappings: &[ArtifactMapping]) -> String {
        let model = &self.model;
        let stage_path = format!("@{}/{}", model.stage, self.id);

        let mut lines = vec![
            format!(
                "create or replace {} {}({})",
                self.kind,
                self.name(),
                signature_sql(&model.signature, true)
            ),
            "copy grants".to_string(),
            format!("returns {}", model.returns),
            "language python".to_string(),
        ];

        if let Some(runtime) = &model.runtime {
            lines.push(format!("runtime_version = {}", to_string_literal(runtime)));
        }

        let imports: Vec<String> = mappings
            .iter()
            .map(|mapping| to_string_literal(&format!("{stage_path}/{}", slash_path(&mapping.destination))))
            .chain(model.imports.iter().map(|import| to_string_literal(import)))
            .collect();
        if !imports.is_empty() {
            lines.push(format!("imports = ({})", imports.join(", ")));
        }

        lines.push(format!("handler = {}", to_string_literal(&model.handler)));

        if !model.external_access_integrations.is_empty() {
            lines.push(format!(
                "external_access_integrations = ({})",
                model.external_access_integrations.join(", ")
            ));
        }

        if !model.secrets.is_empty() {
            let secrets: Vec<String> = model
                .secrets
                .iter()
                .map(|(key, secret)| format!("{} = {secret}", to_string_literal(key)))
                .collect();
            lines.push(format!("secrets = ({})", secrets.join(", ")));
        }

        if self.kind == EntityType::Procedure {
            lines.push("packages = ('snowflake-snowpark-python')".to_string());
            if model.execute_as_caller == Some(true) {
                lines.push("execute as caller".to_string());
            }
        }

        lines.join("\n")
    }

    fn deploy(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let mappings = bundle_artifacts(ctx.project_root, &self.model.artifacts)?;
        let meta = self.model.meta.as_ref();

        ctx.console.step(&format!("Creating {} {}", self.kind, self.name()));
        let mut statements = Statements::start(ctx, meta)?;
        statements.run(format!("create stage if not exists {}", self.model.stage))?;
        statements.upload(&mappings, &format!("@{}/{}", self.model.stage, self.id))?;
        statements.run(self.create_statement(&mappings))?;
        statements.post_deploy(meta)?;

        Ok(statements.finish())
    }
}

impl EntityHandler for Snowpark {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_actions(&self) -> &'static [EntityAction] {
        Self::ACTIONS
    }

    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        match action {
            EntityAction::Bundle => Ok(ActionOutcome::Bundled(bundle_artifacts(
                ctx.project_root,
                &self.model.artifacts,
            )?)),
            EntityAction::Deploy => self.deploy(ctx),
            EntityAction::Drop => {
                let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
                statements.run(format!(
                    "drop {} if exists {}({})",
                    self.kind,
                    self.name(),
                    signature_sql(&self.model.signature, false)
                ))?;
                Ok(statements.finish())
            }
            action => Err(WorkspaceError::UnsupportedAction(action)),
        }
    }
}

#[derive(Debug, derive_new::new)]
pub struct Streamlit {
    id: String,
    model: StreamlitEntity,
}

impl Streamlit {
    const ACTIONS: &'static [EntityAction] = &[EntityAction::Bundle, EntityAction::Deploy, EntityAction::Drop];

    fn name(&self) -> String {
        object_name(&self.id, self.model.identifier.as_ref())
    }

    fn deploy(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let mappings = bundle_artifacts(ctx.project_root, &self.model.artifacts)?;
        let meta = self.model.meta.as_ref();
        let name = self.name();
        let root_location = format!("@{}/{}", self.model.stage, unquote_identifier(&name));

        ctx.console.step(&format!("Creating streamlit {name}"));
        let mut statements = Statements::start(ctx, meta)?;
        statements.run(format!("create stage if not exists {}", self.model.stage))?;
        statements.upload(&mappings, &root_location)?;

        let mut create = format!(
            "create or replace streamlit {name} root_location = {} main_file = {}",
            to_string_literal(&root_location),
            to_string_literal(&self.model.main_file)
        );
        if let Some(pages_dir) = &self.model.pages_dir {
            create.push_str(&format!(" pages_dir = {}", to_string_literal(pages_dir)));
        }
        if let Some(warehouse) = self.model.query_warehouse.as_deref().or(ctx.default_warehouse) {
            create.push_str(&format!(" query_warehouse = {warehouse}"));
        }
        if let Some(title) = &self.model.title {
            create.push_str(&format!(" title = {}", to_string_literal(title)));
        }
        statements.run(create)?;
        statements.post_deploy(meta)?;

        Ok(statements.finish())
    }
}

impl EntityHandler for Streamlit {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_actions(&self) -> &'static [EntityAction] {
        Self::ACTIONS
    }

    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        match action {
            EntityAction::Bundle => Ok(ActionOutcome::Bundled(bundle_artifacts(
                ctx.project_root,
                &self.model.artifacts,
            )?)),
            EntityAction::Deploy => self.deploy(ctx),
            EntityAction::Drop => {
                let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
                statements.run(format!("drop streamlit if exists {}", self.name()))?;
                Ok(statements.finish())
            }
            action => Err(WorkspaceError::UnsupportedAction(action)),
        }
    }
}

#[derive(Debug, derive_new::new)]
pub struct Service {
    id: String,
    model: ServiceEntity,
}

impl Service {
    const ACTIONS: &'static [EntityAction] = &[EntityAction::Bundle, EntityAction::Deploy, EntityAction::Drop];

    fn name(&self) -> String {
        object_name(&self.id, self.model.identifier.as_ref())
    }

    fn deploy(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        let mappings = bundle_artifacts(ctx.project_root, &self.model.artifacts)?;
        let meta = self.model.meta.as_ref();
        let name = self.name();
        let stage_path = format!("@{}", self.model.stage);

        ctx.console.step(&format!("Creating service {name}"));
        let mut statements = Statements::start(ctx, meta)?;
        statements.run(format!("create stage if not exists {}", self.model.stage))?;
        statements.upload(&mappings, &stage_path)?;

        let mut create = format!(
            "create service if not exists {name} in compute pool {} from {stage_path} specification_file = {}",
            self.model.compute_pool,
            to_string_literal(&self.model.spec_file)
        );
        if let Some(min_instances) = self.model.min_instances {
            create.push_str(&format!(" min_instances = {min_instances}"));
        }
        if let Some(max_instances) = self.model.max_instances {
            create.push_str(&format!(" max_instances = {max_instances}"));
        }
        if let Some(warehouse) = self.model.query_warehouse.as_deref().or(ctx.default_warehouse) {
            create.push_str(&format!(" query_warehouse = {warehouse}"));
        }
        statements.run(create)?;
        statements.post_deploy(meta)?;

        Ok(statements.finish())
    }
}

impl EntityHandler for Service {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_actions(&self) -> &'static [EntityAction] {
        Self::ACTIONS
    }

    fn perform(&self, action: EntityAction, ctx: &ActionContext<'_>) -> Result<ActionOutcome, WorkspaceError> {
        match action {
            EntityAction::Bundle => Ok(ActionOutcome::Bundled(bundle_artifacts(
                ctx.project_root,
                &self.model.artifacts,
            )?)),
            EntityAction::Deploy => self.deploy(ctx),
            EntityAction::Drop => {
                let mut statements = Statements::start(ctx, self.model.meta.as_ref())?;
                statements.run(format!("drop service if exists {}", self.name()))?;
                Ok(statements.finish())
            }
            action => Err(WorkspaceError::UnsupportedAction(action)),
        }
    }
}

/// SQL name of an entity, the id unless an identifier is configured
fn object_name(id: &str, identifier: Option<&Identifier>) -> String {
    match identifier {
        None => to_identifier(id),
        Some(Identifier::Name(name)) => to_identifier(name),
        Some(Identifier::Qualified {
            name,
            schema,
            database,
        }) => [database.as_deref(), schema.as_deref(), Some(name.as_str())]
            .into_iter()
            .flatten()
            .map(to_identifier)
            .collect::<Vec<_>>()
            .join("."),
    }
}

fn signature_sql(signature: &Signature, with_defaults: bool) -> String {
    match signature {
        Signature::Text(text) => text.clone(),
        Signature::Arguments(arguments) => arguments
            .iter()
            .map(|argument| match &argument.default {
                Some(default) if with_defaults => {
                    format!("{} {} default {default}", argument.name, argument.arg_type)
                }
                _ if with_defaults => format!("{} {}", argument.name, argument.arg_type),
                _ => argument.arg_type.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Map artifacts to their destination relative to the deploy root
///
/// Sources are relative to `project_root` and have to exist. A `*` or `?` wildcard is allowed in the last path
/// component of a source, matches are placed inside `dest` (or the source directory when `dest` is missing). A
/// `dest` ending with `/` is a directory.
pub fn bundle_artifacts(
    project_root: &Path,
    artifacts: &[PathMapping],
) -> Result<Vec<ArtifactMapping>, WorkspaceError> {
    let mut mappings = vec![];

    for artifact in artifacts {
        if is_pattern(&artifact.src) {
            let (directory, pattern) = match artifact.src.rsplit_once('/') {
                Some((directory, pattern)) => (directory, pattern),
                None => ("", artifact.src.as_str()),
            };
            if is_pattern(directory) {
                return Err(WorkspaceError::InvalidArtifact(artifact.src.clone()));
            }

            let pattern = Pattern::new(pattern).map_err(|_| WorkspaceError::InvalidArtifact(artifact.src.clone()))?;
            let matches = matching_entries(project_root, Path::new(directory), &pattern)
                .map_err(|err| match err {
                    WorkspaceError::Io { .. } => WorkspaceError::ArtifactNotFound(artifact.src.clone()),
                    other => other,
                })?;
            if matches.is_empty() {
                return Err(WorkspaceError::ArtifactNotFound(artifact.src.clone()));
            }

            let destination = PathBuf::from(artifact.dest.as_deref().unwrap_or(directory));
            for file_name in matches {
                mappings.push(ArtifactMapping {
                    source: normalize(Path::new(directory).join(&file_name)),
                    destination: normalize(destination.join(&file_name)),
                });
            }
        } else {
            let source = normalize(PathBuf::from(&artifact.src));
            if !project_root.join(&source).exists() {
                return Err(WorkspaceError::ArtifactNotFound(artifact.src.clone()));
            }

            let destination = match (&artifact.dest, source.file_name()) {
                (Some(dest), Some(file_name)) if dest.ends_with('/') => PathBuf::from(dest).join(file_name),
                _ => PathBuf::from(artifact.destination()),
            };
            mappings.push(ArtifactMapping {
                source,
                destination: normalize(destination),
            });
        }
    }

    tracing::debug!(count = mappings.len(), "artifacts bundled");
    Ok(mappings)
}

fn is_pattern(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Names of the entries of `project_root/directory` matching `pattern`, sorted
///
/// Hidden entries only match a pattern that starts with a literal `.`.
fn matching_entries(project_root: &Path, directory: &Path, pattern: &Pattern) -> Result<Vec<String>, WorkspaceError> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let path = project_root.join(directory);
    let entries = std::fs::read_dir(&path).map_err(|source| WorkspaceError::Io {
        path: path.clone(),
        source,
    })?;

    let mut names = vec![];
    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::Io {
            path: path.clone(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if pattern.matches_with(&name, options) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Drop `.` components
fn normalize(path: PathBuf) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Path with `/` separators
fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
