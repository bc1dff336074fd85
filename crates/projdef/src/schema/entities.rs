//! Entities of definition version 2
//!
//! Each entity is a mapping under `entities.<id>` whose `type` (or legacy `entity_type`) selects one of the models
//! below. The discriminator is removed before the remaining fields are validated against the model.
use super::fields::{lenient_bool, lenient_u32, Distribution, PathMapping, PostDeployHook, Signature};
use super::v1::validate_identifier;
use super::{from_section, SchemaError, Validate};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const TYPE_FIELD: &str = "type";
pub const LEGACY_TYPE_FIELD: &str = "entity_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    ApplicationPackage,
    Application,
    Function,
    Procedure,
    Streamlit,
    Service,
}

/// Fields accepted by every entity type
const COMMON_FIELDS: &[&str] = &["identifier", "meta"];

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::ApplicationPackage,
        EntityType::Application,
        EntityType::Function,
        EntityType::Procedure,
        EntityType::Streamlit,
        EntityType::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ApplicationPackage => "application package",
            EntityType::Application => "application",
            EntityType::Function => "function",
            EntityType::Procedure => "procedure",
            EntityType::Streamlit => "streamlit",
            EntityType::Service => "service",
        }
    }

    fn own_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::ApplicationPackage => &[
                "artifacts",
                "bundle_root",
                "deploy_root",
                "generated_root",
                "stage",
                "scratch_stage",
                "distribution",
                "manifest",
            ],
            EntityType::Application => &["from", "debug"],
            EntityType::Function | EntityType::Procedure => &[
                "handler",
                "returns",
                "signature",
                "runtime",
                "artifacts",
                "stage",
                "imports",
                "external_access_integrations",
                "secrets",
                "execute_as_caller",
            ],
            EntityType::Streamlit => &[
                "title",
                "query_warehouse",
                "main_file",
                "pages_dir",
                "stage",
                "artifacts",
            ],
            EntityType::Service => &[
                "stage",
                "compute_pool",
                "spec_file",
                "min_instances",
                "max_instances",
                "query_warehouse",
                "artifacts",
            ],
        }
    }

    /// Whether a field of this name is part of the model
    pub fn accepts(&self, field: &str) -> bool {
        COMMON_FIELDS.contains(&field) || self.own_fields().contains(&field)
    }

    /// Values every entity of this type starts out with
    pub fn defaults(&self) -> Value {
        let defaults: &[(&str, &str)] = match self {
            EntityType::ApplicationPackage => &[
                ("bundle_root", "output/bundle/"),
                ("deploy_root", "output/deploy/"),
                ("generated_root", "__generated/"),
                ("stage", "app_src.stage"),
                ("scratch_stage", "app_src.stage_snowflake_cli_scratch"),
                ("distribution", "internal"),
            ],
            EntityType::Streamlit => &[("main_file", "streamlit_app.py"), ("stage", "streamlit")],
            EntityType::Function | EntityType::Procedure => &[("stage", "dev_deployment")],
            EntityType::Application | EntityType::Service => &[],
        };

        Value::Object(
            defaults
                .iter()
                .map(|(key, value)| (key.to_string(), Value::from(*value)))
                .collect(),
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|entity_type| entity_type.as_str() == s)
            .ok_or_else(|| SchemaError::UnsupportedEntityType(s.to_string()))
    }
}

/// Raw discriminator of an entity mapping
pub fn entity_type_name(entity: &Value) -> Option<&str> {
    entity
        .get(TYPE_FIELD)
        .or_else(|| entity.get(LEGACY_TYPE_FIELD))
        .and_then(Value::as_str)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub post_deploy: Vec<PostDeployHook>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Validate for Meta {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        validate_identifier(location, "warehouse", self.warehouse.as_deref())?;
        validate_identifier(location, "role", self.role.as_deref())
    }
}

/// Object name, optionally qualified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Name(String),
    Qualified {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
    },
}

impl Identifier {
    pub fn name(&self) -> &str {
        match self {
            Identifier::Name(name) | Identifier::Qualified { name, .. } => name,
        }
    }

    /// `database.schema.name` with missing parts left out
    pub fn fqn(&self) -> String {
        match self {
            Identifier::Name(name) => name.clone(),
            Identifier::Qualified {
                name,
                schema,
                database,
            } => [database.as_deref(), schema.as_deref(), Some(name.as_str())]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationPackageEntity {
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub meta: Option<Meta>,
    pub artifacts: Vec<PathMapping>,
    pub bundle_root: String,
    pub deploy_root: String,
    pub generated_root: String,
    pub stage: String,
    pub scratch_stage: String,
    #[serde(default)]
    pub distribution: Distribution,
    pub manifest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationEntity {
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub meta: Option<Meta>,
    pub from: TargetField,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug: Option<bool>,
}

/// Reference to another entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetField {
    pub target: String,
}

/// Function or procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnowparkEntity {
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub meta: Option<Meta>,
    pub handler: String,
    pub returns: String,
    pub signature: Signature,
    #[serde(default)]
    pub runtime: Option<String>,
    pub artifacts: Vec<PathMapping>,
    pub stage: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub external_access_integrations: Vec<String>,
    #[serde(default)]
    pub secrets: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub execute_as_caller: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamlitEntity {
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub query_warehouse: Option<String>,
    pub main_file: String,
    #[serde(default)]
    pub pages_dir: Option<String>,
    pub stage: String,
    #[serde(default)]
    pub artifacts: Vec<PathMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceEntity {
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub meta: Option<Meta>,
    pub stage: String,
    pub compute_pool: String,
    pub spec_file: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub min_instances: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_instances: Option<u32>,
    #[serde(default)]
    pub query_warehouse: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<PathMapping>,
}

/// A validated entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EntityModel {
    #[serde(rename = "application package")]
    ApplicationPackage(ApplicationPackageEntity),
    #[serde(rename = "application")]
    Application(ApplicationEntity),
    #[serde(rename = "function")]
    Function(SnowparkEntity),
    #[serde(rename = "procedure")]
    Procedure(SnowparkEntity),
    #[serde(rename = "streamlit")]
    Streamlit(StreamlitEntity),
    #[serde(rename = "service")]
    Service(ServiceEntity),
}

impl EntityModel {
    /// Validate the mapping found at `entities.<id>`
    pub fn from_value(id: &str, entity: &Value) -> Result<Self, SchemaError> {
        let location = format!("entities.{id}");

        let Some(fields) = entity.as_object() else {
            return Err(SchemaError::invalid(&location, "Input should be a valid dictionary"));
        };

        let Some(type_name) = entity_type_name(entity) else {
            return Err(SchemaError::invalid(&location, "missing field `type`"));
        };
        let entity_type: EntityType = type_name.parse()?;

        let mut fields = fields.clone();
        fields.shift_remove(TYPE_FIELD);
        fields.shift_remove(LEGACY_TYPE_FIELD);
        let fields = Value::Object(fields);

        let model = match entity_type {
            EntityType::ApplicationPackage => {
                EntityModel::ApplicationPackage(from_section(&fields, &location)?)
            }
            EntityType::Application => EntityModel::Application(from_section(&fields, &location)?),
            EntityType::Function => EntityModel::Function(from_section(&fields, &location)?),
            EntityType::Procedure => EntityModel::Procedure(from_section(&fields, &location)?),
            EntityType::Streamlit => EntityModel::Streamlit(from_section(&fields, &location)?),
            EntityType::Service => EntityModel::Service(from_section(&fields, &location)?),
        };

        model.validate(&location)?;
        Ok(model)
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityModel::ApplicationPackage(_) => EntityType::ApplicationPackage,
            EntityModel::Application(_) => EntityType::Application,
            EntityModel::Function(_) => EntityType::Function,
            EntityModel::Procedure(_) => EntityType::Procedure,
            EntityModel::Streamlit(_) => EntityType::Streamlit,
            EntityModel::Service(_) => EntityType::Service,
        }
    }

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            EntityModel::ApplicationPackage(entity) => entity.meta.as_ref(),
            EntityModel::Application(entity) => entity.meta.as_ref(),
            EntityModel::Function(entity) | EntityModel::Procedure(entity) => entity.meta.as_ref(),
            EntityModel::Streamlit(entity) => entity.meta.as_ref(),
            EntityModel::Service(entity) => entity.meta.as_ref(),
        }
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            EntityModel::ApplicationPackage(entity) => entity.identifier.as_ref(),
            EntityModel::Application(entity) => entity.identifier.as_ref(),
            EntityModel::Function(entity) | EntityModel::Procedure(entity) => {
                entity.identifier.as_ref()
            }
            EntityModel::Streamlit(entity) => entity.identifier.as_ref(),
            EntityModel::Service(entity) => entity.identifier.as_ref(),
        }
    }

    /// Object name, the entity id unless an identifier is given
    pub fn name<'a>(&'a self, id: &'a str) -> &'a str {
        self.identifier().map(Identifier::name).unwrap_or(id)
    }

    /// Ids of the entities this one depends on
    pub fn depends_on(&self) -> &[String] {
        self.meta()
            .map(|meta| meta.depends_on.as_slice())
            .unwrap_or_default()
    }
}

impl Validate for EntityModel {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        if let Some(meta) = self.meta() {
            meta.validate(&format!("{location}.meta"))?;
        }

        match self {
            EntityModel::ApplicationPackage(entity) => {
                if !crate::identifiers::is_valid_qualified_identifier(&entity.stage) {
                    return Err(SchemaError::IncorrectValue {
                        field: "stage".to_string(),
                        location: location.to_string(),
                    });
                }
                Ok(())
            }
            EntityModel::Function(entity) if entity.execute_as_caller.is_some() => {
                Err(SchemaError::invalid(location, "unknown field `execute_as_caller`"))
            }
            EntityModel::Streamlit(entity) => {
                validate_identifier(location, "query_warehouse", entity.query_warehouse.as_deref())
            }
            EntityModel::Service(entity) => {
                match (entity.min_instances, entity.max_instances) {
                    (Some(min), Some(max)) if min > max => Err(SchemaError::invalid(
                        location,
                        "max_instances must be greater or equal to min_instances",
                    )),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entity(value: serde_json::Value) -> Result<EntityModel, SchemaError> {
        EntityModel::from_value("my_entity", &Value::from(value))
    }

    #[test]
    fn discriminator_selects_the_model() {
        let model = entity(json!({
            "type": "application",
            "from": {"target": "pkg"},
            "debug": "false",
            "meta": {"depends_on": ["pkg"], "role": "app_role"},
        }))
        .unwrap();

        assert_eq!(model.entity_type(), EntityType::Application);
        assert_eq!(model.depends_on().to_vec(), vec!["pkg".to_string()]);
        assert_eq!(model.name("my_entity"), "my_entity");
        let EntityModel::Application(application) = model else {
            panic!("expected an application");
        };
        assert_eq!(application.debug, Some(false));
    }

    #[test]
    fn legacy_discriminator() {
        let model = entity(json!({
            "entity_type": "streamlit",
            "identifier": {"name": "dashboard", "schema": "public"},
            "main_file": "app.py",
            "stage": "streamlit",
        }))
        .unwrap();

        assert_eq!(model.entity_type(), EntityType::Streamlit);
        assert_eq!(model.name("my_entity"), "dashboard");
        assert_eq!(model.identifier().unwrap().fqn(), "public.dashboard");
    }

    #[test]
    fn unsupported_type() {
        let err = entity(json!({"type": "warehouse"})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported entity type: warehouse");
    }

    #[test]
    fn missing_type() {
        let err = entity(json!({"stage": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for entities.my_entity: missing field `type`");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = entity(json!({"type": "application", "from": {"target": "pkg"}, "stage": "x"}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown field `stage`"), "{err}");
    }

    #[test]
    fn accepted_fields() {
        assert!(EntityType::ApplicationPackage.accepts("stage"));
        assert!(EntityType::Application.accepts("meta"));
        assert!(!EntityType::Application.accepts("stage"));
    }

    #[test]
    fn invalid_role_in_meta() {
        let err = entity(json!({
            "type": "application",
            "from": {"target": "pkg"},
            "meta": {"role": "not a role"},
        }))
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Incorrect value for role value of entities.my_entity.meta"
        );
    }
}
