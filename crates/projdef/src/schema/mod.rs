//! Versioned project definition schema
//!
//! | version | top level sections                            | templating |
//! |---------|-----------------------------------------------|------------|
//! | `1`     | `native_app`, `snowpark`, `streamlit`         | no         |
//! | `1.1`   | version `1` sections and `env`                | yes        |
//! | `2`     | `entities`, `defaults`, `env`                 | yes        |
//!
//! Validation converts the resolved tree into the typed models of [v1] and [entities]. Each section is validated on
//! its own so errors can name where they happened.
pub mod defaults;
pub mod entities;
pub mod fields;
pub mod v1;

use crate::value::Value;
use entities::EntityModel;
use indexmap::IndexMap;
use serde::Serialize;

pub const DEFINITION_VERSION_FIELD: &str = "definition_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionVersion {
    V1,
    V1_1,
    V2,
}

impl DefinitionVersion {
    pub const ALL: [DefinitionVersion; 3] = [
        DefinitionVersion::V1,
        DefinitionVersion::V1_1,
        DefinitionVersion::V2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionVersion::V1 => "1",
            DefinitionVersion::V1_1 => "1.1",
            DefinitionVersion::V2 => "2",
        }
    }

    /// Read `definition_version` from a raw tree
    ///
    /// Strings and numbers are accepted, the normalized string form has to match a supported version exactly.
    pub fn from_tree(tree: &Value) -> Result<Self, SchemaError> {
        let version = match tree.get(DEFINITION_VERSION_FIELD) {
            None | Some(Value::Null) => {
                return Err(SchemaError::invalid(DEFINITION_VERSION_FIELD, "Field required"))
            }
            Some(value) => value.to_template_string().ok_or_else(|| {
                SchemaError::invalid(DEFINITION_VERSION_FIELD, "Input should be a valid string")
            })?,
        };

        version.parse()
    }

    pub fn supports_templating(&self) -> bool {
        self.meets_version_requirement("1.1")
    }

    /// Semantic version comparison, `"1.1"` meets `"1"` and `"2"` meets `"1.1"`
    pub fn meets_version_requirement(&self, required: &str) -> bool {
        meets_version_requirement(self.as_str(), required)
    }
}

/// Compare dotted versions with semantic versioning rules
///
/// Missing minor and patch components count as zero. Unparsable versions never meet a requirement.
pub fn meets_version_requirement(version: &str, required: &str) -> bool {
    match (parse_version(version), parse_version(required)) {
        (Some(version), Some(required)) => version >= required,
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<semver::Version> {
    let version = version.trim();
    let padded = match version.matches('.').count() {
        0 => format!("{version}.0.0"),
        1 => format!("{version}.0"),
        _ => version.to_string(),
    };

    semver::Version::parse(&padded).ok()
}

impl std::str::FromStr for DefinitionVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DefinitionVersion::ALL
            .into_iter()
            .find(|version| version.as_str() == s)
            .ok_or_else(|| SchemaError::UnsupportedVersion(s.to_string()))
    }
}

impl std::fmt::Display for DefinitionVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DefinitionVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Version {0} is not supported. Supported versions: 1, 1.1, 2")]
    UnsupportedVersion(String),
    #[error("Unsupported entity type: {0}")]
    UnsupportedEntityType(String),
    #[error("Invalid value for {location}: {message}")]
    Invalid { location: String, message: String },
    #[error("Incorrect value for {field} value of {location}")]
    IncorrectValue { field: String, location: String },
}

impl SchemaError {
    pub fn invalid(location: &str, message: impl Into<String>) -> Self {
        SchemaError::Invalid {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

/// Checks serde can't express
pub trait Validate {
    fn validate(&self, location: &str) -> Result<(), SchemaError>;
}

/// Deserialize a section of the tree into its model
pub(crate) fn from_section<T: serde::de::DeserializeOwned>(
    value: &Value,
    location: &str,
) -> Result<T, SchemaError> {
    serde_json::from_value(value.to_json())
        .map_err(|err| SchemaError::invalid(location, err.to_string()))
}

fn optional_section<T>(tree: &Value, name: &str) -> Result<Option<T>, SchemaError>
where
    T: serde::de::DeserializeOwned + Validate,
{
    match tree.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let section: T = from_section(value, name)?;
            section.validate(name)?;
            Ok(Some(section))
        }
    }
}

/// Variables declared in the `env` section, scalars only
pub fn env_section(tree: &Value) -> Result<IndexMap<String, Value>, SchemaError> {
    match tree.get("env") {
        None | Some(Value::Null) => Ok(IndexMap::new()),
        Some(Value::Object(env)) => {
            if let Some((name, _)) = env.iter().find(|(_, value)| !value.is_scalar()) {
                return Err(SchemaError::invalid(
                    &format!("env.{name}"),
                    "Input should be a valid string",
                ));
            }
            Ok(env.clone())
        }
        Some(_) => Err(SchemaError::invalid("env", "Input should be a valid dictionary")),
    }
}

fn check_top_level_fields(tree: &Value, allowed: &[&str]) -> Result<(), SchemaError> {
    let Some(root) = tree.as_object() else {
        return Err(SchemaError::invalid("project definition", "Input should be a valid dictionary"));
    };

    match root.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(SchemaError::invalid(
            "project definition",
            format!(
                "unknown field `{key}`, expected one of {}",
                allowed
                    .iter()
                    .map(|field| format!("`{field}`"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
        None => Ok(()),
    }
}

/// Sections of definition version 1
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefinitionV1 {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_app: Option<v1::NativeApp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snowpark: Option<v1::Snowpark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streamlit: Option<v1::Streamlit>,
}

impl DefinitionV1 {
    const FIELDS: &'static [&'static str] =
        &[DEFINITION_VERSION_FIELD, "native_app", "snowpark", "streamlit"];

    fn from_sections(tree: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            native_app: optional_section(tree, "native_app")?,
            snowpark: optional_section(tree, "snowpark")?,
            streamlit: optional_section(tree, "streamlit")?,
        })
    }
}

/// Definition version 1.1: the version 1 sections plus `env`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefinitionV11 {
    #[serde(flatten)]
    pub base: DefinitionV1,
    pub env: IndexMap<String, Value>,
}

/// Definition version 2
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionV2 {
    pub entities: IndexMap<String, EntityModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
    pub env: IndexMap<String, Value>,
}

impl DefinitionV2 {
    const FIELDS: &'static [&'static str] =
        &[DEFINITION_VERSION_FIELD, "entities", "defaults", "env"];
}

/// A validated project definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectDefinition {
    V1(DefinitionV1),
    V1_1(DefinitionV11),
    V2(DefinitionV2),
}

impl ProjectDefinition {
    /// Validate a resolved tree against the schema of `version`
    pub fn from_tree(tree: &Value, version: DefinitionVersion) -> Result<Self, SchemaError> {
        match version {
            DefinitionVersion::V1 => {
                check_top_level_fields(tree, DefinitionV1::FIELDS)?;
                Ok(ProjectDefinition::V1(DefinitionV1::from_sections(tree)?))
            }
            DefinitionVersion::V1_1 => {
                let mut fields = DefinitionV1::FIELDS.to_vec();
                fields.push("env");
                check_top_level_fields(tree, &fields)?;

                let env = env_section(tree)?;
                Ok(ProjectDefinition::V1_1(DefinitionV11 {
                    base: DefinitionV1::from_sections(tree)?,
                    env,
                }))
            }
            DefinitionVersion::V2 => {
                check_top_level_fields(tree, DefinitionV2::FIELDS)?;
                let env = env_section(tree)?;

                let defaults = match tree.get("defaults") {
                    None | Some(Value::Null) => None,
                    Some(defaults @ Value::Object(_)) => Some(defaults.clone()),
                    Some(_) => {
                        return Err(SchemaError::invalid("defaults", "Input should be a valid dictionary"))
                    }
                };

                let entities = match tree.get("entities") {
                    None => return Err(SchemaError::invalid("entities", "Field required")),
                    Some(Value::Null) => IndexMap::new(),
                    Some(Value::Object(entities)) => entities
                        .iter()
                        .map(|(id, entity)| Ok((id.clone(), EntityModel::from_value(id, entity)?)))
                        .collect::<Result<_, SchemaError>>()?,
                    Some(_) => {
                        return Err(SchemaError::invalid("entities", "Input should be a valid dictionary"))
                    }
                };

                Ok(ProjectDefinition::V2(DefinitionV2 {
                    entities,
                    defaults,
                    env,
                }))
            }
        }
    }

    pub fn definition_version(&self) -> DefinitionVersion {
        match self {
            ProjectDefinition::V1(_) => DefinitionVersion::V1,
            ProjectDefinition::V1_1(_) => DefinitionVersion::V1_1,
            ProjectDefinition::V2(_) => DefinitionVersion::V2,
        }
    }

    pub fn meets_version_requirement(&self, required: &str) -> bool {
        self.definition_version().meets_version_requirement(required)
    }

    /// Version 1 sections, for versions that have them
    pub fn sections(&self) -> Option<&DefinitionV1> {
        match self {
            ProjectDefinition::V1(definition) => Some(definition),
            ProjectDefinition::V1_1(definition) => Some(&definition.base),
            ProjectDefinition::V2(_) => None,
        }
    }

    pub fn entities(&self) -> Option<&IndexMap<String, EntityModel>> {
        match self {
            ProjectDefinition::V2(definition) => Some(&definition.entities),
            _ => None,
        }
    }

    /// Declared `env` defaults
    pub fn env(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            ProjectDefinition::V1(_) => None,
            ProjectDefinition::V1_1(definition) => Some(&definition.env),
            ProjectDefinition::V2(definition) => Some(&definition.env),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    #[test]
    fn versions_from_strings_and_numbers() {
        assert_eq!(
            DefinitionVersion::from_tree(&tree(json!({"definition_version": "1.1"}))),
            Ok(DefinitionVersion::V1_1)
        );
        assert_eq!(
            DefinitionVersion::from_tree(&tree(json!({"definition_version": 2}))),
            Ok(DefinitionVersion::V2)
        );
        assert_eq!(
            DefinitionVersion::from_tree(&tree(json!({"definition_version": "1.2"})))
                .unwrap_err()
                .to_string(),
            "Version 1.2 is not supported. Supported versions: 1, 1.1, 2"
        );
        assert!(DefinitionVersion::from_tree(&tree(json!({}))).is_err());
    }

    #[test]
    fn version_requirements_are_semantic() {
        assert!(DefinitionVersion::V1_1.meets_version_requirement("1"));
        assert!(DefinitionVersion::V2.meets_version_requirement("1.1"));
        assert!(DefinitionVersion::V2.meets_version_requirement("2"));
        assert!(!DefinitionVersion::V1.meets_version_requirement("1.1"));
        assert!(meets_version_requirement("1.10", "1.9"));
        assert!(!meets_version_requirement("1", "invalid"));
        assert!(!DefinitionVersion::V1.supports_templating());
        assert!(DefinitionVersion::V1_1.supports_templating());
    }

    #[test]
    fn version_1_rejects_env() {
        let err = ProjectDefinition::from_tree(
            &tree(json!({"definition_version": "1", "env": {"a": "b"}})),
            DefinitionVersion::V1,
        )
        .unwrap_err();

        assert!(err.to_string().contains("unknown field `env`"), "{err}");
    }

    #[test]
    fn env_must_be_a_mapping_of_scalars() {
        let err = ProjectDefinition::from_tree(
            &tree(json!({"definition_version": "1.1", "env": ["test_env", "array_val1"]})),
            DefinitionVersion::V1_1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input should be a valid dictionary"));

        let err = ProjectDefinition::from_tree(
            &tree(json!({"definition_version": "1.1", "env": {"test_env": ["array_val1"]}})),
            DefinitionVersion::V1_1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input should be a valid string"));
    }

    #[test]
    fn version_2_entities() {
        let definition = ProjectDefinition::from_tree(
            &tree(json!({
                "definition_version": "2",
                "entities": {
                    "app": {"type": "application", "from": {"target": "pkg"}},
                },
            })),
            DefinitionVersion::V2,
        )
        .unwrap();

        assert_eq!(definition.definition_version(), DefinitionVersion::V2);
        assert_eq!(definition.entities().map(IndexMap::len), Some(1));
        assert!(definition.sections().is_none());
    }

    #[test]
    fn version_2_requires_entities() {
        let err = ProjectDefinition::from_tree(
            &tree(json!({"definition_version": "2"})),
            DefinitionVersion::V2,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "Invalid value for entities: Field required");
    }
}
