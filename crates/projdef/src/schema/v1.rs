//! Flat `native_app`/`snowpark`/`streamlit` sections of definition versions 1 and 1.1
use super::fields::{lenient_bool, Distribution, PathMapping, PostDeployHook, Signature};
use super::{SchemaError, Validate};
use crate::identifiers;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NativeApp {
    pub name: String,
    pub artifacts: Vec<PathMapping>,
    pub bundle_root: String,
    pub deploy_root: String,
    pub generated_root: String,
    pub scratch_stage: String,
    pub source_stage: String,
    pub package: Package,
    pub application: Application,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub name: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub post_deploy: Vec<PostDeployHook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Application {
    #[serde(default)]
    pub role: Option<String>,
    pub name: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug: Option<bool>,
    #[serde(default)]
    pub post_deploy: Vec<PostDeployHook>,
}

impl Validate for NativeApp {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        if !identifiers::is_valid_qualified_identifier(&self.source_stage) {
            return Err(SchemaError::IncorrectValue {
                field: "source_stage".to_string(),
                location: location.to_string(),
            });
        }

        self.package.validate(&format!("{location}.package"))?;
        self.application
            .validate(&format!("{location}.application"))
    }
}

impl Validate for Package {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        validate_identifier(location, "role", self.role.as_deref())?;
        validate_identifier(location, "warehouse", self.warehouse.as_deref())?;

        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = self.scripts.iter().find(|script| !seen.insert(*script)) {
            return Err(SchemaError::Invalid {
                location: format!("{location}.scripts"),
                message: format!("package scripts must be unique, found '{duplicate}' twice"),
            });
        }

        Ok(())
    }
}

impl Validate for Application {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        validate_identifier(location, "role", self.role.as_deref())?;
        validate_identifier(location, "warehouse", self.warehouse.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snowpark {
    pub project_name: String,
    pub stage_name: String,
    pub src: String,
    #[serde(default)]
    pub functions: Vec<Callable>,
    #[serde(default)]
    pub procedures: Vec<Callable>,
}

/// A function or procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Callable {
    pub name: String,
    pub handler: String,
    pub returns: String,
    pub signature: Signature,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub external_access_integrations: Vec<String>,
    #[serde(default)]
    pub secrets: IndexMap<String, String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub execute_as_caller: Option<bool>,
}

impl Validate for Snowpark {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        for (index, function) in self.functions.iter().enumerate() {
            if function.execute_as_caller.is_some() {
                return Err(SchemaError::Invalid {
                    location: format!("{location}.functions.{index}"),
                    message: "unknown field `execute_as_caller`".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Streamlit {
    pub name: String,
    pub stage: String,
    pub query_warehouse: String,
    pub main_file: String,
    #[serde(default)]
    pub env_file: Option<String>,
    #[serde(default)]
    pub pages_dir: Option<String>,
    #[serde(default)]
    pub additional_source_files: Option<Vec<String>>,
}

impl Validate for Streamlit {
    fn validate(&self, location: &str) -> Result<(), SchemaError> {
        validate_identifier(location, "query_warehouse", Some(&self.query_warehouse))
    }
}

pub(crate) fn validate_identifier(
    location: &str,
    field: &str,
    value: Option<&str>,
) -> Result<(), SchemaError> {
    match value {
        Some(value) if !identifiers::is_valid_identifier(value) => Err(SchemaError::IncorrectValue {
            field: field.to_string(),
            location: location.to_string(),
        }),
        _ => Ok(()),
    }
}
