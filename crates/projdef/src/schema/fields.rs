//! Field types and lenient deserializers shared by all schema versions
//!
//! Definition files load every scalar as a string, so typed fields have to accept their string form.
use serde::{de, Deserialize, Deserializer, Serialize};

/// `"true"`, `"yes"`, `"on"`, `"1"` and friends, case-insensitive
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" | "t" => Some(true),
        "false" | "no" | "off" | "0" | "n" | "f" => Some(false),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Text(String),
}

pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<BoolLike>::deserialize(deserializer)
        .map_err(|_| de::Error::custom("Input should be a valid boolean"))?
    else {
        return Ok(None);
    };

    let parsed = match value {
        BoolLike::Bool(b) => Some(b),
        BoolLike::Int(0) => Some(false),
        BoolLike::Int(1) => Some(true),
        BoolLike::Int(_) => None,
        BoolLike::Text(text) => parse_bool(&text),
    };

    parsed
        .map(Some)
        .ok_or_else(|| de::Error::custom("Input should be a valid boolean"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntLike {
    Int(u32),
    Text(String),
}

pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<IntLike>::deserialize(deserializer)
        .map_err(|_| de::Error::custom("Input should be a valid integer"))?
    else {
        return Ok(None);
    };

    match value {
        IntLike::Int(i) => Ok(Some(i)),
        IntLike::Text(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom("Input should be a valid integer")),
    }
}

/// Artifact source and optional destination relative to the deploy root
///
/// Written either as a plain `src` string or as `{src, dest}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMapping {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

impl PathMapping {
    /// Destination path, defaults to the source path
    pub fn destination(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.src)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PathMappingFields {
    src: String,
    #[serde(default)]
    dest: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathMappingForm {
    Plain(String),
    Mapping(PathMappingFields),
}

impl<'de> Deserialize<'de> for PathMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match PathMappingForm::deserialize(deserializer).map_err(|_| {
            de::Error::custom("Input should be a valid string or a mapping with src and optional dest")
        })? {
            PathMappingForm::Plain(src) => Ok(PathMapping { src, dest: None }),
            PathMappingForm::Mapping(fields) => Ok(PathMapping {
                src: fields.src,
                dest: fields.dest,
            }),
        }
    }
}

/// SQL script executed after deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostDeployHook {
    pub sql_script: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Internal,
    External,
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        match text.to_ascii_lowercase().as_str() {
            "internal" => Ok(Distribution::Internal),
            "external" => Ok(Distribution::External),
            _ => Err(de::Error::custom(format!(
                "Input should be 'internal' or 'external', got '{text}'"
            ))),
        }
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::Internal => f.write_str("internal"),
            Distribution::External => f.write_str("external"),
        }
    }
}

/// Function or procedure signature, either `""` or a list of arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signature {
    Text(String),
    Arguments(Vec<Argument>),
}

impl Default for Signature {
    fn default() -> Self {
        Signature::Arguments(vec![])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Deserialize, Debug)]
    struct Flags {
        #[serde(default, deserialize_with = "lenient_bool")]
        debug: Option<bool>,
        #[serde(default, deserialize_with = "lenient_u32")]
        count: Option<u32>,
    }

    #[test]
    fn booleans_from_strings() {
        for (input, expected) in [
            (json!("true"), Some(true)),
            (json!("False"), Some(false)),
            (json!("yes"), Some(true)),
            (json!(true), Some(true)),
            (json!(0), Some(false)),
            (json!(null), None),
        ] {
            let flags: Flags = serde_json::from_value(json!({ "debug": input })).unwrap();
            assert_eq!(flags.debug, expected, "{input}");
        }

        let err = serde_json::from_value::<Flags>(json!({"debug": "invalid boolean"})).unwrap_err();
        assert_eq!(err.to_string(), "Input should be a valid boolean");
    }

    #[test]
    fn integers_from_strings() {
        let flags: Flags = serde_json::from_value(json!({"count": "3"})).unwrap();
        assert_eq!(flags.count, Some(3));

        let flags: Flags = serde_json::from_value(json!({})).unwrap();
        assert_eq!(flags.count, None);
    }

    #[test]
    fn path_mappings() {
        let mappings: Vec<PathMapping> =
            serde_json::from_value(json!(["setup.sql", {"src": "app/*", "dest": "./"}])).unwrap();

        assert_eq!(mappings[0].destination(), "setup.sql");
        assert_eq!(mappings[1].destination(), "./");
        assert!(serde_json::from_value::<Vec<PathMapping>>(json!([{"dest": "x"}])).is_err());
    }

    #[test]
    fn distribution_is_case_insensitive() {
        let distribution: Distribution = serde_json::from_value(json!("EXTERNAL")).unwrap();
        assert_eq!(distribution, Distribution::External);
        assert!(serde_json::from_value::<Distribution>(json!("public")).is_err());
    }
}
