//! collection of definition documents (parsed tree and path to source file)
//!
//! [DefinitionFiles] keeps documents in insertion order. Merging applies them left to right: later documents override
//! earlier ones key by key (see [Value::deep_merge]).
//!
//! At this point documents only have to be valid yaml mappings to be accepted. Every scalar is kept as a string so
//! nothing is coerced before templates are resolved.
use crate::value::Value;
use std::path::{Path, PathBuf};

#[derive(Default, Debug)]
pub struct DefinitionFiles {
    sources: Vec<Source>,
    documents: Vec<Value>,
}

impl DefinitionFiles {
    /// Inserts a parsed document
    pub fn insert(&mut self, document: Value, path: impl Into<Option<PathBuf>>) {
        self.sources.push(path.into());
        self.documents.push(document);
    }

    pub fn documents(&self) -> impl Iterator<Item = SourceDocument<'_>> {
        self.sources.iter().zip(self.documents.iter())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Deep merge all documents, later documents win
    pub fn merged(&self) -> Result<Value, LoadError> {
        let mut documents = self.documents.iter().cloned();
        let Some(mut merged) = documents.next() else {
            return Err(LoadError::NoFiles);
        };

        for document in documents {
            merged.deep_merge(document);
        }

        Ok(merged)
    }
}

impl DefinitionFiles {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path
            .canonicalize()
            .map_err(|source| LoadError::Io {
                path: file_path.to_owned(),
                source,
            })?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path).map_err(|source| LoadError::Io {
            path: file_path.clone(),
            source,
        })?;
        let document = parse_document(&file_contents).map_err(|err| err.with_path(&file_path))?;

        self.insert(document, Some(file_path));
        Ok(())
    }

    /// Load every file in order
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, LoadError> {
        if paths.is_empty() {
            return Err(LoadError::NoFiles);
        }

        let mut files = DefinitionFiles::default();
        for path in paths {
            files.load_file(path.as_ref())?;
        }

        Ok(files)
    }
}

/// Parse a single document, an empty document is an empty mapping
pub fn parse_document(text: &str) -> Result<Value, LoadError> {
    match Value::from_yaml_text(text)? {
        Value::Null => Ok(Value::object()),
        document @ Value::Object(_) => Ok(document),
        other => Err(LoadError::NotAMapping {
            path: None,
            found: other.type_name(),
        }),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Need at least one definition file.")]
    NoFiles,
    #[error("Unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to parse yaml")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Unable to parse yaml in {}", .path.display())]
    YamlParseFailedIn {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Definition file{} must contain a mapping, found {found}", display_source(.path))]
    NotAMapping {
        path: Option<PathBuf>,
        found: &'static str,
    },
    #[error("Cannot find project definition (snowflake.yml). Please provide a path to the project or run this command in a valid project directory.")]
    NoProjectDefinition,
    #[error("Cannot find project definition ({}) in {}.", .path.display(), .root.display())]
    MissingFile { path: PathBuf, root: PathBuf },
}

impl LoadError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            LoadError::YamlParseFailed(source) => LoadError::YamlParseFailedIn {
                path: path.to_owned(),
                source,
            },
            LoadError::NotAMapping { found, .. } => LoadError::NotAMapping {
                path: Some(path.to_owned()),
                found,
            },
            other => other,
        }
    }
}

impl From<Value> for DefinitionFiles {
    fn from(value: Value) -> Self {
        let mut files = DefinitionFiles::default();
        files.insert(value, None);
        files
    }
}

/// Utility macro to create [DefinitionFiles]
///
/// Create from a single document
/// ```
/// # use projdef::definition_files;
/// definition_files!("definition_version: 1");
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use projdef::definition_files;
/// definition_files! {
///   "snowflake.yml" => "definition_version: 1",
///   "snowflake.local.yml" => "native_app: {name: app}"
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use projdef::definition_files;
/// definition_files!("- not a mapping");
/// ```
#[macro_export]
macro_rules! definition_files {
    // single document without source
    { $expr:expr } => {
        $crate::definition_files::DefinitionFiles::from($crate::definition_files::parse_document($expr).expect("document must parse"))
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut files = $crate::definition_files::DefinitionFiles::default();
        $(
            files.insert($crate::definition_files::parse_document($expr).expect("document must parse"), Some(std::path::PathBuf::from($source)));
        )+

        files
    }};
}

fn display_source(source: &Source) -> String {
    source
        .as_ref()
        .map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

pub type Source = Option<PathBuf>;
pub type SourceDocument<'a> = (&'a Source, &'a Value);

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn later_documents_win() {
        let files = definition_files! {
            "snowflake.yml" => "native_app:\n  name: base\n  artifacts: [a, b]\n  package:\n    role: r",
            "snowflake.local.yml" => "native_app:\n  artifacts: [c]\n  package:\n    name: pkg"
        };

        assert_eq!(files.source_count(), 2);
        assert_eq!(
            files.merged().unwrap(),
            Value::from(json!({
                "native_app": {
                    "name": "base",
                    "artifacts": ["c"],
                    "package": {"role": "r", "name": "pkg"},
                }
            }))
        );
    }

    #[test]
    fn no_documents() {
        let err = DefinitionFiles::default().merged().unwrap_err();
        assert_eq!(err.to_string(), "Need at least one definition file.");

        let err = DefinitionFiles::load_files::<PathBuf>(&[]).unwrap_err();
        assert!(matches!(err, LoadError::NoFiles));
    }

    #[test]
    fn empty_document_is_an_empty_mapping() {
        assert_eq!(parse_document("").unwrap(), Value::object());
    }

    #[test]
    fn root_must_be_a_mapping() {
        let err = parse_document("- a\n- b").unwrap_err();
        assert_eq!(err.to_string(), "Definition file must contain a mapping, found array");
    }
}
