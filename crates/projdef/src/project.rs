//! Locating the definition files of a project
//!
//! A project is a directory containing `snowflake.yml`. An optional `snowflake.local.yml` next to it is merged on top.
use crate::definition::{load_project, DefinitionError, OverrideContext, RenderedDefinition};
use crate::definition_files::LoadError;
use crate::environment::Ambient;
use std::path::{Path, PathBuf};

pub const BASE_DEFINITION_FILENAME: &str = "snowflake.yml";
pub const USER_DEFINITION_FILENAME: &str = "snowflake.local.yml";

#[derive(Debug, Clone)]
pub struct DefinitionManager {
    project_root: PathBuf,
    definition_files: Vec<PathBuf>,
}

impl DefinitionManager {
    /// Definition files of the project at `project_root`
    ///
    /// Without explicit `project_files` the base file and, if present, the user file are used. Explicit files are
    /// relative to the project root.
    pub fn new(project_root: &Path, project_files: Option<&[PathBuf]>) -> Result<Self, LoadError> {
        let definition_files = match project_files {
            Some(files) => files.iter().map(|file| project_root.join(file)).collect(),
            None => find_definition_files(project_root),
        };

        if let Some(missing) = definition_files.iter().find(|file| !file.is_file()) {
            return Err(LoadError::MissingFile {
                path: missing.clone(),
                root: project_root.to_owned(),
            });
        }

        Ok(Self {
            project_root: project_root.to_owned(),
            definition_files,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn definition_files(&self) -> &[PathBuf] {
        &self.definition_files
    }

    pub fn load(&self, overrides: &OverrideContext, ambient: &Ambient) -> Result<RenderedDefinition, DefinitionError> {
        load_project(&self.definition_files, overrides, ambient)
    }
}

fn find_definition_files(project_root: &Path) -> Vec<PathBuf> {
    let base = project_root.join(BASE_DEFINITION_FILENAME);
    let user = project_root.join(USER_DEFINITION_FILENAME);

    if user.is_file() {
        vec![base, user]
    } else {
        vec![base]
    }
}

/// Walk up from `search_path` to the first directory containing `snowflake.yml`
///
/// The search gives up at the filesystem root and at `home`.
pub fn find_project_root(search_path: &Path, home: Option<&Path>) -> Option<PathBuf> {
    for directory in search_path.ancestors() {
        if directory.parent().is_none() || Some(directory) == home {
            tracing::debug!(directory=%directory.display(), "stopping project search");
            return None;
        }

        if directory.join(BASE_DEFINITION_FILENAME).is_file() {
            return Some(directory.to_owned());
        }
    }

    None
}

/// Project root from an explicit directory or by searching upwards from `cwd`
///
/// The search stops at the user's home directory.
pub fn discover(project: Option<&Path>, cwd: &Path) -> Result<DefinitionManager, LoadError> {
    let home = dirs::home_dir();

    let root = match project {
        Some(project) => project.to_owned(),
        None => find_project_root(cwd, home.as_deref()).ok_or(LoadError::NoProjectDefinition)?,
    };

    DefinitionManager::new(&root, None)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_base_file() {
        let err = DefinitionManager::new(Path::new("/hello/world"), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot find project definition (/hello/world/snowflake.yml) in /hello/world."
        );
    }

    #[test]
    fn missing_explicit_file() {
        let files = [PathBuf::from("snowflake.my.file")];
        let err = DefinitionManager::new(Path::new("/hello/world"), Some(&files)).unwrap_err();
        assert!(matches!(err, LoadError::MissingFile { .. }));
    }

    #[test]
    fn no_project_above_root() {
        assert_eq!(find_project_root(Path::new("/"), None), None);
    }

    #[test]
    fn search_stops_at_home() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(BASE_DEFINITION_FILENAME), "definition_version: 1").unwrap();
        let nested = home.path().join("projects/app");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested, Some(home.path())), None);
        assert_eq!(find_project_root(&nested, None), Some(home.path().to_owned()));
    }
}
