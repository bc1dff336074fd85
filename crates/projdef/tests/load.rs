//! Loading projects from disk and acting on their entities

use pretty_assertions::assert_eq;
use projdef::definition_files::LoadError;
use projdef::environment::Ambient;
use projdef::project::{discover, find_project_root, DefinitionManager};
use projdef::value::Value;
use projdef::workspace::actions::{ActionOutcome, ArtifactMapping, Console, EntityAction};
use projdef::workspace::sql::DryRunExecutor;
use projdef::workspace::WorkspaceManager;
use projdef::{load_project, DefinitionError, OverrideContext};
use std::path::{Path, PathBuf};

const BASE: &str = r#"
definition_version: 2
entities:
  pkg:
    type: application package
    identifier: pkg_<% ctx.env.suffix %>
    manifest: manifest.yml
    artifacts:
      - manifest.yml
      - src: setup.sql
        dest: scripts/setup.sql
env:
  suffix: base
"#;

const LOCAL: &str = r#"
env:
  suffix: local
"#;

struct Quiet;

impl Console for Quiet {
    fn step(&self, _: &str) {}
    fn message(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}

fn write(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

fn ambient() -> Ambient {
    Ambient::fixed([("USER", "jdoe")])
}

#[test]
fn local_file_is_merged_on_top() {
    let project = tempfile::tempdir().unwrap();
    write(project.path(), &[("snowflake.yml", BASE), ("snowflake.local.yml", LOCAL)]);
    let nested = project.path().join("app/src");
    std::fs::create_dir_all(&nested).unwrap();

    let manager = discover(None, &nested).unwrap();
    assert_eq!(manager.project_root(), project.path());
    assert_eq!(
        manager.definition_files(),
        &[
            project.path().join("snowflake.yml"),
            project.path().join("snowflake.local.yml"),
        ]
    );

    let rendered = manager.load(&OverrideContext::default(), &ambient()).unwrap();
    assert_eq!(
        rendered.project_context.lookup("ctx.entities.pkg.identifier"),
        Some(Value::from("pkg_local"))
    );
}

#[test]
fn environment_precedence() {
    let project = tempfile::tempdir().unwrap();
    write(project.path(), &[("snowflake.yml", BASE)]);
    let manager = DefinitionManager::new(project.path(), None).unwrap();

    let identifier = |overrides: &OverrideContext, ambient: &Ambient| {
        manager
            .load(overrides, ambient)
            .unwrap()
            .project_context
            .lookup("ctx.entities.pkg.identifier")
    };

    assert_eq!(
        identifier(&OverrideContext::default(), &ambient()),
        Some(Value::from("pkg_base"))
    );
    assert_eq!(
        identifier(
            &OverrideContext::default(),
            &Ambient::fixed([("USER", "jdoe"), ("suffix", "shell")])
        ),
        Some(Value::from("pkg_shell"))
    );
    assert_eq!(
        identifier(
            &OverrideContext::from_pairs([("suffix", "cli")]),
            &Ambient::fixed([("USER", "jdoe"), ("suffix", "shell")])
        ),
        Some(Value::from("pkg_cli"))
    );
}

#[test]
fn nothing_to_load() {
    let err = load_project(&[] as &[PathBuf], &OverrideContext::default(), &ambient()).unwrap_err();
    assert!(matches!(err, DefinitionError::Load(LoadError::NoFiles)));

    let empty = tempfile::tempdir().unwrap();
    assert_eq!(find_project_root(empty.path(), Some(empty.path())), None);
    let err = discover(Some(empty.path()), empty.path()).unwrap_err();
    assert!(matches!(err, LoadError::MissingFile { .. }));
}

#[test]
fn bundle_and_deploy_package() {
    let project = tempfile::tempdir().unwrap();
    write(
        project.path(),
        &[
            ("snowflake.yml", BASE),
            ("manifest.yml", "manifest_version: 1\n"),
            ("setup.sql", "select 1;\n"),
        ],
    );
    let manager = DefinitionManager::new(project.path(), None).unwrap();
    let rendered = manager.load(&OverrideContext::default(), &ambient()).unwrap();

    let executor = DryRunExecutor::new("dry_role".to_string());
    let mut workspace = WorkspaceManager::new(
        &rendered.project_definition,
        manager.project_root(),
        None,
        None,
        &Quiet,
        &executor,
    )
    .unwrap();

    assert_eq!(
        workspace.perform_action("pkg", EntityAction::Bundle).unwrap(),
        ActionOutcome::Bundled(vec![
            ArtifactMapping {
                source: PathBuf::from("manifest.yml"),
                destination: PathBuf::from("manifest.yml"),
            },
            ArtifactMapping {
                source: PathBuf::from("setup.sql"),
                destination: PathBuf::from("scripts/setup.sql"),
            },
        ])
    );

    workspace.perform_action("pkg", EntityAction::Deploy).unwrap();
    let statements = executor.statements();
    assert!(
        statements.contains(&"create application package if not exists pkg_base distribution = internal".to_string()),
        "{statements:#?}"
    );
    assert!(
        statements.iter().any(|statement| statement.starts_with("put ")
            && statement.ends_with("@pkg_base.app_src.stage/scripts auto_compress = false overwrite = true")),
        "{statements:#?}"
    );
}
