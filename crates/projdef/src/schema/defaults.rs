//! Version specific default values
//!
//! Defaults are written into the raw tree. For versions with templating this happens before references are resolved
//! so templates can refer to defaulted values (e.g. `ctx.native_app.package.name`).
use super::entities::{entity_type_name, EntityType};
use super::DefinitionVersion;
use crate::identifiers::append_to_identifier;
use crate::template::has_template_markers;
use crate::value::Value;

const NATIVE_APP_DEFAULTS: &[(&str, &str)] = &[
    ("bundle_root", "output/bundle/"),
    ("deploy_root", "output/deploy/"),
    ("generated_root", "__generated/"),
    ("scratch_stage", "app_src.stage_snowflake_cli_scratch"),
    ("source_stage", "app_src.stage"),
];

const SNOWPARK_DEFAULTS: &[(&str, &str)] = &[("src", "app/")];

const STREAMLIT_DEFAULTS: &[(&str, &str)] = &[
    ("main_file", "streamlit_app.py"),
    ("query_warehouse", "streamlit"),
    ("stage", "streamlit"),
];

/// Fill in defaults for `version`
///
/// `username` must already be sanitized.
pub fn apply_defaults(tree: &mut Value, version: DefinitionVersion, username: &str) {
    match version {
        DefinitionVersion::V1 | DefinitionVersion::V1_1 => {
            let templating = version.supports_templating();
            if let Some(native_app) = section(tree, "native_app") {
                native_app_defaults(native_app, username, templating);
            }
            if let Some(snowpark) = section(tree, "snowpark") {
                insert_all(snowpark, SNOWPARK_DEFAULTS);
            }
            if let Some(streamlit) = section(tree, "streamlit") {
                insert_all(streamlit, STREAMLIT_DEFAULTS);
            }
        }
        DefinitionVersion::V2 => entity_defaults(tree),
    }
}

fn section<'a>(tree: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    tree.as_object_mut()?
        .get_mut(name)
        .filter(|section| matches!(section, Value::Object(_)))
}

fn insert_all(section: &mut Value, defaults: &[(&str, &str)]) {
    for (key, value) in defaults {
        section.insert_default(key, *value);
    }
}

fn native_app_defaults(native_app: &mut Value, username: &str, templating: bool) {
    insert_all(native_app, NATIVE_APP_DEFAULTS);

    let name = native_app
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(package) = native_app.object_entry("package") {
        if let Some(name) = &name {
            package.insert_default("name", derived_name(name, &format!("_pkg_{username}"), templating));
        }
        package.insert_default("distribution", "internal");
    }

    if let Some(application) = native_app.object_entry("application") {
        if let Some(name) = &name {
            application.insert_default("name", derived_name(name, &format!("_{username}"), templating));
        }
    }
}

/// `name` with `suffix` appended as an identifier
///
/// A templated name is only known after resolution, so the concatenation is deferred to `fn.id_concat`.
fn derived_name(name: &str, suffix: &str, templating: bool) -> String {
    if templating && has_template_markers(name) {
        return format!("<% fn.id_concat(ctx.native_app.name, '{suffix}') %>");
    }

    append_to_identifier(name, suffix)
}

/// Merge per type defaults and the `defaults` section underneath each entity
fn entity_defaults(tree: &mut Value) {
    let shared = tree
        .get("defaults")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let Some(entities) = tree.as_object_mut().and_then(|root| root.get_mut("entities")) else {
        return;
    };
    let Some(entities) = entities.as_object_mut() else {
        return;
    };

    for (id, entity) in entities.iter_mut() {
        let Some(entity_type) = entity_type_name(entity).and_then(|name| name.parse::<EntityType>().ok()) else {
            tracing::debug!(%id, "skipping defaults for entity of unknown type");
            continue;
        };

        let mut defaults = Value::Object(
            shared
                .iter()
                .filter(|(key, _)| entity_type.accepts(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        );
        defaults.fill_defaults(&entity_type.defaults());

        entity.fill_defaults(&defaults);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn native_app_defaults_are_appended() {
        let mut tree = Value::from(json!({
            "native_app": {"name": "test_app", "artifacts": [], "application": {"debug": "true"}},
        }));
        apply_defaults(&mut tree, DefinitionVersion::V1_1, "jdoe");

        assert_eq!(
            tree,
            Value::from(json!({
                "native_app": {
                    "name": "test_app",
                    "artifacts": [],
                    "application": {"debug": "true", "name": "test_app_jdoe"},
                    "bundle_root": "output/bundle/",
                    "deploy_root": "output/deploy/",
                    "generated_root": "__generated/",
                    "scratch_stage": "app_src.stage_snowflake_cli_scratch",
                    "source_stage": "app_src.stage",
                    "package": {"name": "test_app_pkg_jdoe", "distribution": "internal"},
                },
            }))
        );
    }

    #[test]
    fn derived_names_follow_identifier_rules() {
        for (name, application, package) in [
            ("safe_name", "safe_name_jdoe", "safe_name_pkg_jdoe"),
            (r#""unsafe.name""#, r#""unsafe.name_jdoe""#, r#""unsafe.name_pkg_jdoe""#),
            (r#""safe_name""#, r#""safe_name_jdoe""#, r#""safe_name_pkg_jdoe""#),
            (r#""name_""_""#, r#""name_""__jdoe""#, r#""name_""__pkg_jdoe""#),
            ("unsafe.name", r#""unsafe.name_jdoe""#, r#""unsafe.name_pkg_jdoe""#),
        ] {
            let mut tree = Value::from(json!({"native_app": {"name": name}}));
            apply_defaults(&mut tree, DefinitionVersion::V1_1, "jdoe");

            let native_app = tree.get("native_app").unwrap();
            assert_eq!(
                native_app.get("application").and_then(|a| a.get("name")),
                Some(&Value::from(application)),
                "{name}"
            );
            assert_eq!(
                native_app.get("package").and_then(|p| p.get("name")),
                Some(&Value::from(package)),
                "{name}"
            );
        }
    }

    #[test]
    fn templated_names_are_deferred() {
        let mut tree = Value::from(json!({"native_app": {"name": "app_<% ctx.env.A %>"}}));
        apply_defaults(&mut tree, DefinitionVersion::V1_1, "jdoe");

        assert_eq!(
            tree.get_path(&["native_app".into(), "package".into(), "name".into()]),
            Some(&Value::from("<% fn.id_concat(ctx.native_app.name, '_pkg_jdoe') %>"))
        );
    }

    #[test]
    fn version_1_never_defers() {
        let mut tree = Value::from(json!({"native_app": {"name": "app_<% ctx.env.A %>"}}));
        apply_defaults(&mut tree, DefinitionVersion::V1, "jdoe");

        assert_eq!(
            tree.get_path(&["native_app".into(), "package".into(), "name".into()]),
            Some(&Value::from(r#""app_<% ctx.env.A %>_pkg_jdoe""#))
        );
    }

    #[test]
    fn entity_defaults_only_for_accepted_fields() {
        let mut tree = Value::from(json!({
            "defaults": {"stage": "shared.stage", "meta": {"role": "shared_role"}},
            "entities": {
                "pkg": {"type": "application package", "manifest": "app/manifest.yml", "artifacts": []},
                "app": {"type": "application", "from": {"target": "pkg"}, "meta": {"role": "own_role"}},
                "odd": {"type": "unknown"},
            },
        }));
        apply_defaults(&mut tree, DefinitionVersion::V2, "jdoe");

        let entity = |id: &str| tree.get("entities").and_then(|e| e.get(id)).cloned().unwrap();

        assert_eq!(entity("pkg").get("stage"), Some(&Value::from("shared.stage")));
        assert_eq!(entity("pkg").get("distribution"), Some(&Value::from("internal")));
        assert_eq!(
            entity("pkg").get_path(&["meta".into(), "role".into()]),
            Some(&Value::from("shared_role"))
        );
        assert_eq!(entity("app").get("stage"), None);
        assert_eq!(
            entity("app").get_path(&["meta".into(), "role".into()]),
            Some(&Value::from("own_role"))
        );
        assert_eq!(entity("odd"), Value::from(json!({"type": "unknown"})));
    }
}
