//! Project environment variables (`ctx.env.*`)
//!
//! Three layers are consulted, highest precedence first:
//! 1. overrides supplied by the invoking command (e.g. `--env KEY=VALUE`)
//! 2. the ambient process environment
//! 3. defaults declared in the `env` section of the definition
//!
//! Values from the first two layers are external data and are never template-expanded.
use crate::value::Value;
use indexmap::IndexMap;

pub const DEFAULT_USERNAME: &str = "unknown_user";

/// Source of ambient environment variables
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Ambient {
    /// The environment of the running process
    #[default]
    Process,
    /// A fixed set of variables, used instead of the process environment
    Fixed(IndexMap<String, String>),
}

impl Ambient {
    pub fn fixed<K: Into<String>, V: Into<String>>(vars: impl IntoIterator<Item = (K, V)>) -> Self {
        Ambient::Fixed(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            Ambient::Process => std::env::var(name).ok(),
            Ambient::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Login name of the current user, if any
    pub fn username(&self) -> Option<String> {
        ["USER", "USERNAME", "LOGNAME"]
            .into_iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
    }

    /// Sanitized username used when deriving default object names
    pub fn sanitized_username(&self) -> String {
        let username = self
            .username()
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        crate::identifiers::clean_identifier(&username)
    }
}

/// Environment variables visible to templates as `ctx.env`
#[derive(Debug, Clone, Default, PartialEq, derive_new::new)]
pub struct ProjectEnvironment {
    default_env: IndexMap<String, Value>,
    override_env: IndexMap<String, String>,
    #[new(default)]
    ambient: Ambient,
}

impl ProjectEnvironment {
    pub fn with_ambient(mut self, ambient: Ambient) -> Self {
        self.ambient = ambient;
        self
    }

    /// Value from the override or ambient layer
    ///
    /// These values are external and must be used verbatim.
    pub fn external(&self, name: &str) -> Option<String> {
        self.override_env
            .get(name)
            .cloned()
            .or_else(|| self.ambient.get(name))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.external(name)
            .map(Value::String)
            .or_else(|| self.default_env.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn default_env(&self) -> &IndexMap<String, Value> {
        &self.default_env
    }

    pub fn override_env(&self) -> &IndexMap<String, String> {
        &self.override_env
    }

    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }

    pub(crate) fn set_default_env(&mut self, default_env: IndexMap<String, Value>) {
        self.default_env = default_env;
    }

    /// Effective value of every declared or overridden variable
    pub fn effective(&self) -> IndexMap<String, Value> {
        self.default_env
            .keys()
            .chain(self.override_env.keys())
            .filter_map(|name| self.get(name).map(|value| (name.clone(), value)))
            .collect()
    }
}

impl serde::Serialize for ProjectEnvironment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.effective().serialize(serializer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn environment(ambient: &[(&str, &str)]) -> ProjectEnvironment {
        ProjectEnvironment::new(
            IndexMap::from([("name".to_string(), Value::from("from_default"))]),
            IndexMap::from([("name".to_string(), "from_override".to_string())]),
        )
        .with_ambient(Ambient::fixed(ambient.iter().copied()))
    }

    #[test]
    fn override_wins_over_everything() {
        let env = environment(&[("name", "from_ambient")]);
        assert_eq!(env.get("name"), Some(Value::from("from_override")));
    }

    #[test]
    fn ambient_wins_over_default() {
        let env = ProjectEnvironment::new(
            IndexMap::from([("name".to_string(), Value::from("from_default"))]),
            IndexMap::new(),
        )
        .with_ambient(Ambient::fixed([("name", "from_ambient")]));

        assert_eq!(env.get("name"), Some(Value::from("from_ambient")));
    }

    #[test]
    fn default_is_the_last_resort() {
        let env = ProjectEnvironment::new(
            IndexMap::from([("name".to_string(), Value::Integer(1))]),
            IndexMap::new(),
        )
        .with_ambient(Ambient::fixed(Vec::<(String, String)>::new()));

        assert_eq!(env.get("name"), Some(Value::Integer(1)));
        assert_eq!(env.get("missing"), None);
    }

    #[test]
    fn contains_agrees_with_get() {
        let env = environment(&[("ambient_only", "")]);

        for name in ["name", "ambient_only", "missing"] {
            assert_eq!(env.contains(name), env.get(name).is_some(), "{name}");
        }
        assert!(env.contains("ambient_only"));
        assert!(!env.contains("missing"));
    }

    #[test]
    fn username_falls_back() {
        assert_eq!(
            Ambient::fixed([("USER", ""), ("LOGNAME", "Jane.Doe")]).sanitized_username(),
            "janedoe"
        );
        assert_eq!(
            Ambient::fixed(Vec::<(String, String)>::new()).sanitized_username(),
            "unknown_user"
        );
    }
}
