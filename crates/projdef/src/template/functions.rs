//! Built-in functions available as `fn.<name>(...)`
use super::TemplateError;
use crate::identifiers;
use crate::value::Value;

struct Function {
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    call: fn(&TemplatingFunctions, &[String]) -> String,
}

const FUNCTIONS: &[Function] = &[
    Function {
        name: "id_concat",
        min_args: 1,
        max_args: None,
        call: id_concat,
    },
    Function {
        name: "str_to_id",
        min_args: 1,
        max_args: Some(1),
        call: str_to_id,
    },
    Function {
        name: "id_to_str",
        min_args: 1,
        max_args: Some(1),
        call: id_to_str,
    },
    Function {
        name: "get_username",
        min_args: 0,
        max_args: Some(0),
        call: get_username,
    },
    Function {
        name: "clean_id",
        min_args: 1,
        max_args: Some(1),
        call: clean_id,
    },
];

fn id_concat(_: &TemplatingFunctions, args: &[String]) -> String {
    identifiers::concat_identifiers(args)
}

fn str_to_id(_: &TemplatingFunctions, args: &[String]) -> String {
    identifiers::to_identifier(&args[0])
}

fn id_to_str(_: &TemplatingFunctions, args: &[String]) -> String {
    identifiers::identifier_to_str(&args[0])
}

fn get_username(functions: &TemplatingFunctions, _: &[String]) -> String {
    functions.username.clone()
}

fn clean_id(_: &TemplatingFunctions, args: &[String]) -> String {
    identifiers::clean_identifier(&args[0])
}

/// The `fn` namespace
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct TemplatingFunctions {
    /// Sanitized user name returned by `fn.get_username()`
    username: String,
}

impl TemplatingFunctions {
    pub fn names() -> impl Iterator<Item = &'static str> {
        FUNCTIONS.iter().map(|function| function.name)
    }

    pub fn contains(name: &str) -> bool {
        FUNCTIONS.iter().any(|function| function.name == name)
    }

    /// Call `name` after validating argument count and types
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
        let Some(function) = FUNCTIONS.iter().find(|function| function.name == name) else {
            return Err(TemplateError::UnknownVariable(format!("fn.{name}")));
        };

        if args.len() < function.min_args {
            return Err(TemplateError::TooFewArguments {
                function: name.to_string(),
                count: function.min_args,
            });
        }

        if let Some(max_args) = function.max_args {
            if args.len() > max_args {
                return Err(TemplateError::TooManyArguments {
                    function: name.to_string(),
                    count: max_args,
                });
            }
        }

        let args = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => Ok(s.clone()),
                _ => Err(TemplateError::NonStringArgument {
                    function: name.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!(function = name, ?args, "calling template function");
        Ok(Value::String((function.call)(self, &args)))
    }
}

impl serde::Serialize for TemplatingFunctions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(Self::names())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[&str]) -> Result<Value, TemplateError> {
        let args: Vec<Value> = args.iter().map(|arg| Value::from(*arg)).collect();
        TemplatingFunctions::new("jdoe".to_string()).call(name, &args)
    }

    #[test]
    fn id_concat() {
        assert_eq!(call("id_concat", &["first_", "second"]), Ok(Value::from("first_second")));
        assert_eq!(call("id_concat", &["first.", "second"]), Ok(Value::from(r#""first.second""#)));
        assert_eq!(call("id_concat", &["first_", "1.1"]), Ok(Value::from(r#""first_1.1""#)));
        assert_eq!(
            call("id_concat", &[r#""first_""#, "second"]),
            Ok(Value::from(r#""first_second""#))
        );
        assert_eq!(
            call("id_concat", &[]).unwrap_err().to_string(),
            "id_concat requires at least 1 argument(s)"
        );
    }

    #[test]
    fn str_to_id() {
        assert_eq!(call("str_to_id", &["id"]), Ok(Value::from("id")));
        assert_eq!(call("str_to_id", &["id with space"]), Ok(Value::from(r#""id with space""#)));
        assert_eq!(call("str_to_id", &[r#""quoted""#]), Ok(Value::from(r#""quoted""#)));
        assert_eq!(call("str_to_id", &[r#"a"b"#]), Ok(Value::from(r#""a""b""#)));
    }

    #[test]
    fn id_to_str() {
        assert_eq!(call("id_to_str", &["id"]), Ok(Value::from("id")));
        assert_eq!(call("id_to_str", &[r#""id with space""#]), Ok(Value::from("id with space")));
        assert_eq!(call("id_to_str", &[r#""a""b""#]), Ok(Value::from(r#"a"b"#)));
        assert_eq!(
            call("id_to_str", &["a", "b"]).unwrap_err().to_string(),
            "id_to_str supports at most 1 argument(s)"
        );
        assert_eq!(
            call("id_to_str", &[]).unwrap_err().to_string(),
            "id_to_str requires at least 1 argument(s)"
        );
    }

    #[test]
    fn username_and_clean_id() {
        assert_eq!(call("get_username", &[]), Ok(Value::from("jdoe")));
        assert_eq!(call("clean_id", &["Jane.Doe"]), Ok(Value::from("janedoe")));
    }

    #[test]
    fn only_strings_are_accepted() {
        let err = TemplatingFunctions::new("jdoe".to_string())
            .call("id_concat", &[Value::Integer(123)])
            .unwrap_err();
        assert_eq!(err.to_string(), "id_concat only accepts String values");
    }

    #[test]
    fn serializes_as_function_names() {
        let json = serde_json::to_value(TemplatingFunctions::new("jdoe".to_string())).unwrap();
        assert_eq!(
            json,
            serde_json::json!(["id_concat", "str_to_id", "id_to_str", "get_username", "clean_id"])
        );
    }
}
