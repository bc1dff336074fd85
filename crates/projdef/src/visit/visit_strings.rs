use super::Visit;
use crate::value::{PathSegment, Value};

/// Recursively visit all string scalars, in document order
pub trait VisitStrings {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>);
}

impl VisitStrings for Value {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>) {
        let mut path = Vec::new();
        visit_value(self, &mut path, visitor);
    }
}

fn visit_value(value: &Value, path: &mut Vec<PathSegment>, visitor: &mut dyn Visit<str>) {
    match value {
        Value::String(s) => visitor.visit(path, s),
        Value::Array(array) => {
            for (index, element) in array.iter().enumerate() {
                path.push(PathSegment::Index(index));
                visit_value(element, path, visitor);
                path.pop();
            }
        }
        Value::Object(object) => {
            for (key, element) in object {
                path.push(PathSegment::Key(key.clone()));
                visit_value(element, path, visitor);
                path.pop();
            }
        }
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Decimal(_) => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::display_path;
    use pretty_assertions::assert_eq;

    #[test]
    fn visits_strings_in_document_order() {
        let value = Value::from(serde_json::json!({
            "b": "first",
            "a": {"list": ["second", 1, {"c": "third"}]},
            "flag": true,
        }));

        let mut seen = vec![];
        value.visit_strings(&mut |path: &[PathSegment], s: &str| {
            seen.push((display_path(path), s.to_string()))
        });

        assert_eq!(
            seen,
            vec![
                ("b".to_string(), "first".to_string()),
                ("a.list.0".to_string(), "second".to_string()),
                ("a.list.2.c".to_string(), "third".to_string()),
            ]
        );
    }
}
