//! Parser for `<% ... %>` reference expressions
//!
//! A raw string is split into literal text and expression segments. Expressions are parsed with [nom]:
//!
//! ```text
//! expression = string | integer | path [ "(" [ expression { "," expression } ] ")" ]
//! path       = ident { "." ident }
//! ident      = [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! Anything left over after an expression (bracket indexing, digit segments, operators) is rejected as unexpected
//! syntax.
use super::TemplateError;
use crate::value::Value;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{opt, recognize},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

pub const OPEN: &str = "<%";
pub const CLOSE: &str = "%>";

/// A parsed raw string
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `ctx.native_app.name`
    Variable(VariablePath),
    /// `fn.id_concat(ctx.native_app.name, '_suffix')`
    Call {
        function: VariablePath,
        arguments: Vec<Expression>,
    },
    /// `'text'` or `42`
    Literal(Value),
}

/// Dotted path as written in a template, e.g. `ctx.env.name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariablePath(Vec<String>);

impl VariablePath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Name of the built-in function for `fn.<name>`
    pub fn function_name(&self) -> Option<&str> {
        match self.0.as_slice() {
            [root, name] if root == "fn" => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariablePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for VariablePath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        VariablePath(iter.into_iter().map(Into::into).collect())
    }
}

impl Template {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The expression, when the template consists of nothing else
    pub fn single_expression(&self) -> Option<&Expression> {
        match self.segments.as_slice() {
            [Segment::Expression(expression)] => Some(expression),
            _ => None,
        }
    }
}

/// Split `raw` into literal and expression segments
pub fn parse_template(raw: &str) -> Result<Template, TemplateError> {
    let mut segments = vec![];
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }

        let inner = &rest[start + OPEN.len()..];
        let Some(end) = inner.find(CLOSE) else {
            return Err(TemplateError::Parse {
                raw: raw.to_string(),
                reason: format!("unexpected end of template, expected '{CLOSE}'"),
            });
        };

        segments.push(Segment::Expression(parse_expression(&inner[..end], raw)?));
        rest = &inner[end + CLOSE.len()..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(Template { segments })
}

/// Parse the text between the delimiters
///
/// `raw` is only used for error reporting.
pub fn parse_expression(text: &str, raw: &str) -> Result<Expression, TemplateError> {
    let unexpected = || TemplateError::UnexpectedSyntax(raw.to_string());

    let (rest, parsed) = expression(text.trim()).map_err(|_| unexpected())?;
    if !rest.trim().is_empty() {
        return Err(unexpected());
    }

    Ok(parsed)
}

fn expression(input: &str) -> IResult<&str, Expression> {
    alt((string_literal, integer_literal, variable_or_call)).parse(input)
}

fn variable_or_call(input: &str) -> IResult<&str, Expression> {
    let (input, path) = variable_path(input)?;
    let (input, arguments) = opt(preceded(multispace0, arguments)).parse(input)?;

    let expression = match arguments {
        Some(arguments) => Expression::Call {
            function: path,
            arguments,
        },
        None => Expression::Variable(path),
    };

    Ok((input, expression))
}

fn arguments(input: &str) -> IResult<&str, Vec<Expression>> {
    delimited(
        pair(char('('), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), expression),
        pair(multispace0, char(')')),
    )
    .parse(input)
}

fn variable_path(input: &str) -> IResult<&str, VariablePath> {
    let (input, segments) = separated_list1(char('.'), identifier).parse(input)?;
    Ok((input, segments.into_iter().collect()))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn integer_literal(input: &str) -> IResult<&str, Expression> {
    let (rest, digits) = recognize(pair(opt(tag("-")), digit1)).parse(input)?;
    let value: i64 = digits.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;

    Ok((rest, Expression::Literal(Value::Integer(value))))
}

/// Single or double quoted, `\` escapes the next character
fn string_literal(input: &str) -> IResult<&str, Expression> {
    let (mut rest, quote) = alt((char('\''), char('"'))).parse(input)?;
    let mut text = String::new();
    let mut escaped = false;

    loop {
        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Char,
            )));
        };
        rest = chars.as_str();

        match c {
            _ if escaped => {
                text.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            _ if c == quote => break,
            _ => text.push(c),
        }
    }

    Ok((rest, Expression::Literal(Value::String(text))))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variable(path: &str) -> Expression {
        Expression::Variable(path.split('.').collect())
    }

    #[test]
    fn literal_only() {
        let template = parse_template("plain text").unwrap();
        assert_eq!(
            template.segments(),
            &[Segment::Literal("plain text".to_string())]
        );
        assert_eq!(template.single_expression(), None);
    }

    #[test]
    fn single_expression() {
        let template = parse_template("<% ctx.env.flag %>").unwrap();
        assert_eq!(template.single_expression(), Some(&variable("ctx.env.flag")));
    }

    #[test]
    fn mixed_segments() {
        let template = parse_template("pre_<%ctx.a%>_<% ctx.b %>").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("pre_".to_string()),
                Segment::Expression(variable("ctx.a")),
                Segment::Literal("_".to_string()),
                Segment::Expression(variable("ctx.b")),
            ]
        );
        assert_eq!(template.single_expression(), None);
    }

    #[test]
    fn function_calls_with_nested_arguments() {
        let template =
            parse_template(r#"<% fn.id_concat(ctx.native_app.name, '_pkg', "x", fn.get_username()) %>"#)
                .unwrap();

        assert_eq!(
            template.single_expression(),
            Some(&Expression::Call {
                function: ["fn", "id_concat"].into_iter().collect(),
                arguments: vec![
                    variable("ctx.native_app.name"),
                    Expression::Literal(Value::from("_pkg")),
                    Expression::Literal(Value::from("x")),
                    Expression::Call {
                        function: ["fn", "get_username"].into_iter().collect(),
                        arguments: vec![],
                    },
                ],
            })
        );
    }

    #[test]
    fn string_and_integer_literals() {
        assert_eq!(
            parse_expression(r"'it\'s'", "raw").unwrap(),
            Expression::Literal(Value::from("it's"))
        );
        assert_eq!(
            parse_expression("fn.id_concat(123)", "raw").unwrap(),
            Expression::Call {
                function: ["fn", "id_concat"].into_iter().collect(),
                arguments: vec![Expression::Literal(Value::Integer(123))],
            }
        );
    }

    #[test]
    fn unexpected_syntax() {
        for raw in [
            "<% ctx.env.0 %>",
            "<% ctx.env[0] %>",
            "<% ctx.0.env %>",
            "<% ctx[definition_version] %>",
            "<% %>",
            "<% ctx.env.A | upper %>",
        ] {
            assert_eq!(
                parse_template(raw).unwrap_err(),
                TemplateError::UnexpectedSyntax(raw.to_string()),
                "{raw}"
            );
        }
    }

    #[test]
    fn unterminated_expression() {
        let err = parse_template("name_<% ctx.env.A").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { ref raw, .. } if raw == "name_<% ctx.env.A"));
        assert!(err
            .to_string()
            .starts_with("Error parsing template from project definition file. Value: 'name_<% ctx.env.A'."));
    }
}
