//! Identifier and string literal helpers
//!
//! Object names on the platform are either *unquoted* (`[A-Za-z_][A-Za-z0-9_$]*`, case-insensitive and stored upper
//! case) or *quoted* (`"..."`, case-sensitive, a literal `"` is written as `""`). These helpers convert between plain
//! strings and identifiers without ever producing an invalid identifier.
use regex::Regex;
use std::sync::LazyLock;

const IDENTIFIER: &str = r#"(?:"[^"]*(?:""[^"]*)*")|(?:[A-Za-z_][A-Za-z0-9_$]{0,254})"#;

static UNQUOTED_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,254}$").expect("valid regex"));

static QUOTED_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"((""|[^"])*)"$"#).expect("valid regex"));

static QUALIFIED_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:{IDENTIFIER})(?:\.(?:{IDENTIFIER})){{0,2}}$")).expect("valid regex")
});

static SCHEMA_AND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({IDENTIFIER})\.({IDENTIFIER})$")).expect("valid regex")
});

static DB_SCHEMA_AND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({IDENTIFIER})\.({IDENTIFIER})\.({IDENTIFIER})$"))
        .expect("valid regex")
});

pub fn is_valid_unquoted_identifier(identifier: &str) -> bool {
    UNQUOTED_IDENTIFIER.is_match(identifier)
}

pub fn is_valid_quoted_identifier(identifier: &str) -> bool {
    QUOTED_IDENTIFIER.is_match(identifier)
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    is_valid_unquoted_identifier(identifier) || is_valid_quoted_identifier(identifier)
}

/// One to three dot separated identifiers (`name`, `schema.name` or `db.schema.name`)
pub fn is_valid_qualified_identifier(identifier: &str) -> bool {
    QUALIFIED_IDENTIFIER.is_match(identifier)
}

/// Wrap in double quotes, escaping quotes inside
pub fn to_quoted_identifier(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

/// Turn an arbitrary string into an identifier
///
/// Valid identifiers (quoted or not) are returned unchanged, anything else gets quoted.
pub fn to_identifier(name: &str) -> String {
    if is_valid_identifier(name) {
        return name.to_string();
    }

    to_quoted_identifier(name)
}

/// String content of an identifier
///
/// Valid quoted identifiers lose their quotes and `""` turns back into `"`. Everything else is returned as is.
pub fn identifier_to_str(identifier: &str) -> String {
    if is_valid_quoted_identifier(identifier) {
        let inner = &identifier[1..identifier.len() - 1];
        return inner.replace("\"\"", "\"");
    }

    identifier.to_string()
}

/// Concatenate identifier fragments into one identifier
///
/// The result is quoted when any fragment was quoted or when the concatenated text is not a valid unquoted
/// identifier.
pub fn concat_identifiers<S: AsRef<str>>(identifiers: &[S]) -> String {
    let mut quotes_found = false;
    let mut joined = String::new();

    for identifier in identifiers {
        let identifier = identifier.as_ref();
        quotes_found |= is_valid_quoted_identifier(identifier);
        joined.push_str(&identifier_to_str(identifier));
    }

    if quotes_found || !is_valid_unquoted_identifier(&joined) {
        return to_quoted_identifier(&joined);
    }

    joined
}

pub fn append_to_identifier(identifier: &str, suffix: &str) -> String {
    concat_identifiers(&[identifier, suffix])
}

/// Lower case and drop everything that can't be used in an unquoted identifier
pub fn clean_identifier(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '$')
        .collect()
}

/// Normalized form used to compare identifiers
///
/// Unquoted identifiers are case-insensitive and stored upper case.
pub fn unquote_identifier(identifier: &str) -> String {
    if is_valid_unquoted_identifier(identifier) {
        return identifier.to_uppercase();
    }

    identifier_to_str(identifier)
}

/// Whether two identifiers name the same object
pub fn same_identifier(first: &str, second: &str) -> bool {
    unquote_identifier(first) == unquote_identifier(second)
}

/// Single-quoted string literal
pub fn to_string_literal(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Schema part of `schema.name` or `db.schema.name`
pub fn extract_schema(qualified_name: &str) -> Option<String> {
    if let Some(captures) = DB_SCHEMA_AND_NAME.captures(qualified_name) {
        return captures.get(2).map(|m| m.as_str().to_string());
    }

    SCHEMA_AND_NAME
        .captures(qualified_name)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
