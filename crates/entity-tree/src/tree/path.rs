//! Escaping and splitting of dotted entity paths
//!
//! Scope paths join entity names with `.`. A literal `.` inside a name is
//! written as `\.`, so [`split_path`] is the exact inverse of joining escaped
//! names with [`child_path`].

use std::borrow::Cow;

const SEPARATOR: char = '.';
const ESCAPE: char = '\\';

/// Escape literal dots in a single entity name
pub fn escape_name(name: &str) -> Cow<'_, str> {
    if name.contains(SEPARATOR) {
        Cow::Owned(name.replace(SEPARATOR, "\\."))
    } else {
        Cow::Borrowed(name)
    }
}

/// Path of the child `name` inside the scope `parent`
///
/// A `None` parent produces a top-level path.
pub fn child_path(parent: Option<&str>, name: &str) -> String {
    let escaped = escape_name(name);
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}{}{}", parent, SEPARATOR, escaped),
        _ => escaped.into_owned(),
    }
}

/// Split a path on unescaped dots, unescaping `\.` inside each segment
///
/// A backslash that does not precede a dot is kept as is.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE if chars.peek() == Some(&SEPARATOR) => {
                current.push(SEPARATOR);
                chars.next();
            }
            SEPARATOR => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
}

/// The last unescaped segment of a path
pub fn last_segment(path: &str) -> String {
    split_path(path).pop().unwrap_or_default()
}

/// Escape spaces so a path can be embedded in a query term
pub fn escape_for_query(path: &str) -> Cow<'_, str> {
    if path.contains(' ') {
        Cow::Owned(path.replace(' ', "\\ "))
    } else {
        Cow::Borrowed(path)
    }
}
