//! Hierarchical path syntax.
//!
//! A path is a `/`-separated list of segments. A segment is either a plain
//! member name or a set-element reference `template['element']`, where the
//! quote may be `'` or `"`, the template may be empty or `*`, and the
//! element name escapes `&`, `"` and `'` as `&amp;`, `&quot;` and `&apos;`.

mod locale;

pub use locale::*;

#[cfg(test)]
mod locale_test;

use crate::AccessError;
use crate::Result;

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    pub name: String,
    /// Written in set-element syntax
    pub set_element: bool,
    /// Template given in set-element syntax, empty when absent or `*`
    pub template_name: String,
}

impl Segment {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            set_element: false,
            template_name: String::new(),
        }
    }
}

/// Parses the segment starting at byte offset `start`.
///
/// On success returns the segment and the offset just past it, which is
/// either the end of `path` or the offset of the next `/`. Returns `None`
/// for malformed set-element syntax.
pub fn parse_segment(
    path: &str,
    start: usize,
) -> Option<(Segment, usize)> {
    let rest = path.get(start..)?;
    let stop = rest.find(['/', '[']).map(|i| start + i).unwrap_or(path.len());
    if stop == path.len() || path.as_bytes()[stop] == b'/' {
        return Some((Segment::plain(&path[start..stop]), stop));
    }

    let template = &path[start..stop];
    let template_name = if template == "*" { String::new() } else { template.to_string() };

    let quote_at = stop + 1;
    let quote = *path.as_bytes().get(quote_at)?;
    if quote != b'\'' && quote != b'"' {
        return None;
    }
    let body_start = quote_at + 1;
    let body_len = path.get(body_start..)?.find(quote as char)?;
    let body_end = body_start + body_len;
    if path.as_bytes().get(body_end + 1) != Some(&b']') {
        return None;
    }
    let name = decode(&path[body_start..body_end])?;
    Some((
        Segment {
            name,
            set_element: true,
            template_name,
        },
        body_end + 2,
    ))
}

fn decode(encoded: &str) -> Option<String> {
    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let (replacement, len) = if rest.starts_with("&amp;") {
            ('&', 5)
        } else if rest.starts_with("&quot;") {
            ('"', 6)
        } else if rest.starts_with("&apos;") {
            ('\'', 6)
        } else {
            return None;
        };
        out.push(replacement);
        rest = &rest[len..];
    }
    out.push_str(rest);
    Some(out)
}

fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders a segment: the bare name for an empty template, otherwise
/// `template['escaped name']`.
pub fn create_segment(
    template: &str,
    name: &str,
) -> String {
    if template.is_empty() {
        name.to_string()
    } else {
        format!("{template}['{}']", encode(name))
    }
}

/// Compares a possibly unqualified template name against a qualified one.
///
/// A `short` name without `:` matches the part of `long` after its `:`.
pub fn equal_template_names(
    short: &str,
    long: &str,
) -> bool {
    if short.contains(':') {
        short == long
    } else {
        let unqualified = long.split_once(':').map(|(_, n)| n).unwrap_or(long);
        short == unqualified
    }
}

/// Whether `name` may be used as a member name.
///
/// Rejects the empty name, control characters other than TAB, LF and CR,
/// the non-characters U+FFFE and U+FFFF, and `/` unless the name belongs
/// to a set member (which is always written in escaped set-element syntax).
pub fn is_valid_name(
    name: &str,
    set_member: bool,
) -> bool {
    if name.is_empty() {
        return false;
    }
    // Rust strings cannot hold surrogate code points, so only the remaining
    // classes need checking.
    name.chars().all(|c| {
        let control = c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r');
        !control && c != '\u{FFFE}' && c != '\u{FFFF}' && (set_member || c != '/')
    })
}

/// Splits a `/`-separated path into segments.
///
/// A leading `/` is optional and a single trailing `/` is ignored.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let bad_path = || AccessError::illegal(format!("bad path {path}"));
    let mut segments = Vec::new();
    let mut i = usize::from(path.starts_with('/'));
    while i < path.len() {
        let (segment, end) = parse_segment(path, i).ok_or_else(bad_path)?;
        if segment.name.is_empty() && !segment.set_element {
            return Err(bad_path());
        }
        segments.push(segment);
        if end == path.len() {
            break;
        }
        if path.as_bytes()[end] != b'/' {
            return Err(bad_path());
        }
        i = end + 1;
    }
    Ok(segments)
}

/// Renders member names as an absolute path, for logs and reports.
pub fn join_names(names: &[String]) -> String {
    let mut out = String::new();
    for name in names {
        out.push('/');
        out.push_str(name);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
