// Interpolation engine
//
// Reference syntax: `{{.name}}`, optionally followed by filters:
//   {{ .cds.version }}
//   {{.app.name | upper}}
//   {{.deploy.target | default "staging"}}
//
// Unknown names are left in place untouched. Text that does not open with
// `{{.` is copied through byte for byte, whatever its encoding; only the
// inside of a reference has to be UTF-8.

use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::sync::OnceLock;

use super::error::{InterpolateError, Result};
use crate::job::VariableMapping;

/// Substitution engine seam used by the control server
pub trait Interpolator: Send + Sync {
    fn interpolate(&self, template: &[u8], vars: &VariableMapping) -> Result<Vec<u8>>;
}

fn reference_start() -> &'static BytesRegex {
    static RE: OnceLock<BytesRegex> = OnceLock::new();
    RE.get_or_init(|| BytesRegex::new(r"\{\{\s*\.").expect("valid reference regex"))
}

fn variable_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)*$").expect("valid name regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Upper,
    Lower,
    Trim,
    Default(String),
}

impl Filter {
    fn apply(&self, value: Option<String>) -> Option<String> {
        match self {
            Filter::Upper => value.map(|v| v.to_uppercase()),
            Filter::Lower => value.map(|v| v.to_lowercase()),
            Filter::Trim => value.map(|v| v.trim().to_string()),
            Filter::Default(fallback) => match value {
                Some(v) if !v.is_empty() => Some(v),
                _ => Some(fallback.clone()),
            },
        }
    }
}

#[derive(Debug)]
struct Reference<'a> {
    name: &'a str,
    filters: Vec<Filter>,
}

/// Default interpolation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }
}

impl Interpolator for Engine {
    fn interpolate(&self, template: &[u8], vars: &VariableMapping) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(template.len());
        let mut copied_to = 0;

        for m in reference_start().find_iter(template) {
            // Inside a reference we already consumed (e.g. a default argument)
            if m.start() < copied_to {
                continue;
            }

            let close = find_close(template, m.end())
                .ok_or(InterpolateError::Unterminated { offset: m.start() })?;
            let end = close + 2;

            // `{{` + whitespace + `.` already matched; the body starts after the dot
            let body = std::str::from_utf8(&template[m.end()..close])
                .map_err(|_| InterpolateError::InvalidUtf8 { offset: m.start() })?;
            let reference = parse_reference(body, m.end())?;

            out.extend_from_slice(&template[copied_to..m.start()]);

            let value = reference
                .filters
                .iter()
                .fold(vars.get(reference.name).cloned(), |value, filter| {
                    filter.apply(value)
                });

            match value {
                Some(v) => out.extend_from_slice(v.as_bytes()),
                None => out.extend_from_slice(&template[m.start()..end]),
            }

            copied_to = end;
        }

        out.extend_from_slice(&template[copied_to..]);
        Ok(out)
    }
}

/// Position of the `}}` closing a reference body starting at `from`.
/// `}}` inside a quoted filter argument does not close the reference.
fn find_close(template: &[u8], from: usize) -> Option<usize> {
    let mut in_quote = false;
    let mut i = from;

    while i < template.len() {
        match template[i] {
            b'"' => in_quote = !in_quote,
            b'}' if !in_quote && template.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }

    None
}

fn parse_reference(body: &str, offset: usize) -> Result<Reference<'_>> {
    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '|')
        .unwrap_or(body.len());
    let name = &body[..name_end];

    if !variable_name().is_match(name) {
        return Err(InterpolateError::InvalidName {
            name: name.to_string(),
            offset,
        });
    }

    let filters = parse_filters(&body[name_end..], offset + name_end)?;
    Ok(Reference { name, filters })
}

fn parse_filters(mut rest: &str, mut offset: usize) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();

    loop {
        let trimmed = rest.trim_start();
        offset += rest.len() - trimmed.len();
        rest = trimmed;

        if rest.is_empty() {
            return Ok(filters);
        }

        let Some(after_pipe) = rest.strip_prefix('|') else {
            return Err(InterpolateError::UnexpectedToken {
                found: rest.chars().take(16).collect(),
                offset,
            });
        };

        let trimmed = after_pipe.trim_start();
        offset += 1 + after_pipe.len() - trimmed.len();
        rest = trimmed;

        let ident_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let ident = &rest[..ident_len];
        let filter_offset = offset;
        rest = &rest[ident_len..];
        offset += ident_len;

        let filter = match ident {
            "upper" => Filter::Upper,
            "lower" => Filter::Lower,
            "trim" => Filter::Trim,
            "default" => {
                let (arg, consumed) = parse_quoted(rest).ok_or_else(|| {
                    InterpolateError::MissingArgument {
                        filter: ident.to_string(),
                        offset: filter_offset,
                    }
                })?;
                rest = &rest[consumed..];
                offset += consumed;
                Filter::Default(arg.to_string())
            }
            _ => {
                return Err(InterpolateError::UnknownFilter {
                    filter: ident.to_string(),
                    offset: filter_offset,
                })
            }
        };

        filters.push(filter);
    }
}

/// Parse `  "text"` at the start of `input`; returns the text and bytes consumed.
fn parse_quoted(input: &str) -> Option<(&str, usize)> {
    let trimmed = input.trim_start();
    let lead = input.len() - trimmed.len();
    let inner = trimmed.strip_prefix('"')?;
    let close = inner.find('"')?;
    Some((&inner[..close], lead + 1 + close + 1))
}
