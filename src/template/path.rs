//! Path grammar for `${...}` references.
//!
//! `HEAD ( '.' IDENT | '[' INT ']' )*` where `HEAD` and `IDENT` match
//! `[A-Za-z_][A-Za-z0-9_-]*` and indices are non-negative integers. The
//! head names either a workflow input or a node id; the remainder walks
//! into that value.

use serde_json::{Map, Value};

use super::TemplateError;

/// One step into a looked-up value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A parsed `${path}` reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplatePath {
    raw: String,
    head: String,
    segments: Vec<PathSegment>,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl TemplatePath {
    /// Parse a raw path (the text between `${` and `}`).
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut chars = raw.char_indices().peekable();

        let head_end = {
            match chars.peek() {
                Some((_, c)) if is_ident_start(*c) => {}
                _ => {
                    return Err(TemplateError::InvalidPath {
                        path: raw.to_string(),
                        reason: "head must start with a letter or underscore".into(),
                    });
                }
            }
            let mut end = 0;
            while let Some((i, c)) = chars.peek().copied() {
                if is_ident_continue(c) {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            end
        };
        let head = raw[..head_end].to_string();

        let mut segments = Vec::new();
        while let Some((i, c)) = chars.next() {
            match c {
                '.' => {
                    let start = i + 1;
                    match chars.peek() {
                        Some((_, c)) if is_ident_start(*c) => {}
                        _ => {
                            return Err(TemplateError::InvalidPath {
                                path: raw.to_string(),
                                reason: "expected identifier after `.`".into(),
                            });
                        }
                    }
                    let mut end = start;
                    while let Some((j, c)) = chars.peek().copied() {
                        if is_ident_continue(c) {
                            end = j + c.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    segments.push(PathSegment::Field(raw[start..end].to_string()));
                }
                '[' => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some((j, c)) = chars.peek().copied() {
                        if c.is_ascii_digit() {
                            end = j + 1;
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if end == start {
                        return Err(TemplateError::InvalidPath {
                            path: raw.to_string(),
                            reason: "expected non-negative integer index after `[`".into(),
                        });
                    }
                    match chars.next() {
                        Some((_, ']')) => {}
                        _ => {
                            return Err(TemplateError::InvalidPath {
                                path: raw.to_string(),
                                reason: "unterminated index (missing `]`)".into(),
                            });
                        }
                    }
                    let index: usize =
                        raw[start..end]
                            .parse()
                            .map_err(|_| TemplateError::InvalidPath {
                                path: raw.to_string(),
                                reason: "index out of range".into(),
                            })?;
                    segments.push(PathSegment::Index(index));
                }
                other => {
                    return Err(TemplateError::InvalidPath {
                        path: raw.to_string(),
                        reason: format!("unexpected character `{other}`"),
                    });
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            head,
            segments,
        })
    }

    /// The raw path text as it appeared inside `${...}`.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The leading identifier: an input name or a node id.
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walk this path through a resolution context (the store root).
    pub fn lookup<'v>(&self, context: &'v Map<String, Value>) -> Option<&'v Value> {
        let mut current = context.get(&self.head)?;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }

    /// Walk the non-head remainder through an already-looked-up value.
    pub fn lookup_in<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }
}
