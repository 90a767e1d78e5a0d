//! Template scanning and resolution over a store context.
//!
//! A template is any string containing `${path}` occurrences. A *simple*
//! template is exactly one `${path}` and nothing else; it resolves to the
//! raw looked-up value, preserving its type. Anything else is
//! *interpolated*: each resolvable occurrence is substituted with its
//! string form, and unresolvable occurrences stay literal (the
//! strict/permissive gate decides what happens to those).

use serde_json::{Map, Value};

use super::path::TemplatePath;

/// Byte span of one `${...}` occurrence; `inner` is the text between the
/// braces.
struct Token<'a> {
    start: usize,
    end: usize,
    inner: &'a str,
}

fn scan_tokens(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(close) = s[i + 2..].find('}') {
                let end = i + 2 + close + 1;
                tokens.push(Token {
                    start: i,
                    end,
                    inner: &s[i + 2..end - 1],
                });
                i = end;
                continue;
            }
            // Unterminated `${` cannot form a token; nothing later can
            // close one either.
            break;
        }
        i += 1;
    }
    tokens
}

/// All `${path}` occurrences in a template, in document order, deduplicated.
///
/// An empty result means the string carries no templating. No escape syntax
/// exists: every `${...}` counts as a variable reference.
///
/// # Examples
///
/// ```
/// use pflow::template::extract_variables;
///
/// let vars = extract_variables("User ${name} has ${count} items");
/// assert_eq!(vars, vec!["name".to_string(), "count".to_string()]);
/// assert!(extract_variables("no templates here").is_empty());
/// ```
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in scan_tokens(template) {
        if !seen.iter().any(|s| s == token.inner) {
            seen.push(token.inner.to_string());
        }
    }
    seen
}

/// If `s` is exactly one `${path}` occurrence, the inner path text.
pub fn as_simple_template(s: &str) -> Option<&str> {
    let tokens = scan_tokens(s);
    match tokens.as_slice() {
        [only] if only.start == 0 && only.end == s.len() => Some(only.inner),
        _ => None,
    }
}

/// String form used when substituting into an interpolated template.
///
/// Strings substitute unquoted; other values use their compact JSON form.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup<'v>(raw_path: &str, context: &'v Map<String, Value>) -> Option<&'v Value> {
    let path = TemplatePath::parse(raw_path).ok()?;
    path.lookup(context)
}

/// Whether `path` resolves against `context`, without substituting.
pub fn variable_exists(path: &str, context: &Map<String, Value>) -> bool {
    lookup(path, context).is_some()
}

fn resolve_str(s: &str, context: &Map<String, Value>) -> Value {
    if let Some(path) = as_simple_template(s) {
        return match lookup(path, context) {
            Some(value) => value.clone(),
            None => Value::String(s.to_string()),
        };
    }

    let tokens = scan_tokens(s);
    if tokens.is_empty() {
        return Value::String(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for token in tokens {
        out.push_str(&s[cursor..token.start]);
        match lookup(token.inner, context) {
            Some(value) => out.push_str(&stringify(value)),
            None => out.push_str(&s[token.start..token.end]),
        }
        cursor = token.end;
    }
    out.push_str(&s[cursor..]);
    Value::String(out)
}

fn resolve_value(value: &Value, context: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_str(s, context),
        Value::Array(items) => Value::Array(
            items.iter().map(|item| resolve_value(item, context)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve every template leaf in `value` against `context`.
///
/// Returns the resolved value and whether resolution completed with no
/// surviving variables from the original (see [`is_unresolved`]). Simple
/// templates preserve the looked-up value's type; interpolated templates
/// coerce substitutions to strings. Lists and mappings are walked
/// recursively, each leaf resolving independently.
///
/// # Examples
///
/// ```
/// use pflow::template::resolve;
/// use serde_json::{json, Map};
///
/// let mut ctx = Map::new();
/// ctx.insert("fetch".into(), json!({"count": 3}));
///
/// // Simple template: type-preserving.
/// let (value, ok) = resolve(&json!("${fetch.count}"), &ctx);
/// assert_eq!(value, json!(3));
/// assert!(ok);
///
/// // Interpolated: coerced to string.
/// let (value, ok) = resolve(&json!("got ${fetch.count}"), &ctx);
/// assert_eq!(value, json!("got 3"));
/// assert!(ok);
///
/// // Missing variable survives literally.
/// let (value, ok) = resolve(&json!("got ${fetch.missing}"), &ctx);
/// assert_eq!(value, json!("got ${fetch.missing}"));
/// assert!(!ok);
/// ```
pub fn resolve(value: &Value, context: &Map<String, Value>) -> (Value, bool) {
    let resolved = resolve_value(value, context);
    let complete = !is_unresolved(value, &resolved);
    (resolved, complete)
}

/// Recursive unresolved detection comparing a value before and after
/// resolution.
///
/// Two strings are unresolved iff the resolved form still contains `${`
/// *and* either nothing changed or some variable of the original survives
/// into the resolved form — the set intersection catches partial
/// resolution. Equal-length lists and shared dict keys recurse pairwise.
/// Any type change counts as resolved: a template replaced by a dict
/// resolved, and third-party data that happens to contain literal `${...}`
/// never re-enters template processing.
pub fn is_unresolved(original: &Value, resolved: &Value) -> bool {
    match (original, resolved) {
        (Value::String(o), Value::String(r)) => {
            if !r.contains("${") {
                return false;
            }
            if o == r {
                return !extract_variables(o).is_empty();
            }
            let original_vars = extract_variables(o);
            extract_variables(r)
                .iter()
                .any(|v| original_vars.contains(v))
        }
        (Value::Array(o), Value::Array(r)) if o.len() == r.len() => o
            .iter()
            .zip(r.iter())
            .any(|(ov, rv)| is_unresolved(ov, rv)),
        (Value::Object(o), Value::Object(r)) => o
            .iter()
            .filter_map(|(k, ov)| r.get(k).map(|rv| (ov, rv)))
            .any(|(ov, rv)| is_unresolved(ov, rv)),
        _ => false,
    }
}

/// Variables of `original` that survive unresolved in `resolved`.
///
/// For the common case (nothing resolved) this is every variable of the
/// original; for partial resolution it is the surviving subset.
pub fn unresolved_variables(original: &Value, resolved: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_unresolved(original, resolved, &mut out);
    out
}

fn collect_unresolved(original: &Value, resolved: &Value, out: &mut Vec<String>) {
    match (original, resolved) {
        (Value::String(o), Value::String(r)) => {
            if !r.contains("${") {
                return;
            }
            let survivors = extract_variables(r);
            for var in extract_variables(o) {
                if survivors.contains(&var) && !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        (Value::Array(o), Value::Array(r)) if o.len() == r.len() => {
            for (ov, rv) in o.iter().zip(r.iter()) {
                collect_unresolved(ov, rv, out);
            }
        }
        (Value::Object(o), Value::Object(r)) => {
            for (k, ov) in o {
                if let Some(rv) = r.get(k) {
                    collect_unresolved(ov, rv, out);
                }
            }
        }
        _ => {}
    }
}
