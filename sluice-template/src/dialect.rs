//! Template dialects
//!
//! Sources are normalized into plain minijinja syntax before parsing:
//! - `{{ .Key }}` references lose their leading dot
//! - `{% list name = a b c %}` becomes a `set` of a list literal
//! - `{% import "file" m1, m2 %}` becomes `{% from "file" import m1, m2 %}`
//! - the `export` marker after a macro signature is dropped

use regex::{Captures, Regex};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static GO_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{-?\s*\.[A-Za-z_]").expect("valid pattern"));

static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid pattern"));

static BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("valid pattern"));

static LIST_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%(-?)\s*list\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*(-?)%\}")
        .expect("valid pattern")
});

static NAMED_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{%(-?)\s*import\s+("[^"]*"|'[^']*')\s+([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(-?)%\}"#,
    )
    .expect("valid pattern")
});

static MACRO_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\{%-?\s*macro\s+[A-Za-z_]\w*\s*\([^%]*?\))\s*export\s*(-?%\})")
        .expect("valid pattern")
});

static SECRET_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsecret\.[A-Za-z_]").expect("valid pattern"));

/// Template dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Go-style `{{ .Key }}`, missing keys render as `<no value>`
    Basic,
    /// Jinja-style, missing keys are errors
    Rich,
    /// Basic when the source contains a Go-style reference, rich otherwise
    #[default]
    Auto,
}

impl Dialect {
    /// Resolves `Auto` for a concrete source
    pub fn resolve(self, source: &str) -> Dialect {
        match self {
            Dialect::Auto => detect(source),
            other => other,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Basic => write!(f, "basic"),
            Dialect::Rich => write!(f, "rich"),
            Dialect::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "go" => Ok(Dialect::Basic),
            "rich" | "jinja" => Ok(Dialect::Rich),
            "auto" | "" => Ok(Dialect::Auto),
            other => Err(format!(
                "unknown template dialect '{}', expected one of: auto, basic, rich",
                other
            )),
        }
    }
}

/// Detects the dialect of a source
pub fn detect(source: &str) -> Dialect {
    if GO_REFERENCE.is_match(source) {
        Dialect::Basic
    } else {
        Dialect::Rich
    }
}

/// Whether any expression or tag of the source references the `secret` namespace
pub fn references_secret(source: &str) -> bool {
    BLOCK
        .find_iter(source)
        .any(|block| SECRET_REFERENCE.is_match(block.as_str()))
}

/// Rewrites a source into plain minijinja syntax
pub fn normalize(source: &str) -> String {
    let source = strip_leading_dots(source);
    let source = MACRO_EXPORT.replace_all(&source, "$1 $2");
    let source = NAMED_IMPORT.replace_all(&source, |caps: &Captures| {
        format!("{{%{} from {} import {} {}%}}", &caps[1], &caps[2], &caps[3], &caps[4])
    });
    LIST_TAG
        .replace_all(&source, |caps: &Captures| {
            let items: Vec<String> = caps[3].split_whitespace().map(list_item).collect();
            format!(
                "{{%{} set {} = [{}] {}%}}",
                &caps[1],
                &caps[2],
                items.join(", "),
                &caps[4]
            )
        })
        .into_owned()
}

fn strip_leading_dots(source: &str) -> String {
    EXPRESSION
        .replace_all(source, |caps: &Captures| {
            format!("{{{{{}}}}}", strip_reference_dots(&caps[1]))
        })
        .into_owned()
}

/// Drops the dot of `.Key` references, leaving string literals alone
fn strip_reference_dots(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '.'
                && prev.is_none_or(starts_reference)
                && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                prev = Some(c);
                continue;
            }
            None => {}
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn starts_reference(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | '|' | ',' | '-')
}

fn list_item(item: &str) -> String {
    let quoted = (item.starts_with('"') && item.ends_with('"') && item.len() > 1)
        || (item.starts_with('\'') && item.ends_with('\'') && item.len() > 1);
    if quoted || item.parse::<f64>().is_ok() {
        item.to_string()
    } else {
        format!("\"{}\"", item.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
