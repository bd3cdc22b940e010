//! Static include analysis
//!
//! Include graphs are checked before any file is rendered so a missing or
//! cyclic reference fails the whole set as a parse error.

use crate::error::{Result, TemplateError, TemplateErrorKind};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(include|import|from|extends)\s+(?:"([^"]*)"|'([^']*)')([^%]*)%\}"#)
        .expect("valid pattern")
});

/// A file referenced from a template tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: String,
    /// `{% include "x" ignore missing %}`
    pub optional: bool,
}

/// Lists the files a source references, in order of appearance
pub fn references(source: &str) -> Vec<Reference> {
    REFERENCE
        .captures_iter(source)
        .filter_map(|caps| {
            let target = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            let optional = caps
                .get(4)
                .is_some_and(|rest| rest.as_str().contains("ignore missing"));
            Some(Reference { target, optional })
        })
        .collect()
}

/// Checks that every reference reachable from a renderable file exists and
/// that no chain loops back onto itself.
///
/// # Arguments
/// * `files` - All sources of the set, by name
/// * `is_ignored` - Files passed through verbatim; their references are only
///   followed when a renderable file pulls them in
///
/// # Errors
/// `MissingInclude` or `CyclicInclude` parse errors naming the file that
/// holds the offending reference
pub fn check<F>(files: &BTreeMap<String, String>, is_ignored: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    let graph: BTreeMap<&str, Vec<Reference>> = files
        .iter()
        .map(|(name, source)| (name.as_str(), references(source)))
        .collect();

    let mut done = BTreeSet::new();
    for name in files.keys().filter(|name| !is_ignored(name)) {
        let mut path = Vec::new();
        visit(name, &graph, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit<'a>(
    name: &'a str,
    graph: &BTreeMap<&'a str, Vec<Reference>>,
    path: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
) -> Result<()> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|seen| *seen == name) {
        let mut chain: Vec<&str> = path[start..].to_vec();
        chain.push(name);
        return Err(TemplateError::parse(
            path.last().copied().unwrap_or(name),
            TemplateErrorKind::CyclicInclude,
            format!("include cycle {}", chain.join(" -> ")),
        ));
    }

    let Some(refs) = graph.get(name) else {
        return Ok(());
    };

    path.push(name);
    for reference in refs {
        match graph.get_key_value(reference.target.as_str()) {
            Some((target, _)) => visit(*target, graph, path, done)?,
            None if reference.optional => {}
            None => {
                return Err(TemplateError::parse(
                    name,
                    TemplateErrorKind::MissingInclude,
                    format!("template '{}' not found", reference.target),
                ));
            }
        }
    }
    path.pop();
    done.insert(name);
    Ok(())
}
