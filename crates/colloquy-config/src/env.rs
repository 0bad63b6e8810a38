use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Failure while expanding `{{ ... }}` placeholders
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
    /// Placeholder names a variable that is unset and has no default
    #[error("line {line}: environment variable not found: `{name}`")]
    Missing {
        /// 1-based line number
        line: usize,
        /// Variable name
        name: String,
    },
    /// Placeholder uses a scope other than `env.`
    #[error("line {line}: only variables scoped with 'env.' are supported: `{key}`")]
    UnsupportedScope {
        /// 1-based line number
        line: usize,
        /// Full placeholder key
        key: String,
    },
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `{{ env.VAR }}` or `{{ env.VAR | default("fallback") }}`
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
    })
}

/// Expand `{{ env.VAR }}` placeholders in raw TOML text
///
/// `{{ env.VAR | default("x") }}` falls back to `x` when `VAR` is unset.
/// TOML comment lines pass through untouched so a commented-out key never
/// requires its variable.
pub fn expand_env(input: &str) -> Result<String, ExpandError> {
    let mut output = String::with_capacity(input.len());

    for (index, line) in input.lines().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            expand_line(line, index + 1, &mut output)?;
        }
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn expand_line(line: &str, line_number: usize, output: &mut String) -> Result<(), ExpandError> {
    let mut last_end = 0;

    for captures in placeholder().captures_iter(line) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        output.push_str(&line[last_end..whole.start()]);
        output.push_str(&resolve(&captures, key.as_str(), line_number)?);
        last_end = whole.end();
    }

    output.push_str(&line[last_end..]);
    Ok(())
}

fn resolve(captures: &Captures<'_>, key: &str, line: usize) -> Result<String, ExpandError> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(ExpandError::UnsupportedScope {
            line,
            key: key.to_owned(),
        });
    };

    match (std::env::var(name), captures.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.as_str().to_owned()),
        (Err(_), None) => Err(ExpandError::Missing {
            line,
            name: name.to_owned(),
        }),
    }
}
