//! fio config template rendering.
//!
//! Templates carry `{NAME}` placeholders (`{QD}`, `{POOL}`, `{RBD}`,
//! `{SIZE}`, `{BWLOGFILE}`) bound to phase and run parameters. A placeholder
//! left unresolved after substitution is a fatal configuration error; a
//! config with a literal `{QD}` inside would silently benchmark the wrong
//! thing.

use std::collections::BTreeMap;

use cephbench_common::{BenchError, BenchResult};

fn is_placeholder_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

/// Find the first remaining `{NAME}` placeholder, if any.
fn first_unresolved(text: &str) -> Option<String> {
    for (start, c) in text.char_indices() {
        if c != '{' {
            continue;
        }
        let rest = &text[start + 1..];
        if let Some(end) = rest.find('}') {
            let name = &rest[..end];
            if !name.is_empty() && name.chars().all(is_placeholder_char) {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Substitute every `{KEY}` from `params`, then require the result to carry
/// no placeholders at all.
pub fn render(template: &str, params: &BTreeMap<String, String>) -> BenchResult<String> {
    let mut rendered = template.to_string();
    for (key, value) in params {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    if let Some(name) = first_unresolved(&rendered) {
        return Err(BenchError::unresolved_placeholder(name));
    }
    Ok(rendered)
}
