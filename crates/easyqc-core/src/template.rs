//! Viewer command templates.
//!
//! A module's `code` is a shell-ish template. Variables from the subject's
//! covariate row and the project constants are substituted, then the result
//! is split into one or more commands using the `MULTICMD` marker.

use std::collections::BTreeMap;

use crate::model::CodeExe;

/// Marks a template that expands into several commands.
pub const MULTI_MARKER: &str = "MULTICMD";

/// Separates commands after the marker.
pub const COMMAND_SEPARATOR: &str = ";|";

/// Substitute `vars` into `code` and split it into commands.
pub fn render_command(code: &str, vars: &BTreeMap<String, String>) -> CodeExe {
    split_commands(&substitute(code, vars))
}

/// Replace `${name}`, `$name` and `{name}` with the variable's value.
///
/// Longer names are substituted first so `$path_t1` is not clobbered by a
/// variable called `path`.
pub fn substitute(code: &str, vars: &BTreeMap<String, String>) -> String {
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = code.to_string();
    for name in names {
        let value = &vars[name];
        out = out
            .replace(&format!("${{{name}}}"), value)
            .replace(&format!("${name}"), value)
            .replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Split a substituted template into indexed commands.
///
/// - `MULTICMD a;|b` gives `{0: a, 1: b}`
/// - `setup MULTICMD a;|b` gives `{0: setup;a, 1: setup;b}`
/// - anything else is a single command at index 0
pub fn split_commands(code: &str) -> CodeExe {
    let split = |rest: &str| -> Vec<String> {
        rest.split(COMMAND_SEPARATOR)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    };

    if let Some(rest) = code.strip_prefix(MULTI_MARKER) {
        return split(rest.trim()).into_iter().enumerate().collect();
    }

    if let Some((pre, post)) = code.split_once(MULTI_MARKER) {
        let mut pre = pre.trim().to_string();
        if !pre.ends_with(';') {
            pre.push(';');
        }
        return split(post.trim())
            .into_iter()
            .map(|cmd| format!("{pre}{cmd}"))
            .enumerate()
            .collect();
    }

    CodeExe::from([(0, code.to_string())])
}

/// Join commands into a single display string.
pub fn join_commands(code_exe: &CodeExe) -> String {
    code_exe.values().map(String::as_str).collect::<Vec<_>>().join("; ")
}
