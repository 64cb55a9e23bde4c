use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gs_glob::match_file_with_glob;
use tracing::debug;

/// Directory, relative to the repository root, holding `*.mdc` rule files.
pub const RULES_DIR: &str = ".cursor/rules";

/// A rule file: front matter plus a free-form payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub description: Option<String>,
    /// Globs in declaration order.
    pub globs: Vec<String>,
    pub always_apply: bool,
    pub payload: String,
    pub file_path: PathBuf,
}

impl Rule {
    /// Parse rule text. `None` when the front matter is missing or unclosed.
    pub fn parse(text: &str, file_path: impl Into<PathBuf>) -> Option<Self> {
        let (front, payload) = split_frontmatter(text)?;

        let globs = front
            .get("globs")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            description: front.get("description").cloned().filter(|d| !d.is_empty()),
            globs,
            always_apply: front
                .get("alwaysApply")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            payload,
            file_path: file_path.into(),
        })
    }

    pub fn applies_to(&self, file_path: &str) -> bool {
        self.always_apply || self.globs.iter().any(|g| match_file_with_glob(file_path, g))
    }
}

/// Split `---` delimited front matter from the body. Both delimiters must be
/// lines of their own and the first must open the file.
fn split_frontmatter(content: &str) -> Option<(HashMap<String, String>, String)> {
    let mut lines = content.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }

    let mut map = HashMap::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    if !closed {
        return None;
    }

    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Some((map, body))
}

/// Load a rule file, or `None` if it cannot be read or parsed.
pub fn load_rule_from_file(path: &Path) -> Option<Rule> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let rule = Rule::parse(&text, path);
            if rule.is_none() {
                debug!(file = %path.display(), "rule file has no front matter");
            }
            rule
        }
        Err(e) => {
            debug!(file = %path.display(), error = %e, "unreadable rule file");
            None
        }
    }
}

/// Rules from `<root>/.cursor/rules/*.mdc` that apply to `file_path`.
///
/// Always-apply rules come first, then glob matches, each in file-name order.
pub fn resolve_rules(root: &Path, file_path: &Path) -> Vec<Rule> {
    let dir = root.join(RULES_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "mdc"))
        .collect();
    files.sort();

    let target = file_path.to_string_lossy();
    let rules: Vec<Rule> = files.iter().filter_map(|p| load_rule_from_file(p)).collect();

    let (always, matched): (Vec<Rule>, Vec<Rule>) = rules
        .into_iter()
        .filter(|r| r.applies_to(&target))
        .partition(|r| r.always_apply);

    always.into_iter().chain(matched).collect()
}
