use regex::{Regex, RegexBuilder};

/// Upper bound on the compiled program size of a single pattern.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Widest `{n1..n2}` range that is expanded into explicit alternatives.
const MAX_RANGE_SPAN: i64 = 4096;

/// Deepest `{...}` nesting accepted; deeper patterns are invalid.
const MAX_BRACE_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// GlobOptions
// ---------------------------------------------------------------------------

/// Feature switches distinguishing gitignore from editorconfig semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GlobOptions {
    /// Enable `{a,b,c}` alternation and `{n1..n2}` integer ranges.
    pub braces: bool,
    /// Let a single `*` match path separators too.
    pub asterisk_crosses_separator: bool,
    /// Treat `**` as "any string", absorbing an adjacent `/`.
    pub editorconfig_double_asterisk: bool,
}

impl GlobOptions {
    /// gitignore semantics (no extensions).
    pub const fn gitignore() -> Self {
        Self {
            braces: false,
            asterisk_crosses_separator: false,
            editorconfig_double_asterisk: false,
        }
    }

    /// editorconfig semantics (all extensions enabled).
    pub const fn editorconfig() -> Self {
        Self {
            braces: true,
            asterisk_crosses_separator: true,
            editorconfig_double_asterisk: true,
        }
    }

    pub const fn with_braces(mut self, enabled: bool) -> Self {
        self.braces = enabled;
        self
    }

    pub const fn with_asterisk_crossing(mut self, enabled: bool) -> Self {
        self.asterisk_crosses_separator = enabled;
        self
    }

    pub const fn with_editorconfig_double_asterisk(mut self, enabled: bool) -> Self {
        self.editorconfig_double_asterisk = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate a glob pattern into an anchored regular expression.
///
/// The returned expression matches the whole candidate string and runs in
/// dot-matches-newline mode so that unusual file names are handled uniformly.
/// `None` when braces nest deeper than the translator accepts.
pub fn translate(pattern: &str, options: GlobOptions) -> Option<String> {
    if options.braces && brace_depth(pattern) > MAX_BRACE_DEPTH {
        return None;
    }
    Some(format!("(?s)^{}$", translate_body(pattern, options)))
}

/// Maximum nesting of unescaped braces.
fn brace_depth(pattern: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => {
                depth += 1;
                max = max.max(depth);
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

fn translate_body(pattern: &str, options: GlobOptions) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let single_star = if options.asterisk_crosses_separator {
        ".*"
    } else {
        "[^/]*"
    };

    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    let mut escaped = false;

    while i < n {
        let c = chars[i];
        i += 1;

        if escaped {
            out.push(escape_char(c));
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '*' if i < n && chars[i] == '*' => {
                i += 1;
                let preceding_slash = out.last().is_some_and(|t| t == "/");
                let following_slash = i < n && chars[i] == '/';

                if options.editorconfig_double_asterisk {
                    if following_slash {
                        i += 1;
                    }
                    out.push("(?:.*)".to_string());
                } else if following_slash && out.is_empty() {
                    // `**/x`: any leading directories, including none.
                    i += 1;
                    out.push("(?:.*?/)?".to_string());
                } else if i == n && preceding_slash {
                    // `x/**`: everything inside `x`.
                    if let Some(last) = out.last_mut() {
                        *last = "(?:/.*)?".to_string();
                    }
                } else if following_slash && preceding_slash {
                    // `x/**/y`: zero or more directories in between.
                    i += 1;
                    out.push("(?:.*/)?".to_string());
                } else {
                    out.push(single_star.to_string());
                    out.push(single_star.to_string());
                }
            }
            '*' => out.push(single_star.to_string()),
            '?' => out.push("[^/]".to_string()),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }

                if j >= n {
                    out.push(r"\[".to_string());
                } else {
                    let body: String = chars[i..j].iter().collect();
                    i = j + 1;
                    if body.is_empty() {
                        out.push(r"\[\]".to_string());
                    } else {
                        out.push(format!("[{}]", class_body(&body)));
                    }
                }
            }
            '{' if options.braces => {
                let mut j = i;
                let mut depth = 1usize;
                while j < n && depth > 0 {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }

                if depth > 0 {
                    out.push(r"\{".to_string());
                    continue;
                }

                let content: String = chars[i..j - 1].iter().collect();
                if let Some(range) = numeric_range(&content) {
                    out.push(range);
                    i = j;
                    continue;
                }

                let items = split_top_level(&content);
                if items.iter().all(|item| item.is_empty()) {
                    // `{}` / `{,}` are literal; resume right after the `{`.
                    out.push(r"\{".to_string());
                } else {
                    i = j;
                    let alternatives: Vec<String> = items
                        .iter()
                        .map(|item| translate_body(item, options))
                        .collect();
                    out.push(format!("(?:{})", alternatives.join("|")));
                }
            }
            other => out.push(escape_char(other)),
        }
    }

    if escaped {
        out.push(escape_char('\\'));
    }

    out.concat()
}

fn escape_char(c: char) -> String {
    let mut buf = [0u8; 4];
    regex::escape(c.encode_utf8(&mut buf))
}

/// Body of a bracket expression, with `!` negation mapped to `^`.
fn class_body(body: &str) -> String {
    let (prefix, rest) = if let Some(rest) = body.strip_prefix('!') {
        ("^", rest)
    } else if let Some(rest) = body.strip_prefix('^') {
        (r"\^", rest)
    } else {
        ("", body)
    };

    let mut escaped = String::with_capacity(rest.len() + 2);
    escaped.push_str(prefix);
    for c in rest.chars() {
        // Characters with special meaning inside a regex class.
        if matches!(c, '[' | ']' | '&' | '~' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Expand `{n1..n2}` into an alternation of the integers in the range.
fn numeric_range(content: &str) -> Option<String> {
    let (lo, hi) = content.split_once("..")?;
    let lo: i64 = lo.parse().ok()?;
    let hi: i64 = hi.parse().ok()?;

    if lo.abs_diff(hi) > MAX_RANGE_SPAN as u64 {
        return Some("(?:-?[0-9]+)".to_string());
    }

    let values: Vec<String> = if lo <= hi {
        (lo..=hi).map(|v| v.to_string()).collect()
    } else {
        (hi..=lo).rev().map(|v| v.to_string()).collect()
    };
    Some(format!("(?:{})", values.join("|")))
}

/// Split brace content on commas that are not nested in inner braces.
fn split_top_level(content: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in content.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: GlobOptions,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(pattern: &str, options: GlobOptions) -> Self {
        let regex = match translate(pattern, options) {
            Some(translated) => match RegexBuilder::new(&translated)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::debug!(pattern, error = %e, "glob pattern does not compile; it matches nothing");
                    None
                }
            },
            None => {
                tracing::debug!(pattern, "glob braces nest too deeply; it matches nothing");
                None
            }
        };

        Self {
            source: pattern.to_string(),
            options,
            regex,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(path))
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> GlobOptions {
        self.options
    }

    /// Whether the pattern compiled. Invalid patterns match nothing.
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }
}

/// Test whether `path` matches `pattern`.
pub fn matches(pattern: &str, path: &str, options: GlobOptions) -> bool {
    Pattern::new(pattern, options).matches(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
