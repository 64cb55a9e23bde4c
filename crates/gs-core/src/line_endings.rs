//! Line-ending policy resolution.
//!
//! For a given path the policy comes from the first source with an opinion:
//! `.editorconfig`, `.gitattributes`, `gitscribe.toml`, `~/.gitscriberc`, and
//! finally the host default. Every source searches upwards from the file's
//! directory and stops at the first config file it finds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use gs_glob::{GlobOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{find_upwards, user_config_path, GitscribeConfig, PROJECT_CONFIG_FILE};

/// Bytes sampled from an existing file when detecting its line endings.
const DETECT_SAMPLE_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lf => "LF",
            Self::Crlf => "CRLF",
        }
    }

    /// `Crlf` on Windows, `Lf` elsewhere.
    pub fn host_default() -> Self {
        if cfg!(windows) {
            Self::Crlf
        } else {
            Self::Lf
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::Crlf),
            other => Err(format!("unknown line ending: {other}")),
        }
    }
}

/// What to do with the line endings of content written to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolPolicy {
    Normalize(LineEnding),
    /// Binary or `-text`: write bytes as given.
    Preserve,
}

impl EolPolicy {
    pub fn line_ending(self) -> Option<LineEnding> {
        match self {
            Self::Normalize(le) => Some(le),
            Self::Preserve => None,
        }
    }

    pub fn apply(self, content: &str) -> String {
        match self {
            Self::Normalize(le) => apply_line_endings(content, le),
            Self::Preserve => content.to_string(),
        }
    }
}

impl fmt::Display for EolPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalize(le) => write!(f, "{le}"),
            Self::Preserve => f.write_str("preserve"),
        }
    }
}

/// Which source decided a [`Resolution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EolSource {
    EditorConfig(PathBuf),
    GitAttributes(PathBuf),
    ProjectConfig(PathBuf),
    UserConfig(PathBuf),
    HostDefault,
}

impl fmt::Display for EolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EditorConfig(p)
            | Self::GitAttributes(p)
            | Self::ProjectConfig(p)
            | Self::UserConfig(p) => write!(f, "{}", p.display()),
            Self::HostDefault => f.write_str("host default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub policy: EolPolicy,
    pub source: EolSource,
}

/// Opinion of a single cascade source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Decided(LineEnding),
    Preserve,
    Undecided,
    /// The source could not be read or parsed. Treated as `Undecided`.
    Failed(String),
}

impl SourceOutcome {
    fn into_policy(self, origin: &Path) -> Option<EolPolicy> {
        match self {
            Self::Decided(le) => Some(EolPolicy::Normalize(le)),
            Self::Preserve => Some(EolPolicy::Preserve),
            Self::Undecided => None,
            Self::Failed(reason) => {
                debug!(file = %origin.display(), %reason, "ignoring unreadable line-ending source");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LineEndingResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LineEndingResolver {
    user_config: Option<PathBuf>,
}

impl Default for LineEndingResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEndingResolver {
    /// Resolver using `~/.gitscriberc` as the user-level source.
    pub fn new() -> Self {
        Self {
            user_config: user_config_path(),
        }
    }

    /// Use `path` as the user-level source, or none at all.
    pub fn with_user_config(path: Option<PathBuf>) -> Self {
        Self { user_config: path }
    }

    pub fn user_config(&self) -> Option<&Path> {
        self.user_config.as_deref()
    }

    pub fn resolve(&self, file_path: &Path) -> Resolution {
        let dir = file_path.parent().unwrap_or(Path::new("/"));
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(path) = find_upwards(dir, ".editorconfig") {
            let outcome = match std::fs::read_to_string(&path) {
                Ok(text) => editorconfig_outcome(&text, &name),
                Err(e) => SourceOutcome::Failed(e.to_string()),
            };
            if let Some(policy) = outcome.into_policy(&path) {
                return Resolution {
                    policy,
                    source: EolSource::EditorConfig(path),
                };
            }
        }

        if let Some(path) = find_upwards(dir, ".gitattributes") {
            let outcome = match std::fs::read_to_string(&path) {
                Ok(text) => gitattributes_outcome(&text, &name),
                Err(e) => SourceOutcome::Failed(e.to_string()),
            };
            if let Some(policy) = outcome.into_policy(&path) {
                return Resolution {
                    policy,
                    source: EolSource::GitAttributes(path),
                };
            }
        }

        if let Some(path) = find_upwards(dir, PROJECT_CONFIG_FILE) {
            if let Some(policy) = config_outcome(&path).into_policy(&path) {
                return Resolution {
                    policy,
                    source: EolSource::ProjectConfig(path),
                };
            }
        }

        if let Some(path) = self.user_config.as_ref().filter(|p| p.is_file()) {
            if let Some(policy) = config_outcome(path).into_policy(path) {
                return Resolution {
                    policy,
                    source: EolSource::UserConfig(path.clone()),
                };
            }
        }

        Resolution {
            policy: EolPolicy::Normalize(LineEnding::host_default()),
            source: EolSource::HostDefault,
        }
    }

    /// The line ending to write, or `None` when content must be preserved.
    pub fn resolve_line_ending(&self, file_path: &Path) -> Option<LineEnding> {
        self.resolve(file_path).policy.line_ending()
    }

    /// Line endings of an existing file, sampled from its first bytes.
    /// Missing or unreadable files fall back to the cascade.
    pub async fn detect_line_endings(&self, file_path: &Path) -> EolPolicy {
        use tokio::io::AsyncReadExt;

        let sample = async {
            let file = tokio::fs::File::open(file_path).await?;
            let mut buf = Vec::with_capacity(DETECT_SAMPLE_BYTES);
            file.take(DETECT_SAMPLE_BYTES as u64)
                .read_to_end(&mut buf)
                .await?;
            Ok::<_, std::io::Error>(buf)
        };

        match sample.await {
            Ok(bytes) if bytes.windows(2).any(|w| w == b"\r\n") => {
                EolPolicy::Normalize(LineEnding::Crlf)
            }
            Ok(_) => EolPolicy::Normalize(LineEnding::Lf),
            Err(_) => {
                let resolver = self.clone();
                let path = file_path.to_path_buf();
                tokio::task::spawn_blocking(move || resolver.resolve(&path).policy)
                    .await
                    .unwrap_or(EolPolicy::Normalize(LineEnding::host_default()))
            }
        }
    }

    /// Policy for a new file placed directly in `dir`.
    pub fn detect_repo_line_endings(&self, dir: &Path) -> EolPolicy {
        self.resolve(&dir.join("dummy.txt")).policy
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Evaluate `.editorconfig` text for the file called `file_name`.
///
/// Sections matching the name are ordered by pattern length (longest
/// first, later declarations first among equals). The first one with a
/// usable `end_of_line` decides.
pub fn editorconfig_outcome(text: &str, file_name: &str) -> SourceOutcome {
    let sections = parse_editorconfig(text);

    let mut matching: Vec<(usize, &EditorConfigSection)> = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| Pattern::new(&s.pattern, GlobOptions::editorconfig()).matches(file_name))
        .collect();
    matching.sort_by(|(ia, a), (ib, b)| {
        b.pattern
            .chars()
            .count()
            .cmp(&a.pattern.chars().count())
            .then(ib.cmp(ia))
    });

    matching
        .into_iter()
        .filter_map(|(_, s)| s.get("end_of_line"))
        .find_map(|value| value.parse::<LineEnding>().ok())
        .map_or(SourceOutcome::Undecided, SourceOutcome::Decided)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfigSection {
    pub pattern: String,
    pub properties: Vec<(String, String)>,
}

impl EditorConfigSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `.editorconfig` into its sections. Keys before the first section
/// (such as `root = true`) are dropped. Keys are lower-cased.
pub fn parse_editorconfig(text: &str) -> Vec<EditorConfigSection> {
    let mut sections: Vec<EditorConfigSection> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(EditorConfigSection {
                pattern: header.to_string(),
                properties: Vec::new(),
            });
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if let Some(section) = sections.last_mut() {
            section
                .properties
                .push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    sections
}

/// Evaluate `.gitattributes` text for the file called `file_name`,
/// bottom line first.
pub fn gitattributes_outcome(text: &str, file_name: &str) -> SourceOutcome {
    for raw in text.lines().rev() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(pattern) = parts.next() else {
            continue;
        };
        let attrs: Vec<&str> = parts.collect();
        if attrs.is_empty() {
            continue;
        }

        if pattern != "*" && !Pattern::new(pattern, GlobOptions::gitignore()).matches(file_name) {
            continue;
        }

        if attrs.iter().any(|a| *a == "binary" || *a == "-text") {
            return SourceOutcome::Preserve;
        }
        if let Some(le) = attrs
            .iter()
            .filter_map(|a| a.strip_prefix("eol="))
            .find_map(|v| v.parse::<LineEnding>().ok())
        {
            return SourceOutcome::Decided(le);
        }
        if attrs.contains(&"text") {
            return SourceOutcome::Decided(LineEnding::Lf);
        }
    }

    SourceOutcome::Undecided
}

fn config_outcome(path: &Path) -> SourceOutcome {
    match GitscribeConfig::load_from(path) {
        Ok(cfg) => cfg
            .files
            .line_ending()
            .map_or(SourceOutcome::Undecided, SourceOutcome::Decided),
        Err(e) => SourceOutcome::Failed(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Content helpers
// ---------------------------------------------------------------------------

/// Replace `\r\n` and lone `\r` with `\n`.
pub fn normalize_to_lf(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

pub fn apply_line_endings(content: &str, line_ending: LineEnding) -> String {
    let normalized = normalize_to_lf(content);
    match line_ending {
        LineEnding::Lf => normalized,
        LineEnding::Crlf => normalized.replace('\n', "\r\n"),
    }
}
