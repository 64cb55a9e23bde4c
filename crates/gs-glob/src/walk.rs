use std::path::{Path, PathBuf};

use crate::pattern::{GlobOptions, Pattern};

/// Return the paths matching at least one of `patterns`, in input order.
pub fn filter<'a, I>(patterns: &[&str], paths: I, options: GlobOptions) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let compiled: Vec<Pattern> = patterns
        .iter()
        .map(|p| Pattern::new(p, options))
        .collect();

    paths
        .into_iter()
        .filter(|path| compiled.iter().any(|p| p.matches(path)))
        .map(str::to_string)
        .collect()
}

/// Walk `root` and return every file whose root-relative path matches
/// `pattern`. Results are sorted. Unreadable directories are skipped.
pub fn find(root: &Path, pattern: &str, options: GlobOptions) -> Vec<PathBuf> {
    let compiled = Pattern::new(pattern, options);
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let Ok(rel) = path.strip_prefix(root) else {
                    continue;
                };
                match to_slash(rel) {
                    Some(rel) if compiled.matches(&rel) => found.push(path),
                    Some(_) => {}
                    None => {
                        tracing::debug!(path = %path.display(), "skipping non-UTF-8 file name");
                    }
                }
            }
        }
    }

    found.sort();
    found
}

/// Match a file path against a rule glob.
///
/// A pattern without `/` is matched against the base name only. Otherwise the
/// pattern may match any trailing run of path segments, so `src/*.rs` matches
/// `/repo/crate/src/lib.rs`.
pub fn match_file_with_glob(file_path: &str, pattern: &str) -> bool {
    if file_path.is_empty() || pattern.is_empty() {
        return false;
    }

    let path = file_path.replace('\\', "/");
    let compiled = Pattern::new(
        pattern.trim_start_matches('/'),
        GlobOptions::editorconfig().with_asterisk_crossing(false),
    );

    if !pattern.contains('/') {
        let name = path.rsplit('/').next().unwrap_or(path.as_str());
        return compiled.matches(name);
    }

    let trimmed = path.trim_start_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    (0..segments.len()).any(|start| compiled.matches(&segments[start..].join("/")))
}

/// `/`-joined components, or `None` if any of them is not UTF-8.
fn to_slash(path: &Path) -> Option<String> {
    path.components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_input_order() {
        let paths = ["b.txt", "a.py", "c.txt", "d/e.txt"];
        let kept = filter(&["*.txt"], paths, GlobOptions::gitignore());
        assert_eq!(kept, vec!["b.txt", "c.txt"]);
    }

    #[test]
    fn filter_with_several_patterns() {
        let paths = ["a.rs", "b.toml", "c.md"];
        let kept = filter(&["*.rs", "*.md"], paths, GlobOptions::gitignore());
        assert_eq!(kept, vec!["a.rs", "c.md"]);
    }

    #[test]
    fn find_walks_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::write(root.join("top.rs"), "").unwrap();
        std::fs::write(root.join("src/lib.rs"), "").unwrap();
        std::fs::write(root.join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(root.join("src/readme.md"), "").unwrap();

        let all = find(root, "**/*.rs", GlobOptions::gitignore());
        assert_eq!(
            all,
            vec![
                root.join("src/lib.rs"),
                root.join("src/nested/mod.rs"),
                root.join("top.rs"),
            ]
        );

        let top_only = find(root, "*.rs", GlobOptions::gitignore());
        assert_eq!(top_only, vec![root.join("top.rs")]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn find_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "x").unwrap();
        std::fs::write(tmp.path().join("plain.txt"), "x").unwrap();

        let found = find(tmp.path(), "*.txt", GlobOptions::gitignore());
        assert_eq!(found, vec![tmp.path().join("plain.txt")]);
        assert_eq!(to_slash(Path::new("a/b")).as_deref(), Some("a/b"));
        assert_eq!(to_slash(Path::new(OsStr::from_bytes(b"a/\xff"))), None);
    }

    #[test]
    fn find_on_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find(&tmp.path().join("nope"), "*", GlobOptions::gitignore()).is_empty());
    }

    #[test]
    fn rule_glob_matches_base_name() {
        assert!(match_file_with_glob("/path/to/file.js", "*.js"));
        assert!(match_file_with_glob("file.js", "*.js"));
        assert!(!match_file_with_glob("/path/to/file.ts", "*.js"));
        assert!(match_file_with_glob("/path/to/main.ts", "{main,index}.ts"));
    }

    #[test]
    fn rule_glob_matches_trailing_segments() {
        assert!(match_file_with_glob("/repo/src/lib.rs", "src/*.rs"));
        assert!(match_file_with_glob("/repo/src/lib.rs", "/src/*.rs"));
        assert!(match_file_with_glob("/repo/a/b/c.txt", "a/**/c.txt"));
        assert!(!match_file_with_glob("/repo/lib/lib.rs", "src/*.rs"));
    }

    #[test]
    fn rule_glob_normalizes_backslashes() {
        assert!(match_file_with_glob(r"C:\repo\src\lib.rs", "src/*.rs"));
    }

    #[test]
    fn rule_glob_rejects_empty_input() {
        assert!(!match_file_with_glob("", "*.js"));
        assert!(!match_file_with_glob("/a.js", ""));
    }
}
