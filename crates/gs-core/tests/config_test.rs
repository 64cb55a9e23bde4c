//! Loading and layering `gitscribe.toml` / `~/.gitscriberc`.

use std::fs;
use std::time::Duration;

use gs_core::config::{ConfigError, GitSettings, GitscribeConfig};

#[test]
fn discover_walks_up_from_nested_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("gitscribe.toml");
    fs::write(&project, "[git]\nno_commit = false\n").unwrap();
    let nested = tmp.path().join("a/b/c");
    fs::create_dir_all(&nested).unwrap();

    let (found, cfg) = GitscribeConfig::discover(&nested).unwrap().unwrap();
    assert_eq!(found, project);
    assert_eq!(cfg.git.no_commit, Some(false));
}

#[test]
fn load_layers_project_over_user() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("gitscribe.toml"), "[git]\nenabled = true\n").unwrap();
    let user = tmp.path().join("user.toml");
    fs::write(&user, "[git]\nenabled = false\ntimeout_secs = 12\n").unwrap();

    let settings = GitSettings::load(tmp.path(), Some(&user)).unwrap();
    assert!(settings.enabled);
    assert!(settings.no_commit);
    assert_eq!(settings.timeout, Duration::from_secs(12));
}

#[test]
fn missing_files_give_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = GitSettings::load(tmp.path(), Some(&tmp.path().join("absent"))).unwrap();
    assert_eq!(settings, GitSettings::default());
    assert_eq!(settings.timeout, Duration::from_secs(30));
}

#[test]
fn broken_project_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("gitscribe.toml"), "[git\n").unwrap();
    let err = GitSettings::load(tmp.path(), None).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_from_missing_path_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = GitscribeConfig::load_from(tmp.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
