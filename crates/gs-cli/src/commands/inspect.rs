use std::path::Path;

use super::{absolute, open_workspace};

/// Print the line-ending policy for `path` and the source that decided it.
pub async fn eol(dir: &Path, path: &Path) -> anyhow::Result<()> {
    let workspace = open_workspace(dir).await?;
    let path = absolute(path)?;

    let resolution = workspace.resolver().resolve(&path);
    let detected = workspace.resolver().detect_line_endings(&path).await;
    println!("policy:   {}", resolution.policy);
    println!("source:   {}", resolution.source);
    println!("detected: {detected}");
    Ok(())
}

pub async fn rules(dir: &Path, path: &Path) -> anyhow::Result<()> {
    let workspace = open_workspace(dir).await?;
    let rules = workspace.rules_for(&absolute(path)?);

    if rules.is_empty() {
        println!("No rules apply to {}", path.display());
        return Ok(());
    }
    for rule in rules {
        let name = rule
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let why = if rule.always_apply {
            "always".to_string()
        } else {
            rule.globs.join(", ")
        };
        println!("== {name} ({why})");
        if let Some(description) = &rule.description {
            println!("   {description}");
        }
        if !rule.payload.is_empty() {
            println!("{}", rule.payload);
        }
    }
    Ok(())
}

pub async fn sessions(dir: &Path) -> anyhow::Result<()> {
    let workspace = open_workspace(dir).await?;
    let sessions = workspace.sessions().list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions.");
    }
    for (id, tip) in sessions {
        println!("{id}\t{}", &tip[..tip.len().min(12)]);
    }
    Ok(())
}
