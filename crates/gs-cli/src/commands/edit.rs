use std::path::Path;

use anyhow::Context;
use gs_core::ops;
use tokio::io::AsyncReadExt;

use super::{absolute, open_session};

/// `write`: content comes from `--content`, otherwise stdin.
pub async fn write(
    dir: &Path,
    chat_id: Option<&str>,
    path: &Path,
    description: &str,
    content: Option<String>,
) -> anyhow::Result<()> {
    let ctx = open_session(dir, chat_id).await?;
    let content = match content {
        Some(content) => content,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading content from stdin")?;
            buf
        }
    };

    let result = ops::write_file(&ctx, &absolute(path)?, &content, description).await?;
    println!("{result}");
    Ok(())
}

pub async fn remove(
    dir: &Path,
    chat_id: Option<&str>,
    path: &Path,
    description: &str,
) -> anyhow::Result<()> {
    let ctx = open_session(dir, chat_id).await?;
    let result = ops::remove_file(&ctx, &absolute(path)?, description).await?;
    println!("{result}");
    Ok(())
}

pub async fn chmod(dir: &Path, chat_id: Option<&str>, path: &Path, mode: &str) -> anyhow::Result<()> {
    let ctx = open_session(dir, chat_id).await?;
    let result = ops::chmod(&ctx, &absolute(path)?, mode).await?;
    println!("{result}");
    Ok(())
}
