//! Media index population.

use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::info;

use super::absolute;
use crate::config::Config;
use crate::db;
use crate::media_index::{index_library, prune_missing};

/// Index audio files under `paths` (or the configured roots).
pub fn cmd_index(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    paths: &[PathBuf],
    prune: bool,
) -> anyhow::Result<()> {
    let roots: &[PathBuf] = if paths.is_empty() {
        &config.library.roots
    } else {
        paths
    };
    if roots.is_empty() {
        anyhow::bail!("No folders given and no library roots configured");
    }

    let roots = roots
        .iter()
        .map(|root| absolute(root))
        .collect::<anyhow::Result<Vec<PathBuf>>>()?;
    rt.block_on(index(db_path, &roots, config.scan.follow_links, prune))
}

async fn index(
    db_path: Option<&Path>,
    roots: &[PathBuf],
    follow_links: bool,
    prune: bool,
) -> anyhow::Result<()> {
    let pool = db::init_db(&db::db_url(db_path)).await?;

    let report = index_library(&pool, roots, follow_links).await?;
    println!(
        "Indexed {} files ({} failed) under {} folder(s).",
        report.indexed,
        report.failed,
        roots.len()
    );

    if prune {
        let removed = prune_missing(&pool).await?;
        info!(target: "indexer", removed, "Pruned index");
        println!("Pruned {} rows without a file.", removed);
    }
    Ok(())
}
