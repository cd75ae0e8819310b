//! Library scanning, listing and lookup commands.

use std::io::Write;
use std::path::Path;
use tokio::runtime::Runtime;

use super::{absolute, location, open_library};
use crate::config::Config;
use crate::library::ScanStatus;

/// Extract every indexed song and store the library
pub fn cmd_scan(rt: &Runtime, db_path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    rt.block_on(scan(db_path, config))
}

async fn scan(db_path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let library = open_library(db_path, config).await?;

    let mut status = library.subscribe();
    let reporter = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            if let ScanStatus::InProgress { parsed, total } = *status.borrow_and_update() {
                if total > 0 {
                    print!("\rExtracted {}/{} songs...", parsed, total);
                    let _ = std::io::stdout().flush();
                }
            }
        }
    });

    let result = library.scan_for_music().await;
    reporter.abort();
    let summary = result?;
    println!(
        "\nScan complete: {} songs, {} albums.",
        summary.songs, summary.albums
    );
    Ok(())
}

/// List indexed songs, optionally those directly inside `folder`
pub fn cmd_list(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    folder: Option<&Path>,
    mini: bool,
    json: bool,
) -> anyhow::Result<()> {
    rt.block_on(list(db_path, config, folder, mini, json))
}

async fn list(
    db_path: Option<&Path>,
    config: &Config,
    folder: Option<&Path>,
    mini: bool,
    json: bool,
) -> anyhow::Result<()> {
    let folder = folder.map(absolute).transpose()?;
    let folder = folder.as_deref();
    let library = open_library(db_path, config).await?;
    let extractor = library.extractor();

    if mini {
        let songs = extractor.extract_mini(folder).await;
        if json {
            println!("{}", serde_json::to_string_pretty(&songs)?);
        } else {
            for song in &songs {
                println!("{} - {} ({})", song.artist, song.title, song.location);
            }
        }
        return Ok(());
    }

    let songs = extractor.extract(folder).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&songs)?);
    } else {
        for song in &songs {
            println!(
                "{} - {} [{}] {} ({})",
                song.artist, song.title, song.album, song.duration_formatted, song.location
            );
        }
    }
    Ok(())
}

/// Extract a single indexed file and print it as JSON
pub fn cmd_resolve(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    path: &Path,
) -> anyhow::Result<()> {
    rt.block_on(resolve(db_path, config, path))
}

async fn resolve(db_path: Option<&Path>, config: &Config, path: &Path) -> anyhow::Result<()> {
    let library = open_library(db_path, config).await?;
    let Some(song) = library.extractor().resolve_song(&location(path)?).await else {
        anyhow::bail!("{} is not indexed or could not be read", path.display());
    };
    println!("{}", serde_json::to_string_pretty(&song)?);
    Ok(())
}
