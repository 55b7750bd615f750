// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{info, instrument};

pub mod urls;
pub mod zips;

/// Scrape the listing page, download every archive it links to into
/// `data_dir`, then unpack them all there. Downloads run one after another
/// and the first failure aborts.
#[instrument(level = "info", skip(client, data_dir), fields(dir = %data_dir.as_ref().display()))]
pub async fn import_data(
    client: &Client,
    listing_url: &str,
    data_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let data_dir = data_dir.as_ref();
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("creating {:?}", data_dir))?;

    let links = urls::fetch_archive_urls(client, listing_url).await?;
    info!("{} archives to download", links.len());

    for url in &links {
        let start = Instant::now();
        let path = zips::download_zip(client, url.as_str(), data_dir)
            .await
            .with_context(|| format!("downloading {}", url))?;
        info!(path = %path.display(), elapsed = ?start.elapsed(), "downloaded");
    }

    zips::extract_archives(data_dir)
}
