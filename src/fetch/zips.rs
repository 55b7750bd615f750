use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::{
    fs::{self as std_fs, File},
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;
use zip::ZipArchive;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").expect("year regex should compile"));

/// File name an archive is saved under: the last path segment of its URL,
/// which must name a `.zip` file.
pub fn archive_file_name(url: &Url) -> Result<String> {
    let name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("{} has no file name", url))?;
    if !name.to_ascii_lowercase().ends_with(".zip") {
        bail!("{} does not point at a .zip archive", url);
    }
    Ok(name.to_string())
}

/// Filing year named in an archive's file name, e.g. `ITA_Data_CY_2021.zip`.
pub fn archive_year(name: &str) -> Option<i32> {
    YEAR_RE.find(name).and_then(|m| m.as_str().parse().ok())
}

/// Download one yearly archive into `dest_dir` under its own file name.
/// Returns the full path of the saved file.
pub async fn download_zip(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing archive URL {}", url_str))?;
    let filename = archive_file_name(&url)?;
    let dest_path = dest_dir.join(&filename);
    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {:?}", dest_dir))?;

    let bytes = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()
        .with_context(|| format!("GET {} returned an error status", url))?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;

    debug!(
        path = %dest_path.display(),
        year = ?archive_year(&filename),
        bytes = bytes.len(),
        "saved archive"
    );
    Ok(dest_path)
}

/// Unpack one archive into `dest_dir`, returning the paths of the files it held.
pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;

    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, zip_path))?;
        if entry.is_file() {
            if let Some(name) = entry.enclosed_name() {
                files.push(dest_dir.join(name));
            }
        }
    }

    archive
        .extract(dest_dir)
        .with_context(|| format!("extracting {:?} into {:?}", zip_path, dest_dir))?;
    Ok(files)
}

/// Extract every `*.zip` found directly in `dir` into that same directory.
#[instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn extract_archives(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std_fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

    let pattern = format!("{}/*.zip", dir.display());
    let mut extracted = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("Failed to read glob pattern '{}'", pattern))? {
        let zip_path = entry?;
        let files = extract_zip(&zip_path, dir)?;
        info!(zip = %zip_path.display(), files = files.len(), "extracted");
        extracted.extend(files);
    }
    Ok(extracted)
}
