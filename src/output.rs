// src/output.rs

use anyhow::{Context, Result};
use polars::prelude::*;
use std::{fs, fs::File, path::Path};
use tracing::{info, instrument};

/// Write the frame to `path` as Snappy-compressed Parquet. The file is
/// written next to `path` first and renamed into place.
#[instrument(level = "info", skip(df, path), fields(path = %path.as_ref().display()))]
pub fn write_parquet(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }

    let tmp_path = path.with_extension("parquet.tmp");
    {
        let mut tmp_file = File::create(&tmp_path)
            .with_context(|| format!("creating output file {:?}", &tmp_path))?;
        ParquetWriter::new(&mut tmp_file)
            .with_compression(ParquetCompression::Snappy)
            .finish(df)
            .with_context(|| format!("writing parquet {:?}", &tmp_path))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    info!(rows = df.height(), columns = df.width(), "wrote parquet");
    Ok(())
}
