// src/process/mod.rs
use anyhow::{bail, Context, Result};
use glob::glob;
use polars::lazy::dsl::concat;
use polars::prelude::*;
use std::{fs, io::Cursor, path::Path};
use tracing::{debug, info, instrument};

pub mod decode;
pub mod utils;

/// Name of the provenance column added by [`combine_csv`].
pub const SOURCE_COLUMN: &str = "source";

/// Read one CSV file with a header row into a [`DataFrame`].
///
/// Column types are inferred over the whole file; empty fields are null.
pub fn read_csv_file(path: &Path) -> Result<DataFrame> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let text = decode::decode_text(&bytes, &file_name);

    let mut cursor = Cursor::new(text.as_bytes());
    let opts = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None);
    let mut df: DataFrame = opts
        .into_reader_with_file_handle(&mut cursor)
        .finish()
        .with_context(|| format!("CSV parse error in {}", file_name))?;

    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|hdr| utils::clean_str(hdr.as_str()))
        .collect();
    df.set_column_names(headers)
        .with_context(|| format!("renaming headers of {}", file_name))?;
    Ok(df)
}

/// Read every `*.csv` in `dir`, tag each row with its file name under
/// [`SOURCE_COLUMN`] and stack them. Columns missing from a file are null
/// for its rows.
#[instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn combine_csv(dir: impl AsRef<Path>) -> Result<DataFrame> {
    let dir = dir.as_ref();
    let pattern = format!("{}/*.csv", dir.display());
    let mut paths = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();

    if paths.is_empty() {
        bail!("no CSV files found under '{}'", dir.display());
    }

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        let mut df = read_csv_file(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!(file = %name, rows = df.height(), "read CSV");
        let source = Series::new(SOURCE_COLUMN.into(), vec![name.clone(); df.height()]);
        df.with_column(source)
            .with_context(|| format!("tagging rows of {}", name))?;
        frames.push(df.lazy());
    }

    let merged = concat(
        frames,
        UnionArgs {
            parallel: false,
            rechunk: true,
            to_supertypes: true,
            diagonal: true,
            from_partitioned_ds: false,
            maintain_order: true,
        },
    )
    .context("Failed to concatenate CSV frames")?
    .collect()
    .context("Failed to collect merged CSV frame")?;

    info!(
        files = paths.len(),
        rows = merged.height(),
        columns = merged.width(),
        "merged CSV files"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,injuryscraper::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    #[test]
    fn merges_and_tags_source() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        fs::write(
            dir.path().join("ITA Data CY 2021.csv"),
            "company_name,size,total_injuries\nAcme,1,3\nGlobex,2,\n",
        )?;
        fs::write(
            dir.path().join("ITA Data CY 2022.csv"),
            "company_name,size,annual_average_employees\nInitech,3,40\n",
        )?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let df = combine_csv(dir.path())?;
        assert_eq!(df.height(), 3);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "company_name",
                "size",
                "total_injuries",
                SOURCE_COLUMN,
                "annual_average_employees"
            ]
        );

        let sources: Vec<Option<&str>> = df.column(SOURCE_COLUMN)?.str()?.into_iter().collect();
        assert_eq!(
            sources,
            vec![
                Some("ITA Data CY 2021.csv"),
                Some("ITA Data CY 2021.csv"),
                Some("ITA Data CY 2022.csv")
            ]
        );

        let injuries: Vec<Option<i64>> = df.column("total_injuries")?.i64()?.into_iter().collect();
        assert_eq!(injuries, vec![Some(3), None, None]);
        Ok(())
    }

    #[test]
    fn reads_cp1252_file() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let mut body = b"company_name,size\n".to_vec();
        body.extend_from_slice(&[0x4E, 0x65, 0x73, 0x74, 0x6C, 0xE9, b',', b'1', b'\n']);
        fs::write(dir.path().join("legacy.csv"), body)?;

        let df = combine_csv(dir.path())?;
        assert_eq!(df.column("company_name")?.str()?.get(0), Some("Nestlé"));
        Ok(())
    }

    #[test]
    fn headers_are_trimmed() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("padded.csv");
        fs::write(&path, " company_name , size\nAcme,1\n")?;
        let df = read_csv_file(&path)?;
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["company_name", "size"]);
        Ok(())
    }

    #[test]
    fn empty_directory_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        assert!(combine_csv(dir.path()).is_err());
        Ok(())
    }
}
