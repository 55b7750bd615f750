// src/naics/mod.rs

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::lazy::dsl::concat;
use polars::prelude::*;
use reqwest::Client;
use std::io::Cursor;
use tracing::{debug, info, instrument};

pub const CODE_COLUMN: &str = "naics_code";
pub const DESCRIPTION_COLUMN: &str = "naics_industry_description";

static NAICS_BASE_URL: &str = "https://www.census.gov/naics/";

/// Index files for every NAICS revision, oldest first. Earlier revisions win
/// when a code appears in more than one.
static NAICS_INDEX_FILES: &[&str] = &[
    "2007NAICS/2007_NAICS_Index_File.xls",
    "2012NAICS/2012_NAICS_Index_File.xls",
    "2017NAICS/2017_NAICS_Index_File.xlsx",
    "2022NAICS/2022_NAICS_Index_File.xlsx",
];

const ROW_INDEX: &str = "row_nr";

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        other => {
            let text = other.to_string();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}

/// Read the first worksheet of an `.xls`/`.xlsx` workbook held in memory.
/// The first row is the header; every column is read as text.
pub fn read_reference_sheet(bytes: Vec<u8>, name: &str) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("opening workbook {}", name))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", name))?
        .with_context(|| format!("reading first worksheet of {}", name))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("workbook {} is empty", name))?
        .iter()
        .enumerate()
        .map(|(i, c)| cell_text(c).unwrap_or_else(|| format!("column_{}", i)))
        .collect();

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        if row.iter().all(|c| cell_text(c).is_none()) {
            continue;
        }
        for (column, cell) in values.iter_mut().zip(row.iter()) {
            column.push(cell_text(cell));
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(values)
        .map(|(h, v)| Column::new(h.as_str().into(), v))
        .collect();
    DataFrame::new(columns).with_context(|| format!("building frame from {}", name))
}

/// Rename the first two columns of each frame to the canonical code and
/// description names, stack them, and keep the first row per code. Codes
/// that are not integers (ranges such as `31-33`) are dropped.
pub fn normalize_reference(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let total: usize = frames.iter().map(|df| df.height()).sum();
    let mut renamed = Vec::with_capacity(frames.len());
    for mut df in frames {
        if df.width() < 2 {
            bail!("reference table needs at least two columns, found {}", df.width());
        }
        let names = df.get_column_names_owned();
        df.rename(names[0].as_str(), CODE_COLUMN.into())?;
        df.rename(names[1].as_str(), DESCRIPTION_COLUMN.into())?;
        renamed.push(df.lazy().with_columns([
            col(CODE_COLUMN).cast(DataType::Int64),
            col(DESCRIPTION_COLUMN).cast(DataType::String),
        ]));
    }

    let reference = concat(
        renamed,
        UnionArgs {
            parallel: false,
            rechunk: true,
            to_supertypes: true,
            diagonal: true,
            from_partitioned_ds: false,
            maintain_order: true,
        },
    )
    .context("Failed to concatenate reference frames")?
    .filter(col(CODE_COLUMN).is_not_null())
    .unique_stable(Some(vec![CODE_COLUMN.into()]), UniqueKeepStrategy::First)
    .collect()
    .context("Failed to build NAICS reference")?;

    info!(
        codes = reference.height(),
        dropped = total - reference.height(),
        "built NAICS reference"
    );
    Ok(reference)
}

/// Download every NAICS index file and build the deduplicated reference table.
#[instrument(level = "info", skip(client))]
pub async fn import_naics(client: &Client) -> Result<DataFrame> {
    let mut frames = Vec::with_capacity(NAICS_INDEX_FILES.len());
    for file in NAICS_INDEX_FILES {
        let url = format!("{}{}", NAICS_BASE_URL, file);
        let bytes = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?
            .bytes()
            .await
            .with_context(|| format!("reading body from {}", url))?;
        let df = read_reference_sheet(bytes.to_vec(), file)?;
        debug!(file, rows = df.height(), "read NAICS index");
        frames.push(df);
    }
    normalize_reference(frames)
}

/// Left-join [`DESCRIPTION_COLUMN`] onto `records` by `code_column`, which
/// is cast to an integer code first. Row order is kept; codes without a
/// reference entry get null.
#[instrument(level = "info", skip(records, reference))]
pub fn join_industry(records: &mut DataFrame, reference: &DataFrame, code_column: &str) -> Result<()> {
    let lookup = reference
        .clone()
        .lazy()
        .select([col(CODE_COLUMN), col(DESCRIPTION_COLUMN)]);

    let mut joined = records
        .clone()
        .lazy()
        .with_column(col(code_column).cast(DataType::Int64))
        .with_row_index(ROW_INDEX, None)
        .join(
            lookup,
            [col(code_column)],
            [col(CODE_COLUMN)],
            JoinArgs {
                how: JoinType::Left,
                ..Default::default()
            },
        )
        .sort_by_exprs([col(ROW_INDEX)], SortMultipleOptions::default())
        .collect()
        .context("Failed to join industry descriptions")?;
    joined.drop_in_place(ROW_INDEX)?;

    let matched = joined.height() - joined.column(DESCRIPTION_COLUMN)?.null_count();
    info!(rows = joined.height(), matched, "joined industry descriptions");
    *records = joined;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn reads_first_sheet_of_xlsx() -> Result<()> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "2022 NAICS US Code")?;
        sheet.write_string(0, 1, "INDEX ITEM DESCRIPTION")?;
        sheet.write_number(1, 0, 111110)?;
        sheet.write_string(1, 1, "Soybean farming")?;
        sheet.write_string(1, 2, "see also 111120")?;
        sheet.write_number(3, 0, 445110)?;
        sheet.write_string(3, 1, "Supermarkets")?;
        let bytes = workbook.save_to_buffer()?;

        let df = read_reference_sheet(bytes, "2022_NAICS_Index_File.xlsx")?;
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["2022 NAICS US Code", "INDEX ITEM DESCRIPTION", "column_2"]
        );
        assert_eq!(df.height(), 2, "the blank row is skipped");

        let codes: Vec<Option<&str>> = df.column("2022 NAICS US Code")?.str()?.into_iter().collect();
        assert_eq!(codes, vec![Some("111110"), Some("445110")]);
        let notes: Vec<Option<&str>> = df.column("column_2")?.str()?.into_iter().collect();
        assert_eq!(notes, vec![Some("see also 111120"), None]);

        let reference = normalize_reference(vec![df])?;
        let codes: Vec<Option<i64>> = reference.column(CODE_COLUMN)?.i64()?.into_iter().collect();
        assert_eq!(codes, vec![Some(111110), Some(445110)]);
        Ok(())
    }

    #[test]
    fn normalize_renames_and_drops_duplicate_codes() -> Result<()> {
        let v2007 = df!(
            "NAICS07" => ["111110", "111110", "445110", "31-33"],
            "INDEX ITEM DESCRIPTION" => [
                "Soybean farming",
                "Soybeans grown for seed",
                "Supermarkets",
                "Manufacturing"
            ]
        )?;
        let v2022 = df!(
            "NAICS22" => [Some(445110.0), Some(492110.0)],
            "INDEX ITEM DESCRIPTION" => ["Grocery stores", "Couriers"],
            "extra" => [None, Some("x")]
        )?;

        let reference = normalize_reference(vec![v2007, v2022])?;
        let names: Vec<&str> = reference.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(&names[..2], &[CODE_COLUMN, DESCRIPTION_COLUMN]);

        let codes: Vec<Option<i64>> = reference.column(CODE_COLUMN)?.i64()?.into_iter().collect();
        assert_eq!(codes, vec![Some(111110), Some(445110), Some(492110)]);

        let descs: Vec<Option<&str>> = reference.column(DESCRIPTION_COLUMN)?.str()?.into_iter().collect();
        assert_eq!(
            descs,
            vec![Some("Soybean farming"), Some("Supermarkets"), Some("Couriers")]
        );
        Ok(())
    }

    #[test]
    fn single_column_table_is_rejected() -> Result<()> {
        let df = df!("only" => [1i64])?;
        assert!(normalize_reference(vec![df]).is_err());
        Ok(())
    }

    #[test]
    fn join_adds_description_by_code() -> Result<()> {
        let reference = df!(
            CODE_COLUMN => [492110i64, 445110],
            DESCRIPTION_COLUMN => ["Couriers", "Supermarkets"]
        )?;
        let mut records = df!(
            "company_name" => ["Unknown", "FedEx Ground", "Aldi", "Blank"],
            "naics_code" => [Some("999999"), Some("492110"), Some("445110"), None]
        )?;

        join_industry(&mut records, &reference, "naics_code")?;
        let names: Vec<Option<&str>> = records.column("company_name")?.str()?.into_iter().collect();
        assert_eq!(
            names,
            vec![Some("Unknown"), Some("FedEx Ground"), Some("Aldi"), Some("Blank")]
        );
        let descs: Vec<Option<&str>> = records.column(DESCRIPTION_COLUMN)?.str()?.into_iter().collect();
        assert_eq!(descs, vec![None, Some("Couriers"), Some("Supermarkets"), None]);
        assert!(records.column(ROW_INDEX).is_err());
        Ok(())
    }
}
