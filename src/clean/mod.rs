// src/clean/mod.rs

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::borrow::Cow;
use tracing::{info, instrument, warn};

use crate::config::CleanOptions;
use crate::process::utils::{is_numeric, scalar_f64};

pub mod company;
pub mod outliers;
pub mod rate;

/// Name the injury-count column carries once cleaned.
pub const INJURY_ILLNESS_COLUMN: &str = "injury_illness";

pub const INJURY_LABELS: &[(i64, &str)] = &[(1, "yes"), (2, "no")];
pub const SIZE_LABELS: &[(i64, &str)] = &[(1, "1-20"), (2, "20-249"), (3, "250+")];

/// Set every negative value in a numeric column to zero. Text columns are
/// skipped. Returns the number of cells changed.
pub fn clamp_negatives(df: &mut DataFrame) -> Result<usize> {
    let numeric: Vec<(PlSmallStr, DataType)> = df
        .get_columns()
        .iter()
        .filter(|c| is_numeric(c.dtype()))
        .map(|c| (c.name().clone(), c.dtype().clone()))
        .collect();
    if numeric.is_empty() {
        return Ok(0);
    }

    let counts = df
        .clone()
        .lazy()
        .select(
            numeric
                .iter()
                .map(|(name, _)| {
                    col(name.clone())
                        .lt(lit(0))
                        .cast(DataType::Int64)
                        .sum()
                        .alias(name.clone())
                })
                .collect::<Vec<_>>(),
        )
        .collect()
        .context("counting negative values")?;
    let mut clamped = 0;
    for (name, _) in &numeric {
        clamped += scalar_f64(&counts, name)?.unwrap_or(0.0) as usize;
    }

    *df = df
        .clone()
        .lazy()
        .with_columns(
            numeric
                .iter()
                .map(|(name, dtype)| {
                    when(col(name.clone()).lt(lit(0)))
                        .then(lit(0))
                        .otherwise(col(name.clone()))
                        .cast(dtype.clone())
                        .alias(name.clone())
                })
                .collect::<Vec<_>>(),
        )
        .collect()
        .context("clamping negative values")?;
    Ok(clamped)
}

/// Cast `columns` to `Int64`, truncating fractions. Nulls stay null; text
/// that is not a number is an error.
pub fn coerce_integers(df: &mut DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        df.column(name)
            .with_context(|| format!("converting `{}` to integer", name))?;
    }
    *df = df
        .clone()
        .lazy()
        .with_columns(
            columns
                .iter()
                .map(|name| {
                    col(name.as_str())
                        .strict_cast(DataType::Float64)
                        .strict_cast(DataType::Int64)
                })
                .collect::<Vec<_>>(),
        )
        .collect()
        .context("converting columns to integer")?;
    Ok(())
}

/// Replace numeric codes with their labels. Values already holding a label
/// are kept; anything else becomes null. Returns how many values were
/// unrecognised.
pub fn remap_codes(df: &mut DataFrame, column: &str, labels: &[(i64, &str)]) -> Result<usize> {
    let before = df.column(column)?.null_count();

    let code = col(column).cast(DataType::Float64);
    let text = col(column).cast(DataType::String);
    let mut mapped = lit(NULL).cast(DataType::String);
    for (key, label) in labels.iter().rev() {
        mapped = when(code.clone().eq(lit(*key as f64)).or(text.clone().eq(lit(*label))))
            .then(lit(*label))
            .otherwise(mapped);
    }

    *df = df
        .clone()
        .lazy()
        .with_column(mapped.alias(column))
        .collect()
        .with_context(|| format!("remapping codes in `{}`", column))?;

    let unmapped = df.column(column)?.null_count() - before;
    if unmapped > 0 {
        warn!(column, unmapped, "unrecognised category codes set to null");
    }
    Ok(unmapped)
}

/// Read a calendar year from `2021`, `2021.0` or `2021-06-30`.
pub fn parse_year(raw: &str) -> Result<i64> {
    let t = raw.trim();
    let year = match t.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => f,
        Ok(f) => bail!("cannot read a year from {}", f),
        Err(_) => NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .map(|d| d.year() as f64)
            .with_context(|| format!("cannot read a year from {:?}", raw))?,
    };
    let date = NaiveDate::from_ymd_opt(year as i32, 1, 1)
        .with_context(|| format!("{} is not a valid year", year))?;
    Ok(date.year() as i64)
}

/// Replace `column` with its calendar year as an integer.
pub fn normalize_year(df: &mut DataFrame, column: &str) -> Result<()> {
    let text = df.column(column)?.cast(&DataType::String)?;
    let years = text
        .str()?
        .into_iter()
        .map(|v| v.map(parse_year).transpose())
        .collect::<Result<Vec<Option<i64>>>>()?;
    df.with_column(Series::new(column.into(), years))?;
    Ok(())
}

fn is_missing(v: Option<&str>) -> bool {
    v.is_none()
}

fn is_blank(v: Option<&str>) -> bool {
    v.map_or(true, |s| s.trim().is_empty())
}

/// Fill values of `target` that `blank` flags with the same row's `source`
/// value. Returns how many values were filled.
fn backfill_from(
    df: &mut DataFrame,
    target: &str,
    source: &str,
    blank: fn(Option<&str>) -> bool,
) -> Result<usize> {
    let targets = df.column(target)?.cast(&DataType::String)?;
    let sources = df.column(source)?.cast(&DataType::String)?;

    let mut filled = 0;
    let values: Vec<Option<String>> = targets
        .str()?
        .into_iter()
        .zip(sources.str()?.into_iter())
        .map(|(t, s)| match s {
            Some(s) if blank(t) => {
                filled += 1;
                Some(s.to_string())
            }
            _ => t.map(str::to_string),
        })
        .collect();
    df.with_column(Series::new(target.into(), values))?;
    Ok(filled)
}

/// Apply every cleaning rule to `df`, in place and in order.
#[instrument(level = "info", skip(df, opts), fields(rows = df.height()))]
pub fn clean_format(df: &mut DataFrame, opts: &CleanOptions) -> Result<()> {
    for name in &opts.columns_drop {
        df.drop_in_place(name)
            .with_context(|| format!("dropping column `{}`", name))?;
    }

    for name in &opts.outlier_columns {
        outliers::drop_outliers(df, name)
            .with_context(|| format!("filtering outliers in `{}`", name))?;
    }

    let clamped = clamp_negatives(df)?;
    info!(clamped, "clamped negative values to zero");

    coerce_integers(df, &opts.integer_columns)?;

    df.rename(&opts.injury_column, INJURY_ILLNESS_COLUMN.into())
        .with_context(|| format!("renaming `{}`", opts.injury_column))?;
    remap_codes(df, INJURY_ILLNESS_COLUMN, INJURY_LABELS)?;
    remap_codes(df, &opts.size_column, SIZE_LABELS)?;

    normalize_year(df, &opts.year_column)
        .with_context(|| format!("normalizing year column `{}`", opts.year_column))?;

    let names = backfill_from(df, &opts.company_column, &opts.establishment_column, is_blank)?;
    let industries = backfill_from(df, &opts.industry_clean, &opts.industry_raw, is_missing)?;
    df.drop_in_place(&opts.industry_raw)?;
    info!(names, industries, "backfilled missing values");

    let companies = df.column(&opts.company_column)?.cast(&DataType::String)?;
    let normalized: StringChunked = companies
        .str()?
        .apply(|opt| opt.map(|v| Cow::Owned(company::normalize_company_name(v))));
    df.replace(&opts.company_column, normalized.into_series())?;

    info!(rows = df.height(), "cleaned table");
    Ok(())
}
