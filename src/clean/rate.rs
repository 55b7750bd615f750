use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use tracing::{info, instrument};

use crate::process::utils::scalar_f64;

pub const TOTAL_INJURIES_COLUMN: &str = "total_injuries";
pub const TOTAL_HOURS_COLUMN: &str = "total_hours_worked";

/// Hours worked by 100 full-time employees in a year.
pub const RATE_BASE_HOURS: f64 = 200_000.0;

fn column_max(df: &DataFrame, column: &str) -> Result<f64> {
    df.column(column)?;
    let max = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::Float64).max()])
        .collect()
        .with_context(|| format!("computing max of `{}`", column))?;
    scalar_f64(&max, column)?.ok_or_else(|| anyhow!("column `{}` has no numeric values", column))
}

/// Add `rate_column` = injuries × 200 000 / hours for every row.
/// Rows without hours (missing or zero) get null.
pub fn add_incidence_rate(df: &mut DataFrame, rate_column: &str) -> Result<()> {
    df.column(TOTAL_INJURIES_COLUMN)?;
    df.column(TOTAL_HOURS_COLUMN)?;

    let hours = col(TOTAL_HOURS_COLUMN).cast(DataType::Float64);
    let injuries = col(TOTAL_INJURIES_COLUMN).cast(DataType::Float64);
    *df = df
        .clone()
        .lazy()
        .with_column(
            when(hours.clone().gt(lit(0.0)))
                .then(injuries * lit(RATE_BASE_HOURS) / hours)
                .otherwise(lit(NULL).cast(DataType::Float64))
                .alias(rate_column),
        )
        .collect()
        .with_context(|| format!("computing `{}`", rate_column))?;
    Ok(())
}

/// Drop rows whose `rate_column` exceeds the highest rate the table could
/// plausibly produce: max injuries × 200 000 / max hours. Returns the number
/// of rows dropped.
#[instrument(level = "info", skip(df))]
pub fn drop_outlier_rate(df: &mut DataFrame, rate_column: &str) -> Result<usize> {
    df.column(rate_column)?;
    let max_injuries = column_max(df, TOTAL_INJURIES_COLUMN)?;
    let max_hours = column_max(df, TOTAL_HOURS_COLUMN)?;
    let ceiling = max_injuries * RATE_BASE_HOURS / max_hours;

    let before = df.height();
    let rate = col(rate_column).cast(DataType::Float64);
    *df = df
        .clone()
        .lazy()
        .filter(rate.clone().is_null().or(rate.lt_eq(lit(ceiling))))
        .collect()
        .context("filtering rate outliers")?;

    let dropped = before - df.height();
    info!(ceiling, dropped, "dropped rate outliers");
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            TOTAL_INJURIES_COLUMN => [4i64, 10, 3, 1],
            TOTAL_HOURS_COLUMN => [100_000i64, 1_000_000, 1_000, 0]
        )
        .expect("valid test frame")
    }

    #[test]
    fn incidence_rate_per_row() -> Result<()> {
        let mut df = sample();
        add_incidence_rate(&mut df, "total_case_rate")?;
        let rates: Vec<Option<f64>> = df.column("total_case_rate")?.f64()?.into_iter().collect();
        assert_eq!(rates, vec![Some(8.0), Some(2.0), Some(600.0), None]);
        Ok(())
    }

    #[test]
    fn rates_above_ceiling_are_dropped() -> Result<()> {
        let mut df = sample();
        add_incidence_rate(&mut df, "total_case_rate")?;

        // ceiling = 10 * 200_000 / 1_000_000 = 2.0
        let dropped = drop_outlier_rate(&mut df, "total_case_rate")?;
        assert_eq!(dropped, 2);
        let kept: Vec<Option<f64>> = df.column("total_case_rate")?.f64()?.into_iter().collect();
        assert_eq!(kept, vec![Some(2.0), None]);
        Ok(())
    }

    #[test]
    fn missing_rate_column_is_an_error() {
        let mut df = sample();
        assert!(drop_outlier_rate(&mut df, "total_case_rate").is_err());
    }
}
