use anyhow::{bail, Context, Result};
use polars::prelude::*;
use tracing::{debug, info};

use crate::process::utils::{is_numeric, scalar_f64};

/// Inclusive range a value must fall in to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
    pub fn from_quartiles(q1: f64, q3: f64) -> Self {
        let iqr = q3 - q1;
        Bounds {
            lower: q1 - 1.5 * iqr,
            upper: q3 + 1.5 * iqr,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Fences over the non-null values of `column`, with quartiles linearly
/// interpolated between closest ranks. `None` when the column has no values.
pub fn iqr_bounds(df: &DataFrame, column: &str) -> Result<Option<Bounds>> {
    let x = col(column).cast(DataType::Float64);
    let quartiles = df
        .clone()
        .lazy()
        .select([
            x.clone().quantile(lit(0.25), QuantileMethod::Linear).alias("q1"),
            x.quantile(lit(0.75), QuantileMethod::Linear).alias("q3"),
        ])
        .collect()
        .with_context(|| format!("computing quartiles of `{}`", column))?;

    match (scalar_f64(&quartiles, "q1")?, scalar_f64(&quartiles, "q3")?) {
        (Some(q1), Some(q3)) => Ok(Some(Bounds::from_quartiles(q1, q3))),
        _ => Ok(None),
    }
}

/// Drop rows whose value in `column` lies outside the IQR fences computed
/// over that column. Missing values are kept. Returns the number dropped.
pub fn drop_outliers(df: &mut DataFrame, column: &str) -> Result<usize> {
    let values = df.column(column)?;
    if values.null_count() == values.len() {
        debug!(column, "no values, skipping outlier filter");
        return Ok(0);
    }
    if !is_numeric(values.dtype()) {
        bail!("outlier column `{}` holds {} values", column, values.dtype());
    }

    let Some(bounds) = iqr_bounds(df, column)? else {
        return Ok(0);
    };

    let before = df.height();
    let x = col(column).cast(DataType::Float64);
    *df = df
        .clone()
        .lazy()
        .filter(
            x.clone().is_null().or(x
                .clone()
                .gt_eq(lit(bounds.lower))
                .and(x.lt_eq(lit(bounds.upper)))),
        )
        .collect()
        .with_context(|| format!("filtering `{}`", column))?;

    let dropped = before - df.height();
    info!(
        column,
        lower = bounds.lower,
        upper = bounds.upper,
        dropped,
        "dropped outliers"
    );
    Ok(dropped)
}
