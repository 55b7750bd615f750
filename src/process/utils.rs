use anyhow::{Context, Result};
use polars::prelude::*;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Integer and floating point dtypes; everything else is treated as text.
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// First value of `name` in an aggregated one-row frame. `None` when null.
pub fn scalar_f64(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    let value = df
        .column(name)?
        .get(0)
        .with_context(|| format!("aggregate `{}` is empty", name))?;
    Ok(value.extract::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_unquotes() {
        assert_eq!(clean_str("  company_name "), "company_name");
        assert_eq!(clean_str("\"size\""), "size");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn numeric_dtypes() {
        assert!(is_numeric(&DataType::Int64));
        assert!(is_numeric(&DataType::Float32));
        assert!(!is_numeric(&DataType::String));
        assert!(!is_numeric(&DataType::Boolean));
    }

    #[test]
    fn scalar_reads_first_value() -> Result<()> {
        let df = df!("max" => [Some(4.5f64)], "none" => [None::<f64>])?;
        assert_eq!(scalar_f64(&df, "max")?, Some(4.5));
        assert_eq!(scalar_f64(&df, "none")?, None);
        assert!(scalar_f64(&df, "missing").is_err());
        Ok(())
    }
}
