// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Which columns the cleaner drops, filters and reinterprets.
///
/// Defaults follow the column layout of the OSHA establishment-specific
/// injury files once joined with the NAICS reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub columns_drop: Vec<String>,
    pub outlier_columns: Vec<String>,
    pub integer_columns: Vec<String>,
    pub injury_column: String,
    pub size_column: String,
    pub year_column: String,
    pub company_column: String,
    pub establishment_column: String,
    pub industry_raw: String,
    pub industry_clean: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            columns_drop: strings(&[
                "id",
                "street_address",
                "zip_code",
                "ein",
                "establishment_type",
                "created_timestamp",
            ]),
            outlier_columns: strings(&["annual_average_employees", "total_hours_worked"]),
            integer_columns: strings(&[
                "annual_average_employees",
                "total_hours_worked",
                "total_deaths",
                "total_dafw_cases",
                "total_djtr_cases",
                "total_other_cases",
                "total_dafw_days",
                "total_djtr_days",
                "total_injuries",
            ]),
            injury_column: "no_injuries_illnesses".into(),
            size_column: "size".into(),
            year_column: "year_filing_for".into(),
            company_column: "company_name".into(),
            establishment_column: "establishment_name".into(),
            industry_raw: "industry_description".into(),
            industry_clean: crate::naics::DESCRIPTION_COLUMN.into(),
        }
    }
}

impl CleanOptions {
    /// Load options from a YAML file; fields it leaves out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
