use anyhow::Result;
use clap::Parser;
use injuryscraper::{
    clean::{self, rate},
    config::CleanOptions,
    fetch::{self, urls::LISTING_URL},
    naics, output, process,
};
use reqwest::Client;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Download, merge and clean the OSHA establishment injury files.
#[derive(Parser, Debug)]
struct Args {
    /// Directory archives are downloaded and extracted into
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where the cleaned table is written
    #[arg(long, default_value = "cleaned.parquet")]
    output: PathBuf,

    /// Page listing the yearly archives
    #[arg(long, default_value = LISTING_URL)]
    listing_url: String,

    /// Use the CSVs already in --data-dir instead of downloading
    #[arg(long)]
    skip_fetch: bool,

    /// YAML file overriding the cleaning options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Column holding the injury incidence rate
    #[arg(long, default_value = "total_case_rate")]
    rate_column: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let opts = match &args.config {
        Some(path) => CleanOptions::load(path)?,
        None => CleanOptions::default(),
    };
    info!(?args, "startup");
    let start = Instant::now();
    let client = Client::new();

    // ─── 2) download + extract archives ──────────────────────────────
    if args.skip_fetch {
        info!("skipping download; using {}", args.data_dir.display());
    } else {
        let files = fetch::import_data(&client, &args.listing_url, &args.data_dir).await?;
        info!("{} files extracted", files.len());
    }

    // ─── 3) merge CSVs ───────────────────────────────────────────────
    let mut records = process::combine_csv(&args.data_dir)?;

    // ─── 4) NAICS reference + join ───────────────────────────────────
    let reference = naics::import_naics(&client).await?;
    naics::join_industry(&mut records, &reference, naics::CODE_COLUMN)?;

    // ─── 5) clean ────────────────────────────────────────────────────
    clean::clean_format(&mut records, &opts)?;

    // ─── 6) rate outliers ────────────────────────────────────────────
    if records.column(&args.rate_column).is_err() {
        rate::add_incidence_rate(&mut records, &args.rate_column)?;
    }
    rate::drop_outlier_rate(&mut records, &args.rate_column)?;

    // ─── 7) write ────────────────────────────────────────────────────
    output::write_parquet(&mut records, &args.output)?;

    info!(rows = records.height(), elapsed = ?start.elapsed(), "all done");
    Ok(())
}
