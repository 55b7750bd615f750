// src/fetch/urls.rs
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

/// OSHA page listing the yearly establishment-specific injury archives.
pub const LISTING_URL: &str = "https://www.osha.gov/Establishment-Specific-Injury-and-Illness-Data";

/// Pull every `.zip` link out of a listing page, resolved against `base`.
pub fn extract_archive_links(html: &str, base: &Url) -> Vec<Url> {
    let selector =
        Selector::parse(r#"a[href*=".zip"]"#).expect("CSS selector for ZIP links should be valid");

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .collect()
}

/// Fetch the listing page and return absolute archive URLs in page order.
#[instrument(level = "info", skip(client))]
pub async fn fetch_archive_urls(client: &Client, listing_url: &str) -> Result<Vec<Url>> {
    let base = Url::parse(listing_url)
        .with_context(|| format!("parsing listing URL {}", listing_url))?;
    let html = client
        .get(base.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", base))?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("reading body from {}", base))?;

    let links = extract_archive_links(&html, &base);
    debug!(count = links.len(), "found archive links");
    Ok(links)
}
