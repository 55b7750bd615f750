//! Company-name normalization.
//!
//! Names are stripped of punctuation, title-cased, cleared of corporate
//! suffixes and finally mapped onto a canonical brand where one is known.

use once_cell::sync::Lazy;
use regex::Regex;

const REMOVED_CHARS: &[char] = &['.', ',', '\'', '&', '/', '+', '!', '`'];

static SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Inc|Llc|Corp|Ltd|Lp)\b").expect("suffix regex should compile"));
static MULTI_WS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Exact variants seen in the filings, after the earlier steps have run.
static KNOWN_VARIANTS: &[(&str, &str)] = &[
    ("Bed Bath And Beyond", "Bed Bath Beyond"),
    ("Lowes Home Improvement", "Lowes"),
    ("Us Postal Service", "Usps"),
    ("Wal Mart Stores East", "Walmart"),
    ("Wal Mart Stores", "Walmart"),
];

/// Any name with a word starting with one of these becomes the brand itself.
static BRANDS: &[&str] = &["Fedex", "Aldi", "Lidl", "Amazon", "Walmart"];

pub fn strip_punctuation(name: &str) -> String {
    name.chars()
        .filter(|c| !REMOVED_CHARS.contains(c))
        .map(|c| if c == '-' { ' ' } else { c })
        .collect()
}

/// Uppercase the first letter of every word and lowercase the rest. A word
/// starts after any character that is not a letter, so `3m` → `3M`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_letter = false;
    for c in name.chars() {
        if prev_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_letter = c.is_alphabetic();
    }
    out
}

/// Remove corporate suffixes, collapse whitespace, trim. Expects a
/// title-cased name. A name made only of suffixes is returned collapsed.
pub fn strip_suffixes(name: &str) -> String {
    let collapse = |s: &str| MULTI_WS_RE.replace_all(s, " ").trim().to_string();
    let stripped = collapse(&SUFFIX_RE.replace_all(name, ""));
    if stripped.is_empty() {
        collapse(name)
    } else {
        stripped
    }
}

fn brand_of(name: &str) -> Option<&'static str> {
    let words: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();
    BRANDS.iter().copied().find(|brand| {
        let brand = brand.to_lowercase();
        // A split brand ("Fed Ex") counts only when the pair spells it exactly.
        words.iter().any(|w| w.starts_with(&brand))
            || words.windows(2).any(|pair| pair.concat() == brand)
    })
}

/// Map a cleaned name onto its canonical brand, if it has one.
pub fn canonicalize(name: &str) -> String {
    if let Some((_, canonical)) = KNOWN_VARIANTS.iter().find(|(variant, _)| *variant == name) {
        return canonical.to_string();
    }
    match brand_of(name) {
        Some(brand) => brand.to_string(),
        None => name.to_string(),
    }
}

/// Full normalization of one company name.
pub fn normalize_company_name(raw: &str) -> String {
    let name = strip_punctuation(raw);
    let name = title_case(&name);
    let name = strip_suffixes(&name);
    canonicalize(&name)
}
