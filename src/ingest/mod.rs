// src/ingest/mod.rs
pub mod finviz;
pub mod rate_limit;
pub mod types;
pub mod yahoo;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use rate_limit::RequestGate;
pub use types::{HeadlineRecord, HeadlineSource, PriceBar, PriceSource};

/// Normalize scraped headline text: decode entities, strip tags, ASCII quotes,
/// collapse whitespace, cap length.
///
/// Punctuation is kept; VADER reads `!` and `?` as intensity.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. nbsp)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}
