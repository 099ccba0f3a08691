//! Publish date guessing
//!
//! Candidates are gathered from the most to the least trustworthy source and
//! the first one that normalizes to a plausible calendar date wins.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Pages published before this year are treated as misparsed
const MIN_YEAR: i32 = 1995;

/// `name`/`property` values of meta tags carrying a publish date
const DATE_META_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "datepublished",
    "pubdate",
    "publish-date",
    "publishdate",
    "date",
    "dc.date",
    "dc.date.issued",
    "dcterms.created",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

fn json_ld_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""datePublished"\s*:\s*"([^"]+)""#).expect("valid JSON-LD date pattern")
    })
}

fn url_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/((?:19|20)\d{2})/([01]?\d)/([0-3]?\d)(?:/|$)").expect("valid URL date pattern")
    })
}

fn text_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b((?:19|20)\d{2})-([01]\d)-([0-3]\d)\b").expect("valid ISO date pattern")
    })
}

/// Guesses the publish date of a page, as `YYYY-MM-DD`
///
/// Returns `None` when no plausible date is found. Dates in the future are
/// rejected relative to the local calendar day.
pub fn find_date(html: &str) -> Option<String> {
    find_date_at(html, Local::now().date_naive())
}

/// Same as [`find_date`], with an explicit notion of "today"
pub fn find_date_at(html: &str, today: NaiveDate) -> Option<String> {
    let document = Html::parse_document(html);
    let accept = |raw: &str| normalize_date(raw).filter(|date| is_plausible(*date, today));

    markup_candidates(&document)
        .iter()
        .find_map(|raw| accept(raw.as_str()))
        .or_else(|| {
            json_ld_regex()
                .captures_iter(html)
                .find_map(|caps| accept(&caps[1]))
        })
        .or_else(|| {
            canonical_urls(&document)
                .iter()
                .find_map(|url| date_from_url(url).filter(|d| is_plausible(*d, today)))
        })
        .or_else(|| {
            let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
            text_date_regex()
                .captures_iter(&text)
                .find_map(|caps| {
                    ymd(&caps[1], &caps[2], &caps[3]).filter(|d| is_plausible(*d, today))
                })
        })
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Normalizes a date string in one of the common web formats
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    // Offsets without a colon, e.g. 2021-03-14T10:00:00+0000
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

fn is_plausible(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() >= MIN_YEAR && date <= today
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = url_date_regex().captures(url)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

/// Date strings from meta tags, microdata and `<time>` elements, in priority order
fn markup_candidates(document: &Html) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Ok(selector) = Selector::parse("meta[content]") {
        let metas: Vec<(String, String)> = document
            .select(&selector)
            .filter_map(|meta| {
                let value = meta.value();
                let key = value
                    .attr("property")
                    .or_else(|| value.attr("name"))
                    .or_else(|| value.attr("itemprop"))?;
                Some((key.to_ascii_lowercase(), value.attr("content")?.to_string()))
            })
            .collect();

        for wanted in DATE_META_KEYS {
            candidates.extend(
                metas
                    .iter()
                    .filter(|(key, _)| key == wanted)
                    .map(|(_, content)| content.clone()),
            );
        }
    }

    if let Ok(selector) = Selector::parse(r#"[itemprop="datePublished"]"#) {
        for element in document.select(&selector) {
            let value = element.value();
            if let Some(raw) = value.attr("datetime").or_else(|| value.attr("content")) {
                candidates.push(raw.to_string());
            } else {
                candidates.push(element.text().collect::<String>());
            }
        }
    }

    if let Ok(selector) = Selector::parse("time[datetime]") {
        candidates.extend(
            document
                .select(&selector)
                .filter_map(|time| time.value().attr("datetime"))
                .map(str::to_string),
        );
    }

    candidates
}

fn canonical_urls(document: &Html) -> Vec<String> {
    let mut urls = Vec::new();

    if let Ok(selector) = Selector::parse(r#"link[rel="canonical"][href]"#) {
        urls.extend(
            document
                .select(&selector)
                .filter_map(|link| link.value().attr("href"))
                .map(str::to_string),
        );
    }

    if let Ok(selector) = Selector::parse(r#"meta[property="og:url"][content]"#) {
        urls.extend(
            document
                .select(&selector)
                .filter_map(|meta| meta.value().attr("content"))
                .map(str::to_string),
        );
    }

    urls
}
