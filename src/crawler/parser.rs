//! HTML text extraction
//!
//! Two strategies are provided:
//! - `extract_main_content`: paragraph-level text from the page's main content
//!   region (`<article>`, `<main>`, `[role=main]`, falling back to `<body>`)
//! - `remove_boilerplate`: classifies every text block of the page by length,
//!   link density and stopword density, and keeps the ones that read like prose

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Block-level elements whose text forms one paragraph
const BLOCK_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li, blockquote, pre, dd, dt, td, figcaption";

/// Containers whose text is never content
const EXCLUDED_CONTAINERS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "button", "select",
    "template", "svg",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "dd", "dt", "td",
    "figcaption",
];

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const MAIN_REGION_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]"];

// Boilerplate classification thresholds
const LENGTH_LOW: usize = 70;
const LENGTH_HIGH: usize = 200;
const STOPWORDS_LOW: f64 = 0.30;
const STOPWORDS_HIGH: f64 = 0.32;
const MAX_LINK_DENSITY: f64 = 0.2;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "said", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "yourself", "yourselves",
];

/// A paragraph of text found in the page
#[derive(Debug, Clone)]
struct TextBlock {
    text: String,
    link_chars: usize,
    heading: bool,
}

impl TextBlock {
    fn link_density(&self) -> f64 {
        let chars = self.text.chars().count();
        if chars == 0 {
            return 0.0;
        }
        self.link_chars as f64 / chars as f64
    }

    fn stopword_density(&self, stopwords: &HashSet<&str>) -> f64 {
        let words: Vec<String> = self
            .text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return 0.0;
        }
        let hits = words
            .iter()
            .filter(|w| stopwords.contains(w.as_str()))
            .count();
        hits as f64 / words.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockClass {
    Good,
    NearGood,
    Short,
    Bad,
}

/// Extracts the main textual content of a page
///
/// Paragraphs are returned one per line, duplicates removed.
///
/// # Returns
///
/// * `Some(String)` - The extracted paragraphs joined by `\n`
/// * `None` - No paragraph text was found
///
/// # Example
///
/// ```
/// use evidence_crawler::crawler::extract_main_content;
///
/// let html = r#"<html><body><nav><p>Menu</p></nav>
///     <article><h1>Title</h1><p>First paragraph.</p><p>Second one.</p></article>
///     </body></html>"#;
/// let text = extract_main_content(html).unwrap();
/// assert_eq!(text, "Title\nFirst paragraph.\nSecond one.");
/// ```
pub fn extract_main_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let root = main_region(&document)?;

    let mut seen = HashSet::new();
    let paragraphs: Vec<String> = collect_blocks(root)
        .into_iter()
        .map(|block| block.text)
        .filter(|text| seen.insert(text.clone()))
        .collect();

    join_paragraphs(paragraphs)
}

/// Removes boilerplate and returns the remaining prose paragraphs
///
/// Blocks are first classified on their own:
/// - link density above 0.2 → bad
/// - shorter than 70 characters → short
/// - stopword density of 0.32 or more → good past 200 characters, near-good below
/// - stopword density between 0.30 and 0.32 → near-good
/// - anything else → bad
///
/// Near-good blocks and headings are then kept when a neighbouring block is
/// good, and short blocks only when both neighbours are good.
pub fn remove_boilerplate(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").ok()?;
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let stopwords: HashSet<&str> = ENGLISH_STOPWORDS.iter().copied().collect();
    let blocks = collect_blocks(root);
    let classes: Vec<BlockClass> = blocks
        .iter()
        .map(|block| classify(block, &stopwords))
        .collect();

    let is_good = |index: Option<usize>| {
        index
            .and_then(|i| classes.get(i))
            .is_some_and(|class| *class == BlockClass::Good)
    };

    let kept = blocks.iter().enumerate().filter_map(|(i, block)| {
        let prev_good = is_good(i.checked_sub(1));
        let next_good = is_good(Some(i + 1));
        let keep = match classes[i] {
            BlockClass::Good => true,
            BlockClass::Bad => false,
            _ if block.heading => prev_good || next_good,
            BlockClass::NearGood => prev_good || next_good,
            BlockClass::Short => prev_good && next_good,
        };
        keep.then(|| block.text.clone())
    });

    join_paragraphs(kept.collect())
}

fn classify(block: &TextBlock, stopwords: &HashSet<&str>) -> BlockClass {
    if block.link_density() > MAX_LINK_DENSITY {
        return BlockClass::Bad;
    }

    let chars = block.text.chars().count();
    if chars < LENGTH_LOW {
        return BlockClass::Short;
    }

    let density = block.stopword_density(stopwords);
    if density >= STOPWORDS_HIGH {
        if chars > LENGTH_HIGH {
            BlockClass::Good
        } else {
            BlockClass::NearGood
        }
    } else if density >= STOPWORDS_LOW {
        BlockClass::NearGood
    } else {
        BlockClass::Bad
    }
}

/// Picks the largest main-content region, or the body
fn main_region(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(usize, ElementRef<'_>)> = None;

    for raw in MAIN_REGION_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in document.select(&selector) {
            let size = element.text().map(str::len).sum::<usize>();
            if best.as_ref().map_or(true, |(best_size, _)| size > *best_size) {
                best = Some((size, element));
            }
        }
    }

    if let Some((_, element)) = best {
        return Some(element);
    }

    let body = Selector::parse("body").ok()?;
    document.select(&body).next()
}

/// Collects text blocks under `root`, skipping excluded containers and blocks
/// nested inside another block
fn collect_blocks(root: ElementRef<'_>) -> Vec<TextBlock> {
    let (Ok(block_selector), Ok(link_selector)) =
        (Selector::parse(BLOCK_SELECTOR), Selector::parse("a"))
    else {
        return Vec::new();
    };

    root.select(&block_selector)
        .filter(|element| !has_ancestor(element, root, EXCLUDED_CONTAINERS))
        .filter(|element| !has_ancestor(element, root, BLOCK_TAGS))
        .filter_map(|element| {
            let text = normalize_whitespace(element.text());
            if text.is_empty() {
                return None;
            }
            let link_chars = element
                .select(&link_selector)
                .map(|link| normalize_whitespace(link.text()).chars().count())
                .sum();
            Some(TextBlock {
                text,
                link_chars,
                heading: HEADING_TAGS.contains(&element.value().name()),
            })
        })
        .collect()
}

/// Checks whether any ancestor of `element`, below `root`, is one of `tags`
fn has_ancestor(element: &ElementRef<'_>, root: ElementRef<'_>, tags: &[&str]) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == root.id() {
            return false;
        }
        if let Some(ancestor) = ancestor.value().as_element() {
            if tags.contains(&ancestor.name()) {
                return true;
            }
        }
    }
    false
}

fn normalize_whitespace<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in pieces.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn join_paragraphs(paragraphs: Vec<String>) -> Option<String> {
    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROSE: &str = "The minister said that the new policy would be introduced in the spring, \
        and that it was expected to reduce the number of people who are waiting for a decision \
        on their application by the end of the year.";

    #[test]
    fn test_extract_prefers_article() {
        let html = format!(
            r#"<html><body>
            <header><p>Site header</p></header>
            <div><p>Sidebar teaser</p></div>
            <article><h1>Headline</h1><p>{PROSE}</p><p>Closing line.</p></article>
            <footer><p>Copyright</p></footer>
            </body></html>"#
        );
        let text = extract_main_content(&html).unwrap();
        assert_eq!(text, format!("Headline\n{PROSE}\nClosing line."));
    }

    #[test]
    fn test_extract_falls_back_to_body() {
        let html = "<html><body><nav><p>Home</p></nav><p>One.</p><ul><li>Two <p>inner</p></li></ul></body></html>";
        let text = extract_main_content(html).unwrap();
        assert_eq!(text, "One.\nTwo inner");
    }

    #[test]
    fn test_extract_deduplicates() {
        let html = "<html><body><main><p>Same.</p><p>Same.</p><p>Other.</p></main></body></html>";
        assert_eq!(extract_main_content(html).unwrap(), "Same.\nOther.");
    }

    #[test]
    fn test_extract_without_paragraphs() {
        let html = "<html><body><div>Just a div</div><script>var x = 1;</script></body></html>";
        assert_eq!(extract_main_content(html), None);
    }

    #[test]
    fn test_extract_ignores_scripts_inside_article() {
        let html = "<html><body><article><p>Text.</p><noscript><p>Enable JS</p></noscript></article></body></html>";
        assert_eq!(extract_main_content(html).unwrap(), "Text.");
    }

    #[test]
    fn test_boilerplate_keeps_prose_and_drops_link_lists() {
        let html = format!(
            r#"<html><body>
            <ul><li><a href="/a">Home</a></li><li><a href="/b">World news and more</a></li></ul>
            <h2>Policy change</h2>
            <p>{PROSE}</p>
            <p><a href="/x">Read more about this and other stories on our website today</a></p>
            <p>Share</p>
            </body></html>"#
        );
        let text = remove_boilerplate(&html).unwrap();
        assert_eq!(text, format!("Policy change\n{PROSE}"));
    }

    #[test]
    fn test_boilerplate_short_block_between_good_blocks() {
        let html = format!("<html><body><p>{PROSE}</p><p>Yes.</p><p>{PROSE}</p></body></html>");
        let text = remove_boilerplate(&html).unwrap();
        assert_eq!(text, format!("{PROSE}\nYes.\n{PROSE}"));
    }

    #[test]
    fn test_boilerplate_nothing_kept() {
        let html = "<html><body><p>Login</p><p><a href='/'>Home</a></p></body></html>";
        assert_eq!(remove_boilerplate(html), None);
    }

    #[test]
    fn test_link_density() {
        let block = TextBlock {
            text: "abcdefghij".to_string(),
            link_chars: 5,
            heading: false,
        };
        assert!((block.link_density() - 0.5).abs() < f64::EPSILON);
    }
}
