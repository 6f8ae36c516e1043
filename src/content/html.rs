//! HTML structural extraction.
//!
//! The extractor only needs three capabilities from a parsed document: find
//! elements by tag name, read an attribute, read the text. [`HtmlTree`]
//! captures those; [`ScraperTree`] provides them with `scraper`.

use scraper::{Html, Selector};

/// Maximum number of links listed
pub const MAX_LINKS: usize = 20;

/// Lines shown when nothing could be extracted
pub const EMPTY_PAGE_PLACEHOLDER: [&str; 2] = [
    "No readable content could be extracted from this page.",
    "It may render its content with JavaScript or use anti-scraping protection.",
];

/// An element pulled out of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlNode {
    /// Lowercase tag name
    pub tag: String,
    attributes: Vec<(String, String)>,
    text: String,
}

impl HtmlNode {
    /// Build a node; `text` is whitespace-normalized here
    pub fn new(tag: &str, attributes: Vec<(String, String)>, text: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            attributes,
            text: normalize_whitespace(text),
        }
    }

    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All descendant text, whitespace collapsed
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Navigable document
pub trait HtmlTree {
    /// Elements whose tag is any of `tags`, in document order
    fn find_by_tag(&self, tags: &[&str]) -> Vec<HtmlNode>;
}

/// [`HtmlTree`] over a `scraper` document
pub struct ScraperTree {
    document: Html,
}

impl ScraperTree {
    /// Parse a full HTML document
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }
}

impl HtmlTree for ScraperTree {
    fn find_by_tag(&self, tags: &[&str]) -> Vec<HtmlNode> {
        let Ok(selector) = Selector::parse(&tags.join(", ")) else {
            return Vec::new();
        };

        self.document
            .select(&selector)
            .map(|element| {
                let attributes = element
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                HtmlNode::new(
                    element.value().name(),
                    attributes,
                    &element.text().collect::<String>(),
                )
            })
            .collect()
    }
}

/// Extract title, headings, paragraphs and links as display lines
pub fn extract(tree: &impl HtmlTree) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(title) = tree
        .find_by_tag(&["title"])
        .into_iter()
        .find(|node| !node.text().is_empty())
    {
        lines.push(format!("Title: {}", title.text()));
    }

    for heading in tree.find_by_tag(&["h1", "h2", "h3"]) {
        if heading.text().is_empty() {
            continue;
        }
        let level = match heading.tag.as_str() {
            "h1" => 1,
            "h2" => 2,
            _ => 3,
        };
        lines.push(format!("{} {}", "#".repeat(level), heading.text()));
    }

    lines.extend(
        tree.find_by_tag(&["p"])
            .into_iter()
            .filter(|p| !p.text().is_empty())
            .map(|p| p.text().to_string()),
    );

    let links = tree
        .find_by_tag(&["a"])
        .into_iter()
        .filter_map(|a| {
            let href = a.attribute("href")?.trim();
            if !href.starts_with("http") {
                return None;
            }
            Some(if a.text().is_empty() {
                href.to_string()
            } else {
                format!("{}: {}", a.text(), href)
            })
        })
        .take(MAX_LINKS);
    lines.extend(links);

    if lines.is_empty() {
        return EMPTY_PAGE_PLACEHOLDER.iter().map(|l| l.to_string()).collect();
    }

    lines
}

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
