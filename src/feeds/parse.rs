//! RSS and Atom parsing.
//!
//! A streaming `quick-xml` pass collects the direct children of every
//! `<item>` (RSS 0.9x/1.0/2.0) or `<entry>` (Atom) element. Field selection
//! then follows the usual fallbacks:
//!
//! | Field | Sources, in order |
//! |-------|-------------------|
//! | title | `title` |
//! | link | `<link rel="alternate" href>`, `<link>` text, any `<link href>`, `guid`, http(s) `id` |
//! | date | `pubDate`, `dc:date`, `date`, `published`, `updated` |
//! | description | `description`, `content:encoded`, `summary`, `content` |
//!
//! Entries with neither a title nor a link are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use scraper::Html;
use std::collections::HashMap;
use tracing::warn;

use crate::error::FeedError;
use crate::feeds::Feed;
use crate::models::Article;
use crate::utils::{collapse_whitespace, truncate_chars};

/// Maximum characters of description kept per article.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// One entry as found in a feed, before it is attributed to a source.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub description: String,
}

impl FeedItem {
    pub fn into_article(self, feed: &Feed) -> Article {
        Article {
            title: self.title,
            link: self.link,
            published: self.published,
            description: self.description,
            source_name: feed.name.clone(),
            source_url: feed.homepage(),
        }
    }
}

#[derive(Debug, Default)]
struct RawEntry {
    /// Text of each direct child, keyed by lowercased qualified name.
    fields: HashMap<String, String>,
    /// `(rel, href)` of each `<link href>` child.
    links: Vec<(Option<String>, String)>,
}

impl RawEntry {
    fn field(&self, keys: &[&str]) -> &str {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    fn link(&self) -> String {
        let alternate = self
            .links
            .iter()
            .find(|(rel, _)| rel.as_deref().is_none_or(|r| r == "alternate"))
            .map(|(_, href)| href.as_str());
        let any_href = self.links.first().map(|(_, href)| href.as_str());
        let id = Some(self.field(&["id"])).filter(|id| id.starts_with("http"));

        alternate
            .or_else(|| Some(self.field(&["link"])).filter(|l| !l.is_empty()))
            .or(any_href)
            .or_else(|| Some(self.field(&["guid"])).filter(|g| !g.is_empty()))
            .or(id)
            .unwrap_or("")
            .trim()
            .to_string()
    }

    fn into_item(self) -> Option<FeedItem> {
        let title = strip_html(self.field(&["title"]));
        let link = self.link();
        if title.is_empty() && link.is_empty() {
            return None;
        }
        let published = parse_date(self.field(&["pubdate", "dc:date", "date", "published", "updated"]));
        let description = strip_html(self.field(&["description", "content:encoded", "summary", "content"]));
        let description = truncate_chars(&description, MAX_DESCRIPTION_CHARS).to_string();
        Some(FeedItem {
            title,
            link,
            published,
            description,
        })
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

fn is_entry_element(e: &BytesStart<'_>) -> bool {
    matches!(e.local_name().as_ref(), b"item" | b"entry")
}

fn link_attrs(e: &BytesStart<'_>) -> Option<(Option<String>, String)> {
    if e.local_name().as_ref() != b"link" {
        return None;
    }
    let mut rel = None;
    let mut href = None;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        let value = unescape_lenient(&value);
        match attr.key.as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    href.map(|h| (rel, h))
}

fn unescape_lenient(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Resolve an entity reference name such as `amp` or `#8217`.
fn resolve_entity(name: &str) -> String {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => name.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };
    resolved.map_or_else(|| format!("&{name};"), String::from)
}

/// Extract every entry from an RSS or Atom document.
///
/// Malformed XML after at least one complete entry keeps what was parsed so
/// far; malformed XML before any entry is an error.
pub fn parse_items(xml: &str) -> Result<Vec<FeedItem>, FeedError> {
    let mut reader = Reader::from_str(xml);

    let mut items = Vec::new();
    // Qualified names of the currently open elements.
    let mut path: Vec<String> = Vec::new();
    // Depth in `path` at which the current item/entry was opened.
    let mut entry_depth: Option<usize> = None;
    let mut current = RawEntry::default();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if items.is_empty() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, parsed = items.len(), "Feed XML malformed; keeping entries parsed so far");
                break;
            }
        };

        // The direct child of the open entry that text currently belongs to.
        let field_key = entry_depth.and_then(|d| path.get(d + 1)).cloned();

        match event {
            Event::Start(e) => {
                match entry_depth {
                    None if is_entry_element(&e) => {
                        entry_depth = Some(path.len());
                        current = RawEntry::default();
                    }
                    Some(d) if path.len() == d + 1 => {
                        if let Some(link) = link_attrs(&e) {
                            current.links.push(link);
                        }
                    }
                    Some(_) => {
                        // Nested markup inside a field (e.g. XHTML content).
                        if let Some(key) = &field_key {
                            current.fields.entry(key.clone()).or_default().push(' ');
                        }
                    }
                    None => {}
                }
                path.push(qualified_name(&e));
            }
            Event::Empty(e) => {
                if let Some(d) = entry_depth {
                    if path.len() == d + 1 {
                        if let Some(link) = link_attrs(&e) {
                            current.links.push(link);
                        }
                    }
                }
            }
            Event::End(_) => {
                path.pop();
                if entry_depth == Some(path.len()) {
                    entry_depth = None;
                    if let Some(item) = std::mem::take(&mut current).into_item() {
                        items.push(item);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(key) = field_key {
                    let text = unescape_lenient(&String::from_utf8_lossy(&t));
                    current.fields.entry(key).or_default().push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(key) = field_key {
                    current
                        .fields
                        .entry(key)
                        .or_default()
                        .push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(key) = field_key {
                    let name = String::from_utf8_lossy(&r);
                    current.fields.entry(key).or_default().push_str(&resolve_entity(&name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

/// Reduce an HTML fragment to collapsed plain text.
pub fn strip_html(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Parse a feed timestamp.
///
/// Accepts RFC 2822, RFC 3339, and a few common zone-less layouts, which
/// are read as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(d.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(d.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com</link>
    <item>
      <title>Tom &amp; Jerry &#8217;s guide</title>
      <link>https://blog.example.com/tom-jerry</link>
      <pubDate>Mon, 05 May 2025 10:30:00 GMT</pubDate>
      <description><![CDATA[<p>Hello <b>world</b></p><p>Second paragraph</p>]]></description>
    </item>
    <item>
      <title>Escaped markup</title>
      <guid>https://blog.example.com/p/2</guid>
      <dc:date>2025-05-04T08:00:00Z</dc:date>
      <description>&lt;p&gt;Encoded &lt;em&gt;html&lt;/em&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <description>no title, no link</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Blog</title>
  <link href="https://atom.example.com/" rel="alternate"/>
  <entry>
    <title type="html">Rust &lt;3 Atom</title>
    <link href="https://atom.example.com/feed.xml" rel="self"/>
    <link href="https://atom.example.com/rust-atom" rel="alternate"/>
    <id>tag:atom.example.com,2025:1</id>
    <published>2025-05-06T09:15:00+02:00</published>
    <updated>2025-05-07T00:00:00Z</updated>
    <summary>Short summary</summary>
    <content type="html">Long content</content>
  </entry>
  <entry>
    <title>XHTML body</title>
    <link href="https://atom.example.com/xhtml"/>
    <updated>2025-05-01T00:00:00Z</updated>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>One</p><p>Two</p></div></content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_items(RSS).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Tom & Jerry ’s guide");
        assert_eq!(items[0].link, "https://blog.example.com/tom-jerry");
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2025, 5, 5, 10, 30, 0).unwrap())
        );
        assert_eq!(items[0].description, "Hello world Second paragraph");

        assert_eq!(items[1].link, "https://blog.example.com/p/2");
        assert_eq!(items[1].description, "Encoded html");
        assert_eq!(
            items[1].published,
            Some(Utc.with_ymd_and_hms(2025, 5, 4, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_atom_entries() {
        let items = parse_items(ATOM).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Rust <3 Atom");
        assert_eq!(items[0].link, "https://atom.example.com/rust-atom");
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 7, 15, 0).unwrap())
        );
        assert_eq!(items[0].description, "Short summary");

        assert_eq!(items[1].link, "https://atom.example.com/xhtml");
        assert_eq!(items[1].description, "One Two");
    }

    #[test]
    fn test_description_is_capped() {
        let long = "x".repeat(2_000);
        let xml = format!(
            "<rss><channel><item><title>t</title><description>{long}</description></item></channel></rss>"
        );
        let items = parse_items(&xml).unwrap();
        assert_eq!(items[0].description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_channel_link_is_not_an_item() {
        let xml = "<rss><channel><link>https://x.example</link></channel></rss>";
        assert!(parse_items(xml).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_items("<rss><channel><item><title>t</wrong></item>").is_err());
    }

    #[test]
    fn test_into_article_attributes_source() {
        let feed = Feed {
            name: "example".to_string(),
            xml_url: "https://blog.example.com/rss".to_string(),
            html_url: String::new(),
        };
        let article = parse_items(RSS).unwrap().remove(0).into_article(&feed);
        assert_eq!(article.source_name, "example");
        assert_eq!(article.source_url, "https://blog.example.com");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), "&");
        assert_eq!(resolve_entity("#x2014"), "—");
        assert_eq!(resolve_entity("#38"), "&");
        assert_eq!(resolve_entity("hellip"), "&hellip;");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("Mon, 01 Jan 2024 00:00:00 GMT"), Some(expected));
        assert_eq!(parse_date("Mon, 01 Jan 2024 01:00:00 +0100"), Some(expected));
        assert_eq!(parse_date("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_date("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_date("2024-01-01"), Some(expected));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday-ish"), None);
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("plain   text\n"), "plain text");
        assert_eq!(strip_html("<p>a &amp; b</p>"), "a & b");
    }
}
