//! RSS 2.0 and Atom parsing into [`RawFeedItem`]s.
//!
//! Feeds are deserialized with `quick-xml`'s serde support. The root
//! element decides the dialect: `<rss>` is RSS 2.0, `<feed>` is Atom, and
//! anything else is a [`FeedError::Malformed`]. Checking the root first
//! matters because the serde deserializer ignores the root element's name,
//! so an HTML error page served with HTTP 200 would otherwise decode as an
//! Atom feed with zero entries and look like a healthy fetch.
//!
//! Real-world feeds are sloppy: bare `&` characters are scrubbed into
//! `&amp;` before parsing, and publish dates are accepted in RFC 2822 or
//! RFC 3339 form (anything else becomes `None`).

use super::FeedError;
use crate::models::RawFeedItem;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    // quick-xml strips namespace prefixes, so `<content:encoded>` and
    // `<media:content>` arrive under their local names.
    #[serde(rename = "encoded")]
    content_encoded: Option<String>,
    enclosure: Option<Enclosure>,
    #[serde(rename = "content", default)]
    media_content: Vec<MediaContent>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextValue>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextValue>,
    content: Option<TextValue>,
}

/// Atom text constructs carry a `type` attribute, so a plain `String`
/// target won't do; `$text` captures the element body either way.
#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Parse a feed payload into raw items, dispatching on the root element.
pub fn parse_feed(xml: &str) -> Result<Vec<RawFeedItem>, FeedError> {
    let cleaned = scrub_bare_ampersands(xml);

    match root_element(&cleaned).as_deref() {
        Some("rss") => quick_xml::de::from_str::<Rss>(&cleaned)
            .map(|rss| rss.channel.items.into_iter().map(rss_item).collect())
            .map_err(|e| FeedError::Malformed(e.to_string())),
        Some("feed") => quick_xml::de::from_str::<AtomFeed>(&cleaned)
            .map(|feed| feed.entries.into_iter().map(atom_entry).collect())
            .map_err(|e| FeedError::Malformed(e.to_string())),
        Some(other) => Err(FeedError::Malformed(format!(
            "root element <{other}> is not a feed"
        ))),
        None => Err(FeedError::Malformed("no root element found".to_string())),
    }
}

/// Local name of the document's root element, if any.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

fn rss_item(item: RssItem) -> RawFeedItem {
    let mut media = Vec::new();
    if let Some(enc) = item.enclosure {
        let is_image = enc
            .mime
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or(true);
        if is_image {
            if let Some(url) = enc.url {
                media.push(url);
            }
        }
    }
    for mc in item.media_content {
        if let Some(url) = mc.url {
            media.push(url);
        }
    }

    RawFeedItem {
        title: item.title.unwrap_or_default().trim().to_string(),
        link: item.link.unwrap_or_default().trim().to_string(),
        published_at: item.pub_date.as_deref().and_then(parse_date),
        content: item
            .content_encoded
            .or(item.description)
            .unwrap_or_default(),
        media,
    }
}

fn atom_entry(entry: AtomEntry) -> RawFeedItem {
    // Prefer the rel="alternate" link, falling back to the first one.
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), Some("alternate") | None))
        .or(entry.links.first())
        .and_then(|l| l.href.clone())
        .unwrap_or_default();

    let text = |tv: Option<TextValue>| tv.and_then(|t| t.value).unwrap_or_default();

    RawFeedItem {
        title: text(entry.title).trim().to_string(),
        link: link.trim().to_string(),
        published_at: entry
            .published
            .or(entry.updated)
            .as_deref()
            .and_then(parse_date),
        content: {
            let content = text(entry.content);
            if content.is_empty() {
                text(entry.summary)
            } else {
                content
            }
        },
        media: Vec::new(),
    }
}

/// Parse a feed timestamp; RFC 2822 (RSS) then RFC 3339 (Atom).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Replace bare `&` characters with `&amp;` so sloppy feeds still parse.
///
/// A `&` already starting an entity reference (`&amp;`, `&#39;`, ...) is
/// left untouched.
fn scrub_bare_ampersands(xml: &str) -> String {
    let bytes = xml.as_bytes();
    let mut out = String::with_capacity(xml.len());
    for (i, ch) in xml.char_indices() {
        if ch != '&' {
            out.push(ch);
            continue;
        }
        // Look ahead for `name;` or `#digits;` within a short window.
        let window = &bytes[i + 1..bytes.len().min(i + 11)];
        let is_entity = window
            .iter()
            .position(|&b| b == b';')
            .map(|semi| {
                semi > 0
                    && window[..semi]
                        .iter()
                        .all(|&b| b.is_ascii_alphanumeric() || b == b'#')
            })
            .unwrap_or(false);
        if is_entity {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
    }
    out
}
