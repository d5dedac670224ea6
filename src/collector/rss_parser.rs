use crate::errors::{AppError, AppResult};
use crate::models::{FeedKind, RawItem, Source};
use crate::utils::cached_regex;
use chrono::{Datelike, Duration, NaiveDate};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use scraper::{Html, Node};
use std::io::Cursor;
use std::sync::OnceLock;
use tracing::warn;

static PUBLISHED_IN_SUMMARY: OnceLock<Regex> = OnceLock::new();

const PUBLISHED_IN_SUMMARY_PATTERN: &str = r"Published Date:\s*(\d{1,2}/\d{1,2}/\d{4})";
/// Elements whose content renders on lines of its own.
const BLOCK_TAGS: [&str; 4] = ["p", "div", "tr", "li"];

/// GeBIZ sometimes stamps dates a year ahead; anything further out than this is
/// moved back one year.
const FUTURE_DATE_TOLERANCE_DAYS: i64 = 180;

/// Element of an item whose text is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Link,
    Description,
    Summary,
    Content,
    Published,
    Updated,
    PubDate,
    Date,
}

impl ItemField {
    /// Maps a local element name (namespace prefix already removed).
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"summary" => Some(Self::Summary),
            b"content" | b"encoded" => Some(Self::Content),
            b"published" => Some(Self::Published),
            b"updated" => Some(Self::Updated),
            b"pubDate" => Some(Self::PubDate),
            b"date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Collects the fields of one `<item>` or `<entry>` while reading events.
#[derive(Default)]
struct ItemBuilder {
    title: String,
    link: String,
    description: String,
    summary: String,
    content: String,
    published: String,
    updated: String,
    pub_date: String,
    date: String,
    current_field: Option<ItemField>,
}

impl ItemBuilder {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot(&mut self, field: ItemField) -> &mut String {
        match field {
            ItemField::Title => &mut self.title,
            ItemField::Link => &mut self.link,
            ItemField::Description => &mut self.description,
            ItemField::Summary => &mut self.summary,
            ItemField::Content => &mut self.content,
            ItemField::Published => &mut self.published,
            ItemField::Updated => &mut self.updated,
            ItemField::PubDate => &mut self.pub_date,
            ItemField::Date => &mut self.date,
        }
    }

    /// Starts collecting a field. The first occurrence of a field wins.
    fn start_field(&mut self, field: ItemField) {
        if self.slot(field).trim().is_empty() {
            self.slot(field).clear();
            self.current_field = Some(field);
        } else {
            self.current_field = None;
        }
    }

    fn end_field(&mut self, field: ItemField) {
        if self.current_field == Some(field) {
            self.current_field = None;
        }
    }

    fn append_text(&mut self, text: &str) {
        if let Some(field) = self.current_field {
            self.slot(field).push_str(text);
        }
    }

    /// Takes the `href` of an Atom `<link>`, preferring `rel="alternate"`.
    fn set_link_from_attributes(&mut self, e: &BytesStart) {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().filter_map(|a| a.ok()) {
            match attr.key.local_name().as_ref() {
                b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                b"rel" => rel = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                _ => {}
            }
        }
        if let Some(href) = href {
            let is_alternate = rel.as_deref().map_or(true, |r| r == "alternate");
            if self.link.trim().is_empty() || (is_alternate && rel.is_some()) {
                self.link = href;
            }
        }
    }

    fn build(&mut self, feed_url: &str, is_award: bool, today: NaiveDate) -> Option<RawItem> {
        let title = self.title.trim().to_string();
        let summary = first_non_empty(&[&self.description, &self.summary, &self.content])
            .map(html_to_text)
            .unwrap_or_default();
        let link = self.link.trim().to_string();
        if title.is_empty() && summary.is_empty() && link.is_empty() {
            return None;
        }

        let published = first_non_empty(&[&self.published, &self.updated, &self.pub_date, &self.date])
            .map(|s| s.trim().to_string())
            .or_else(|| published_from_summary(&summary, today))
            .unwrap_or_default();

        Some(RawItem {
            source: Source::GebizRss,
            title,
            link,
            summary,
            published,
            feed_url: feed_url.to_string(),
            is_award,
            ..Default::default()
        })
    }
}

fn first_non_empty<'a>(values: &[&'a String]) -> Option<&'a str> {
    values
        .iter()
        .map(|v| v.as_str())
        .find(|v| !v.trim().is_empty())
}

/// Reads the GeBIZ `Published Date: DD/MM/YYYY` line from a summary.
///
/// Returns `YYYY-MM-DD HH:MM:SS`, moving dates more than 180 days ahead of `today`
/// back one year.
pub fn published_from_summary(summary: &str, today: NaiveDate) -> Option<String> {
    let re = cached_regex(&PUBLISHED_IN_SUMMARY, PUBLISHED_IN_SUMMARY_PATTERN);
    let raw = re.captures(summary)?.get(1)?.as_str();
    let Ok(mut date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") else {
        return Some(raw.to_string());
    };
    if date > today + Duration::days(FUTURE_DATE_TOLERANCE_DAYS) {
        date = date.with_year(date.year() - 1).unwrap_or(date);
    }
    Some(date.format("%Y-%m-%d 00:00:00").to_string())
}

/// Flattens HTML found in feed descriptions into plain text lines.
///
/// Entities are decoded once, so escaped markup in the source stays escaped.
/// Each `<br>` and each change of enclosing block element starts a new line.
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.trim().to_string();
    }
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    let mut current_block = None;

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Element(element) if element.name() == "br" => text.push('\n'),
            Node::Text(chunk) => {
                let block = node
                    .ancestors()
                    .find(|ancestor| {
                        ancestor
                            .value()
                            .as_element()
                            .is_some_and(|element| BLOCK_TAGS.contains(&element.name()))
                    })
                    .map(|ancestor| ancestor.id());
                if block != current_block {
                    text.push('\n');
                    current_block = block;
                }
                text.push_str(chunk);
            }
            _ => {}
        }
    }

    text.replace('\u{a0}', " ")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses an RSS 2.0 or Atom document into raw items.
///
/// `feed_url` is recorded on each item and decides whether the items are awards.
/// A document that breaks off after some items yields those items and a warning.
pub fn parse_feed(content: &[u8], feed_url: &str, today: NaiveDate) -> AppResult<Vec<RawItem>> {
    let mut reader = Reader::from_reader(Cursor::new(content));
    let is_award = FeedKind::from_url(feed_url) == FeedKind::Award;

    let mut buf = Vec::with_capacity(8192);
    let mut result = Vec::new();
    let mut inside_item = false;
    let mut builder = ItemBuilder::default();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) if result.is_empty() => return Err(e.into()),
            Err(e) => {
                warn!(feed_url = feed_url, items = result.len(), error = %e, "Feed is truncated or malformed");
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"item" | b"entry" => {
                        inside_item = true;
                        builder.reset();
                    }
                    name if inside_item => {
                        if let Some(field) = ItemField::from_local_name(name) {
                            if field == ItemField::Link {
                                builder.set_link_from_attributes(&e);
                            }
                            builder.start_field(field);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) if inside_item => {
                if e.local_name().as_ref() == b"link" {
                    builder.set_link_from_attributes(&e);
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"item" | b"entry" => {
                        inside_item = false;
                        if let Some(item) = builder.build(feed_url, is_award, today) {
                            result.push(item);
                        }
                        builder.reset();
                    }
                    name if inside_item => {
                        if let Some(field) = ItemField::from_local_name(name) {
                            builder.end_field(field);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) if inside_item => {
                let text = e
                    .decode()
                    .map_err(|e| AppError::ParseError(format!("Failed to decode XML text: {e}")))?;
                builder.append_text(&text);
            }
            Event::CData(e) if inside_item => {
                builder.append_text(&String::from_utf8_lossy(&e));
            }
            Event::GeneralRef(e) if inside_item => {
                let resolved = match e
                    .resolve_char_ref()
                    .map_err(|e| AppError::ParseError(format!("Bad character reference: {e}")))?
                {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = e
                            .decode()
                            .map_err(|e| AppError::ParseError(format!("Failed to decode entity: {e}")))?;
                        match resolve_predefined_entity(&name) {
                            Some(value) => value.to_string(),
                            None if name == "nbsp" => " ".to_string(),
                            None => format!("&{name};"),
                        }
                    }
                };
                builder.append_text(&resolved);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}
