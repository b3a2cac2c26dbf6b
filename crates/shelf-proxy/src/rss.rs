//! Goodreads `list_rss` documents to [`BookRecord`]s.

use quick_xml::Reader;
use quick_xml::events::Event;
use shelf_model::{BookRecord, normalize_timestamp};
use thiserror::Error;

/// Marker Goodreads uses in the URL of its stock "no cover" artwork.
const PLACEHOLDER_MARKER: &str = "nophoto";

#[derive(Debug, Error)]
pub enum RssError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("text decode error: {0}")]
    Text(String),
    #[error("document has no <channel> element")]
    MissingChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<BookRecord>,
}

#[derive(Debug, Default)]
struct ItemFields {
    book_id: String,
    guid: String,
    title: String,
    author_name: String,
    large_image: String,
    medium_image: String,
    image: String,
    read_at: String,
    date_added: String,
}

impl ItemFields {
    fn append(&mut self, tag: &str, value: &str) {
        let slot = match tag {
            "book_id" => &mut self.book_id,
            "guid" => &mut self.guid,
            "title" => &mut self.title,
            "author_name" => &mut self.author_name,
            "book_large_image_url" => &mut self.large_image,
            "book_medium_image_url" => &mut self.medium_image,
            "book_image_url" => &mut self.image,
            "user_read_at" => &mut self.read_at,
            "user_date_added" => &mut self.date_added,
            _ => return,
        };
        slot.push_str(value);
    }

    fn into_record(self) -> Option<BookRecord> {
        let id = [self.book_id.trim(), self.guid.trim()]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
            .unwrap_or_default()
            .to_string();
        let title = self.title.trim().to_string();
        if id.is_empty() && title.is_empty() {
            return None;
        }
        let image_url = [&self.large_image, &self.medium_image, &self.image]
            .into_iter()
            .map(|url| url.trim())
            .find(|url| !url.is_empty() && !url.contains(PLACEHOLDER_MARKER))
            .map(str::to_string);
        Some(BookRecord {
            id,
            title,
            author: self.author_name.trim().to_string(),
            image_url,
            read_at: normalize_timestamp(&self.read_at),
            date_added: normalize_timestamp(&self.date_added),
        })
    }
}

pub fn parse_feed(xml: &str) -> Result<ParsedFeed, RssError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut saw_channel = false;
    let mut current: Option<ItemFields> = None;
    let mut feed = ParsedFeed::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "channel" => saw_channel = true,
                    "item" => current = Some(ItemFields::default()),
                    _ => {}
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("item") {
                    if let Some(book) = current.take().and_then(ItemFields::into_record) {
                        feed.items.push(book);
                    }
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|err| RssError::Text(err.to_string()))?;
                append_text(&mut feed, current.as_mut(), &path, &value);
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data);
                append_text(&mut feed, current.as_mut(), &path, &value);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_channel {
        return Err(RssError::MissingChannel);
    }
    Ok(feed)
}

fn append_text(feed: &mut ParsedFeed, item: Option<&mut ItemFields>, path: &[String], value: &str) {
    let [.., parent, tag] = path else {
        return;
    };
    match item {
        Some(fields) if parent == "item" => fields.append(tag, value),
        Some(_) => {}
        None if parent == "channel" && tag == "title" => feed.title.push_str(value),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Ada's bookshelf: read</title>
    <item>
      <guid><![CDATA[https://www.goodreads.com/review/show/1]]></guid>
      <title><![CDATA[Dune]]></title>
      <book_id>234225</book_id>
      <book_image_url><![CDATA[https://images.example/dune-s.jpg]]></book_image_url>
      <book_large_image_url><![CDATA[https://images.example/dune-l.jpg]]></book_large_image_url>
      <author_name>Frank Herbert</author_name>
      <user_read_at><![CDATA[Sat, 15 Jun 2024 00:00:00 -0700]]></user_read_at>
      <user_date_added><![CDATA[Mon, 01 Jan 2024 10:00:00 -0800]]></user_date_added>
      <book id="234225">
        <num_pages>604</num_pages>
      </book>
    </item>
    <item>
      <title>Pride &amp; Prejudice</title>
      <book_id>1885</book_id>
      <book_large_image_url>https://s.gr-assets.com/assets/nophoto/book/111x148.png</book_large_image_url>
      <book_medium_image_url></book_medium_image_url>
      <author_name>Jane Austen</author_name>
      <user_read_at></user_read_at>
      <user_date_added>Tue, 02 Jan 2024 10:00:00 -0800</user_date_added>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn maps_items_to_book_records() {
        let feed = parse_feed(SAMPLE).unwrap();
        assert_eq!(feed.title, "Ada's bookshelf: read");
        assert_eq!(feed.items.len(), 2);

        let dune = &feed.items[0];
        assert_eq!(dune.id, "234225");
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.author, "Frank Herbert");
        assert_eq!(
            dune.image_url.as_deref(),
            Some("https://images.example/dune-l.jpg")
        );
        assert_eq!(dune.read_at.as_deref(), Some("2024-06-15T00:00:00-07:00"));
        assert_eq!(
            dune.date_added.as_deref(),
            Some("2024-01-01T10:00:00-08:00")
        );
    }

    #[test]
    fn placeholder_covers_and_blank_dates_become_absent() {
        let feed = parse_feed(SAMPLE).unwrap();
        let austen = &feed.items[1];
        assert_eq!(austen.title, "Pride & Prejudice");
        assert_eq!(austen.image_url, None);
        assert_eq!(austen.read_at, None);
        assert!(austen.date_added.is_some());
    }

    #[test]
    fn nested_book_title_does_not_leak_into_item() {
        let xml = r#"<rss><channel><title>t</title><item><title>Outer</title><book_id>9</book_id><book><title>Inner</title></book></item></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.items[0].title, "Outer");
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let feed = parse_feed("<rss><channel><title>empty</title></channel></rss>").unwrap();
        assert!(feed.items.is_empty());
        assert_eq!(feed.title, "empty");
    }

    #[test]
    fn html_error_pages_are_rejected() {
        let err = parse_feed("<html><body>Not found</body></html>").unwrap_err();
        assert!(matches!(err, RssError::MissingChannel));
    }
}
