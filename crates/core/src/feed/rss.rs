//! RSS 2.0 feed source.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use tracing::{debug, info};

use crate::ledger::DiscoveredEntry;
use crate::transport::Transport;

use super::{FeedBatch, FeedError, FeedSource};

/// RSS elements the parser reads. Anything prefixed or bound to a namespace
/// (`itunes:title`, `media:content`) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Channel,
    Item,
    Title,
    Description,
    PubDate,
    Guid,
    Enclosure,
    Other,
}

impl Tag {
    fn classify(unbound: bool, local_name: &[u8]) -> Self {
        if !unbound {
            return Tag::Other;
        }
        match local_name {
            b"channel" => Tag::Channel,
            b"item" => Tag::Item,
            b"title" => Tag::Title,
            b"description" => Tag::Description,
            b"pubDate" => Tag::PubDate,
            b"guid" => Tag::Guid,
            b"enclosure" => Tag::Enclosure,
            _ => Tag::Other,
        }
    }
}

#[derive(Debug, Default)]
struct EnclosureFields {
    url: String,
    length: Option<String>,
    media_type: String,
}

#[derive(Debug, Default)]
struct ItemFields {
    title: String,
    description: String,
    pub_date: String,
    guid: String,
    enclosure: Option<EnclosureFields>,
}

fn parse_error(e: impl std::fmt::Display) -> FeedError {
    FeedError::ParseFailed(e.to_string())
}

/// Parse an RSS 2.0 document.
///
/// Only the first enclosure of each item is used; items without one are
/// counted in [`FeedBatch::skipped`]. A missing guid falls back to the
/// enclosure URL. Extension elements are ignored wherever they appear.
pub fn parse_feed(xml: &str) -> Result<FeedBatch, FeedError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut batch = FeedBatch::default();
    let mut stack: Vec<Tag> = Vec::new();
    let mut item: Option<ItemFields> = None;
    let mut saw_channel = false;

    loop {
        let (unbound, event) = match reader.read_resolved_event() {
            Ok((ns, event)) => (matches!(ns, ResolveResult::Unbound), event),
            Err(e) => return Err(parse_error(e)),
        };

        match event {
            Event::Start(element) => {
                let parent = stack.last().copied();
                let tag = match (parent, Tag::classify(unbound, element.local_name().as_ref())) {
                    (_, Tag::Channel) => {
                        saw_channel = true;
                        Tag::Channel
                    }
                    (Some(Tag::Channel), Tag::Item) => {
                        item = Some(ItemFields::default());
                        Tag::Item
                    }
                    (Some(Tag::Item), Tag::Enclosure) => {
                        take_enclosure(&element, item.as_mut())?;
                        Tag::Enclosure
                    }
                    (_, Tag::Item) => Tag::Other,
                    (_, tag) => tag,
                };
                stack.push(tag);
            }
            Event::Empty(element) => {
                let parent = stack.last().copied();
                match (parent, Tag::classify(unbound, element.local_name().as_ref())) {
                    (Some(Tag::Item), Tag::Enclosure) => take_enclosure(&element, item.as_mut())?,
                    (Some(Tag::Channel), Tag::Item) => push_item(&mut batch, ItemFields::default()),
                    _ => {}
                }
            }
            Event::End(_) => {
                if stack.pop() == Some(Tag::Item) {
                    if let Some(fields) = item.take() {
                        push_item(&mut batch, fields);
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(parse_error)?;
                append_text(&stack, &mut batch, item.as_mut(), &text);
            }
            Event::CData(data) => {
                let text = data.decode().map_err(parse_error)?;
                append_text(&stack, &mut batch, item.as_mut(), &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_channel {
        return Err(FeedError::ParseFailed(
            "document has no channel element".to_string(),
        ));
    }

    batch.channel_title = batch.channel_title.trim().to_string();
    batch.channel_description = batch.channel_description.trim().to_string();
    Ok(batch)
}

/// Record the enclosure attributes unless the item already has one.
fn take_enclosure(
    element: &BytesStart<'_>,
    item: Option<&mut ItemFields>,
) -> Result<(), FeedError> {
    let Some(item) = item else {
        return Ok(());
    };
    if item.enclosure.is_some() {
        return Ok(());
    }

    let mut enclosure = EnclosureFields::default();
    for attr in element.attributes() {
        let attr = attr.map_err(parse_error)?;
        let value = attr.unescape_value().map_err(parse_error)?;
        match attr.key.as_ref() {
            b"url" => enclosure.url = value.into_owned(),
            b"length" => enclosure.length = Some(value.into_owned()),
            b"type" => enclosure.media_type = value.into_owned(),
            _ => {}
        }
    }
    item.enclosure = Some(enclosure);
    Ok(())
}

/// Route character data to the field named by the innermost element, when
/// that element is a direct child of the channel or of an item.
fn append_text(stack: &[Tag], batch: &mut FeedBatch, item: Option<&mut ItemFields>, text: &str) {
    let [.., parent, field] = stack else {
        return;
    };

    let target = match (parent, item) {
        (Tag::Item, Some(item)) => match field {
            Tag::Title => &mut item.title,
            Tag::Description => &mut item.description,
            Tag::PubDate => &mut item.pub_date,
            Tag::Guid => &mut item.guid,
            _ => return,
        },
        (Tag::Channel, _) => match field {
            Tag::Title => &mut batch.channel_title,
            Tag::Description => &mut batch.channel_description,
            _ => return,
        },
        _ => return,
    };
    target.push_str(text);
}

fn push_item(batch: &mut FeedBatch, fields: ItemFields) {
    let title = fields.title.trim().to_string();

    let Some(enclosure) = fields.enclosure else {
        debug!(title = %title, "Item has no enclosure, skipping");
        batch.skipped += 1;
        return;
    };

    let address = enclosure.url.trim().to_string();
    if address.is_empty() {
        debug!(title = %title, "Enclosure has no url, skipping");
        batch.skipped += 1;
        return;
    }

    let guid = match fields.guid.trim() {
        "" => address.clone(),
        guid => guid.to_string(),
    };

    let length = enclosure
        .length
        .and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(0);

    batch.entries.push(DiscoveredEntry {
        title,
        description: fields.description.trim().to_string(),
        pub_date: fields.pub_date.trim().to_string(),
        guid,
        address,
        length,
        media_type: enclosure.media_type.trim().to_string(),
    });
}

/// Feed source that fetches an RSS document over a [`Transport`].
pub struct RssFeedSource {
    url: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RssFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RssFeedSource")
            .field("url", &self.url)
            .finish()
    }
}

impl RssFeedSource {
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            transport,
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn poll(&self) -> Result<FeedBatch, FeedError> {
        info!(url = %self.url, "Fetching feed");
        let response = self
            .transport
            .get(&self.url)
            .await
            .map_err(|e| FeedError::FetchFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(FeedError::FetchFailed {
                url: self.url.clone(),
                reason: format!("HTTP {}", response.status),
            });
        }

        let batch = parse_feed(&response.text())?;
        info!(
            channel = %batch.channel_title,
            description = %batch.channel_description,
            entries = batch.entries.len(),
            skipped = batch.skipped,
            "Feed polled"
        );
        Ok(batch)
    }
}
