//! Sitemap XML for inventories and changesets.
//!
//! # Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
//!         xmlns:rs="http://www.openarchives.org/rs/terms/">
//!   <rs:md capability="changeset" seq-from="12" seq-to="15"/>
//!   <rs:ln rel="next" href="http://localhost:8888/changeset.xml?from=15"/>
//!   <url>
//!     <loc>http://en.wikipedia.org/wiki/Rust</loc>
//!     <lastmod>2025-01-01T10:00:00Z</lastmod>
//!     <rs:md change="updated" length="1024"/>
//!   </url>
//! </urlset>
//! ```
//!
//! Inventories spanning several pages are published as a `sitemapindex`
//! pointing at `sitemap00000.xml`, `sitemap00001.xml`, ...

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use super::links::{FeedLinks, SITEMAP_FILE, sitemap_page_file};
use crate::document::{ChangesetDocument, InventoryDocument, Pagination};
use crate::event::{Metadata, Seq, meta_keys};
use crate::inventory::Inventory;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const RS_NS: &str = "http://www.openarchives.org/rs/terms/";

/// Link relation from an inventory to the changeset continuing it.
const REL_CHANGESET: &str = "changeset";

// ============================================================================
// Inventory
// ============================================================================

/// Render an inventory as `(file name, xml)` pairs.
///
/// One page yields `sitemap.xml`; several pages yield an index at
/// `sitemap.xml` plus one file per page.
pub fn inventory_files(inventory: &Inventory, links: &FeedLinks) -> Result<Vec<(String, String)>> {
    if inventory.documents.len() <= 1 {
        let empty = InventoryDocument {
            page: Pagination {
                index: 0,
                count: 1,
                total_entries: 0,
                prev: None,
                next: None,
            },
            entries: Vec::new(),
        };
        let doc = inventory.documents.first().unwrap_or(&empty);
        let xml = inventory_page_xml(doc, inventory.as_of, links)?;
        return Ok(vec![(SITEMAP_FILE.to_string(), xml)]);
    }

    let mut files = Vec::with_capacity(inventory.documents.len() + 1);
    files.push((SITEMAP_FILE.to_string(), sitemap_index_xml(inventory, links)?));
    for doc in &inventory.documents {
        files.push((
            sitemap_page_file(doc.page.index),
            inventory_page_xml(doc, inventory.as_of, links)?,
        ));
    }
    Ok(files)
}

/// Index over a multi-page inventory.
pub fn sitemap_index_xml(inventory: &Inventory, links: &FeedLinks) -> Result<String> {
    let mut xml = XmlOut::new()?;
    xml.open("sitemapindex", &[("xmlns", SITEMAP_NS), ("xmlns:rs", RS_NS)])?;
    xml.empty("rs:md", &[("capability", "resourcelist")])?;
    let changeset = links.changeset(inventory.as_of, None);
    xml.empty("rs:ln", &[("rel", REL_CHANGESET), ("href", changeset.as_str())])?;

    for doc in &inventory.documents {
        xml.open("sitemap", &[])?;
        xml.text_element("loc", &links.sitemap_page(doc.page.index))?;
        if let Some(lastmod) = doc.entries.iter().map(|e| e.lastmod).max() {
            xml.text_element("lastmod", &w3c(lastmod))?;
        }
        xml.close("sitemap")?;
    }

    xml.close("sitemapindex")?;
    xml.finish()
}

/// One inventory page.
pub fn inventory_page_xml(doc: &InventoryDocument, as_of: Seq, links: &FeedLinks) -> Result<String> {
    let mut xml = XmlOut::new()?;
    xml.open("urlset", &[("xmlns", SITEMAP_NS), ("xmlns:rs", RS_NS)])?;
    xml.empty("rs:md", &[("capability", "resourcelist")])?;

    if doc.page.count > 1 {
        xml.empty("rs:ln", &[("rel", "up"), ("href", links.sitemap().as_str())])?;
    }
    page_links(&mut xml, &doc.page, |i| links.sitemap_page(i))?;
    let changeset = links.changeset(as_of, None);
    xml.empty("rs:ln", &[("rel", REL_CHANGESET), ("href", changeset.as_str())])?;

    for entry in &doc.entries {
        xml.open("url", &[])?;
        xml.text_element("loc", &links.resource(&entry.loc))?;
        xml.text_element("lastmod", &w3c(entry.lastmod))?;
        let attrs = md_attrs(&entry.metadata, None);
        if !attrs.is_empty() {
            xml.empty("rs:md", &attrs)?;
        }
        xml.close("url")?;
    }

    xml.close("urlset")?;
    xml.finish()
}

// ============================================================================
// Changeset
// ============================================================================

/// One changeset page.
///
/// `next` always points at the continuation from this page's upper bound, so
/// the last page doubles as the cursor for future changes. `until` is the
/// bound the consumer asked for; it is carried on `next` until reached.
pub fn changeset_xml(doc: &ChangesetDocument, until: Option<Seq>, links: &FeedLinks) -> Result<String> {
    let from = doc.from_seq.to_string();
    let to = doc.to_seq.to_string();

    let mut xml = XmlOut::new()?;
    xml.open("urlset", &[("xmlns", SITEMAP_NS), ("xmlns:rs", RS_NS)])?;
    xml.empty(
        "rs:md",
        &[("capability", "changeset"), ("seq-from", from.as_str()), ("seq-to", to.as_str())],
    )?;
    xml.empty("rs:ln", &[("rel", "up"), ("href", links.sitemap().as_str())])?;
    let next = links.changeset(doc.to_seq, until.filter(|&until| until > doc.to_seq));
    xml.empty("rs:ln", &[("rel", "next"), ("href", next.as_str())])?;

    for entry in &doc.doc.entries {
        xml.open("url", &[])?;
        xml.text_element("loc", &links.resource(&entry.loc))?;
        xml.text_element("lastmod", &w3c(entry.lastmod))?;
        xml.empty("rs:md", &md_attrs(&entry.metadata, Some(entry.change.change_tag())))?;
        xml.close("url")?;
    }

    xml.close("urlset")?;
    xml.finish()
}

// ============================================================================
// Helpers
// ============================================================================

/// W3C datetime, second precision, `Z` suffix.
fn w3c(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `rs:md` attributes: change tag first, then well-known metadata keys.
fn md_attrs<'a>(metadata: &'a Metadata, change: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
    let mut attrs = Vec::with_capacity(4);
    if let Some(change) = change {
        attrs.push(("change", change));
    }
    for key in [meta_keys::HASH, meta_keys::LENGTH, meta_keys::TYPE] {
        if let Some(value) = metadata.get(key) {
            attrs.push((key, value.as_str()));
        }
    }
    attrs
}

fn page_links(xml: &mut XmlOut, page: &Pagination, href: impl Fn(usize) -> String) -> Result<()> {
    if let Some(prev) = page.prev {
        xml.empty("rs:ln", &[("rel", "prev"), ("href", href(prev).as_str())])?;
    }
    if let Some(next) = page.next {
        xml.empty("rs:ln", &[("rel", "next"), ("href", href(next).as_str())])?;
    }
    Ok(())
}

/// Thin wrapper over an indenting quick-xml writer.
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::with_capacity(4096), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self { writer })
    }

    fn start<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        start
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer.write_event(Event::Start(Self::start(name, attrs)))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer.write_event(Event::Empty(Self::start(name, attrs)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String> {
        let mut xml = String::from_utf8(self.writer.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ChangeEntry, Document, InventoryEntry, paginate};
    use crate::event::EventType;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn links() -> FeedLinks {
        FeedLinks::new("http://localhost:8888")
    }

    fn inventory(ids: &[&str], page_size: usize) -> Inventory {
        let entries = ids
            .iter()
            .map(|id| InventoryEntry {
                loc: id.to_string(),
                lastmod: ts(1_700_000_000),
                metadata: Metadata::new(),
            })
            .collect();
        Inventory {
            as_of: 7,
            documents: paginate(entries, page_size),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_single_page_inventory() {
        let files = inventory_files(&inventory(&["http://ex.org/a", "b"], 10), &links()).unwrap();
        assert_eq!(files.len(), 1);
        let (name, xml) = &files[0];
        assert_eq!(name, "sitemap.xml");

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}" xmlns:rs="{RS_NS}">"#)));
        assert!(xml.contains("<loc>http://ex.org/a</loc>"));
        assert!(xml.contains("<loc>http://localhost:8888/resources/b</loc>"));
        assert!(xml.contains("<lastmod>2023-11-14T22:13:20Z</lastmod>"));
        assert!(xml.contains(
            r#"<rs:ln rel="changeset" href="http://localhost:8888/changeset.xml?from=7"/>"#
        ));
        assert!(!xml.contains(r#"rel="up""#));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[test]
    fn test_multi_page_inventory_has_index() {
        let files = inventory_files(&inventory(&["a", "b", "c"], 2), &links()).unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["sitemap.xml", "sitemap00000.xml", "sitemap00001.xml"]);

        let index = &files[0].1;
        assert!(index.contains("<sitemapindex"));
        assert!(index.contains("<loc>http://localhost:8888/sitemap00001.xml</loc>"));

        let first = &files[1].1;
        assert!(first.contains(r#"<rs:ln rel="up" href="http://localhost:8888/sitemap.xml"/>"#));
        assert!(first.contains(r#"<rs:ln rel="next" href="http://localhost:8888/sitemap00001.xml"/>"#));
        assert!(!first.contains(r#"rel="prev""#));
    }

    #[test]
    fn test_empty_inventory_renders() {
        let empty = Inventory {
            as_of: 0,
            documents: Vec::new(),
            warnings: Vec::new(),
        };
        let files = inventory_files(&empty, &links()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(!files[0].1.contains("<url>"));
    }

    #[test]
    fn test_changeset_xml() {
        let mut metadata = Metadata::new();
        metadata.insert("length".into(), "12".into());
        metadata.insert("hash".into(), "md5:1e0d5cb8ef6ba40c99b14c0237be735e".into());
        metadata.insert("editor".into(), "someone".into());

        let doc = ChangesetDocument {
            from_seq: 3,
            to_seq: 5,
            doc: Document {
                page: Pagination {
                    index: 0,
                    count: 1,
                    total_entries: 2,
                    prev: None,
                    next: None,
                },
                entries: vec![
                    ChangeEntry {
                        seq: 4,
                        loc: "http://ex.org/a?x=1&y=2".into(),
                        lastmod: ts(0),
                        change: EventType::Create,
                        metadata,
                    },
                    ChangeEntry {
                        seq: 5,
                        loc: "http://ex.org/b".into(),
                        lastmod: ts(60),
                        change: EventType::Delete,
                        metadata: Metadata::new(),
                    },
                ],
            },
        };
        let xml = changeset_xml(&doc, None, &links()).unwrap();

        assert!(xml.contains(r#"<rs:md capability="changeset" seq-from="3" seq-to="5"/>"#));
        assert!(xml.contains(r#"<rs:ln rel="next" href="http://localhost:8888/changeset.xml?from=5"/>"#));
        assert!(xml.contains("<loc>http://ex.org/a?x=1&amp;y=2</loc>"));
        assert!(xml.contains(
            r#"<rs:md change="created" hash="md5:1e0d5cb8ef6ba40c99b14c0237be735e" length="12"/>"#
        ));
        assert!(xml.contains(r#"<rs:md change="deleted"/>"#));
        assert!(!xml.contains("someone"));

        let bounded = changeset_xml(&doc, Some(9), &links()).unwrap();
        assert!(bounded.contains(
            r#"<rs:ln rel="next" href="http://localhost:8888/changeset.xml?from=5&amp;to=9"/>"#
        ));
        let reached = changeset_xml(&doc, Some(5), &links()).unwrap();
        assert!(reached.contains(r#"href="http://localhost:8888/changeset.xml?from=5"/>"#));
    }
}
