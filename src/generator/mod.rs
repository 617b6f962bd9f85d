//! Feed document output.
//!
//! Turns rendered inventories and changesets into files:
//!
//! - **Sitemap**: inventory as `sitemap.xml` (+ pages and index)
//! - **Changeset**: changeset pages as `changeset00000.xml`, ...
//!
//! Files are written into a temporary directory first and moved into place
//! once complete, so a reader of the output directory never sees a
//! half-written set.

pub mod links;
pub mod sitemap;

pub use links::FeedLinks;

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::document::ChangesetDocument;
use crate::inventory::Inventory;
use crate::{debug, log};

const STAGING_DIR: &str = ".staging";

/// Minify XML content if enabled.
pub fn minify_xml(content: &str, enabled: bool) -> Cow<'_, str> {
    if enabled {
        let minified = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("");
        Cow::Owned(minified)
    } else {
        Cow::Borrowed(content)
    }
}

/// Write the inventory files into `dir`, replacing any previous sitemaps.
pub fn write_inventory(dir: &Path, inventory: &Inventory, links: &FeedLinks, minify: bool) -> Result<()> {
    let files = sitemap::inventory_files(inventory, links)?;
    publish_files(dir, "sitemap", &files, minify)?;
    log!("sitemap"; "{} resources in {} file(s) at #{}",
        inventory.resource_count(), files.len(), inventory.as_of);
    Ok(())
}

/// Write changeset pages into `dir` as `changeset00000.xml`, ...
pub fn write_changeset(
    dir: &Path,
    docs: &[ChangesetDocument],
    links: &FeedLinks,
    minify: bool,
) -> Result<()> {
    let files = docs
        .iter()
        .map(|doc| -> Result<(String, String)> {
            let name = links::changeset_page_file(doc.doc.page.index);
            Ok((name, sitemap::changeset_xml(doc, None, links)?))
        })
        .collect::<Result<Vec<_>>>()?;
    publish_files(dir, "changeset", &files, minify)?;

    if let (Some(first), Some(last)) = (docs.first(), docs.last()) {
        log!("changeset"; "({}, {}] in {} file(s)", first.from_seq, last.to_seq, files.len());
    }
    Ok(())
}

/// Stage `files` next to `dir`, drop stale files of the same kind, move in.
fn publish_files(dir: &Path, stem: &str, files: &[(String, String)], minify: bool) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let staging = dir.join(STAGING_DIR).join(stem);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to clear {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    for (name, xml) in files {
        let path = staging.join(name);
        fs::write(&path, minify_xml(xml, minify).as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    remove_stale(dir, stem)?;
    for (name, _) in files {
        fs::rename(staging.join(name), dir.join(name))
            .with_context(|| format!("Failed to move {} into {}", name, dir.display()))?;
    }

    fs::remove_dir_all(dir.join(STAGING_DIR)).ok();
    Ok(())
}

/// Remove feed files of one kind (`sitemap*.xml` or `changeset*.xml`).
fn remove_stale(dir: &Path, stem: &str) -> Result<()> {
    let mut removed = 0usize;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(stem) && links::is_feed_file(&name) {
            fs::remove_file(entry.path())
                .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("generator"; "removed {} stale {} file(s)", removed, stem);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InventoryEntry, paginate};
    use crate::event::Metadata;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn inventory(n: usize, page_size: usize) -> Inventory {
        let entries = (0..n)
            .map(|i| InventoryEntry {
                loc: format!("r{i}"),
                lastmod: DateTime::from_timestamp(0, 0).unwrap(),
                metadata: Metadata::new(),
            })
            .collect();
        Inventory {
            as_of: 1,
            documents: paginate(entries, page_size),
            warnings: Vec::new(),
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_minify_xml() {
        let xml = "<root>\n\n  <item>Hello</item>\n</root>";
        assert_eq!(minify_xml(xml, true), "<root><item>Hello</item></root>");
        assert_eq!(minify_xml(xml, false), xml);
    }

    #[test]
    fn test_write_inventory_replaces_stale_pages() {
        let dir = TempDir::new().unwrap();
        let links = FeedLinks::new("http://localhost");
        fs::write(dir.path().join("robots.txt"), "keep").unwrap();

        write_inventory(dir.path(), &inventory(5, 2), &links, false).unwrap();
        assert_eq!(
            names(dir.path()),
            ["robots.txt", "sitemap.xml", "sitemap00000.xml", "sitemap00001.xml", "sitemap00002.xml"]
        );

        write_inventory(dir.path(), &inventory(1, 2), &links, true).unwrap();
        assert_eq!(names(dir.path()), ["robots.txt", "sitemap.xml"]);

        let xml = fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert!(!xml.contains('\n'));
        assert!(xml.contains("<loc>http://localhost/resources/r0</loc>"));
    }

    #[test]
    fn test_write_changeset_keeps_sitemaps() {
        use crate::changeset::ChangesetRenderer;
        use crate::event::RawEvent;
        use crate::memory::{ChangeMemory, MemoryConfig};
        use std::num::NonZeroUsize;
        use std::sync::Arc;

        let memory = Arc::new(ChangeMemory::new(MemoryConfig::new(NonZeroUsize::new(10).unwrap())));
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        memory
            .record_batch(vec![RawEvent::new("a", "create", ts), RawEvent::new("b", "create", ts)])
            .unwrap();
        let renderer = ChangesetRenderer::new(memory, NonZeroUsize::new(1).unwrap());
        let docs = renderer.render(0, None).unwrap();

        let dir = TempDir::new().unwrap();
        let links = FeedLinks::new("http://localhost");
        write_inventory(dir.path(), &inventory(1, 2), &links, false).unwrap();
        write_changeset(dir.path(), &docs, &links, false).unwrap();

        assert_eq!(
            names(dir.path()),
            ["changeset00000.xml", "changeset00001.xml", "sitemap.xml"]
        );
    }
}
