//! Feed URL layout.
//!
//! ```text
//! {base}/sitemap.xml                   inventory (or its index)
//! {base}/sitemap00000.xml              inventory page 0
//! {base}/changeset.xml?from=12&to=40   changeset between checkpoints
//! {base}/resources/{id}                locator for non-URL resource ids
//! ```

use crate::event::Seq;

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const CHANGESET_FILE: &str = "changeset.xml";
const RESOURCE_PATH: &str = "resources";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLinks {
    base: String,
}

impl FeedLinks {
    pub fn new(base_uri: &str) -> Self {
        Self {
            base: base_uri.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn sitemap(&self) -> String {
        format!("{}/{SITEMAP_FILE}", self.base)
    }

    pub fn sitemap_page(&self, index: usize) -> String {
        format!("{}/{}", self.base, sitemap_page_file(index))
    }

    pub fn changeset(&self, from: Seq, to: Option<Seq>) -> String {
        match to {
            Some(to) => format!("{}/{CHANGESET_FILE}?from={from}&to={to}", self.base),
            None => format!("{}/{CHANGESET_FILE}?from={from}", self.base),
        }
    }

    /// Locator for a resource id. Absolute URLs are used as they are.
    pub fn resource(&self, resource_id: &str) -> String {
        match url::Url::parse(resource_id) {
            Ok(url) if url.has_host() => resource_id.to_string(),
            _ => format!(
                "{}/{RESOURCE_PATH}/{}",
                self.base,
                resource_id.trim_start_matches('/')
            ),
        }
    }
}

/// File name of inventory page `index`.
pub fn sitemap_page_file(index: usize) -> String {
    format!("sitemap{index:05}.xml")
}

/// File name of changeset page `index`.
pub fn changeset_page_file(index: usize) -> String {
    format!("changeset{index:05}.xml")
}

/// Whether `name` is a file this crate writes (`sitemap.xml`, `sitemap00003.xml`, ...).
pub fn is_feed_file(name: &str) -> bool {
    ["sitemap", "changeset"].iter().any(|stem| {
        name.strip_prefix(stem)
            .and_then(|rest| rest.strip_suffix(".xml"))
            .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
    })
}
