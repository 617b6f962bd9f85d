//! Request URL → feed route.

use url::Url;

use crate::event::Seq;
use crate::generator::links::{CHANGESET_FILE, SITEMAP_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/sitemap.xml`, or a page such as `/sitemap00002.xml`.
    Sitemap(String),
    /// `/changeset.xml?from=&to=`
    Changeset { from: Seq, to: Option<Seq> },
    Status,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadRequest(pub String);

/// Resolve a raw request URL (`/changeset.xml?from=3`).
pub fn resolve(raw: &str) -> Result<Route, BadRequest> {
    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(raw))
        .map_err(|e| BadRequest(format!("malformed URL: {e}")))?;

    let path = url.path().trim_start_matches('/');
    match path {
        "" | SITEMAP_FILE => Ok(Route::Sitemap(SITEMAP_FILE.to_string())),
        CHANGESET_FILE => changeset_route(&url),
        "status" => Ok(Route::Status),
        name if is_sitemap_page(name) => Ok(Route::Sitemap(name.to_string())),
        _ => Ok(Route::NotFound),
    }
}

fn is_sitemap_page(name: &str) -> bool {
    name.strip_prefix("sitemap")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn changeset_route(url: &Url) -> Result<Route, BadRequest> {
    let mut from = None;
    let mut to = None;
    for (key, value) in url.query_pairs() {
        let slot = match key.as_ref() {
            "from" => &mut from,
            "to" => &mut to,
            _ => continue,
        };
        let seq = value
            .parse::<Seq>()
            .map_err(|_| BadRequest(format!("`{key}` must be a sequence number, got `{value}`")))?;
        *slot = Some(seq);
    }
    let from = from.ok_or_else(|| BadRequest("missing `from` checkpoint".to_string()))?;
    Ok(Route::Changeset { from, to })
}
