//! `Link` header pagination for the catalog and tag list endpoints
//!
//! Registries that paginate answer with `Link: </v2/_catalog?last=x&n=100>; rel="next"`.
//! The target may be relative to the request URL.

use crate::error::Result;
use reqwest::header::{HeaderMap, LINK};
use std::collections::HashSet;
use url::Url;

/// Walks `rel="next"` links from a first page
///
/// A link back to a page already fetched ends the walk.
pub struct PageCursor {
    next: Option<Url>,
    visited: HashSet<Url>,
}

impl PageCursor {
    pub fn new(first: Url) -> Self {
        Self {
            next: Some(first),
            visited: HashSet::new(),
        }
    }

    /// URL of the page to fetch now
    pub fn next_url(&mut self) -> Option<Url> {
        let url = self.next.take()?;
        self.visited.insert(url.clone());
        Some(url)
    }

    /// Record the response headers of the page at `current`
    pub fn advance(&mut self, headers: &HeaderMap, current: &Url) -> Result<()> {
        self.next = next_page(headers, current)?.filter(|url| !self.visited.contains(url));
        Ok(())
    }
}

/// URL of the next page, or `None` on the last page
pub fn next_page(headers: &HeaderMap, current: &Url) -> Result<Option<Url>> {
    for value in headers.get_all(LINK) {
        let Ok(value) = value.to_str() else {
            continue;
        };

        if let Some(target) = parse_next_link(value) {
            return Ok(Some(current.join(target)?));
        }
    }

    Ok(None)
}

/// Target of the `rel="next"` entry in one `Link` header value
fn parse_next_link(value: &str) -> Option<&str> {
    value.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| {
                    rel.trim_matches('"')
                        .split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("next"))
                })
                .unwrap_or(false)
        });

        is_next.then_some(target)
    })
}
