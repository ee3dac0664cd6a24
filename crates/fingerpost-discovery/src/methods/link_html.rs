//! HTML `<link>` element discovery.
//!
//! Only the document `<head>` is considered. This is pattern matching, not an
//! HTML parser: comments and scripts inside the head are not special-cased.

use std::sync::LazyLock;

use fingerpost_common::Link;
use fingerpost_common::http_client::HttpClient;
use regex::Regex;
use url::Url;

use super::{hint_link, http_url, resolve_reference};
use crate::fetch::Fetcher;
use crate::resolver::{DiscoveryError, DiscoveryFuture, DiscoveryMethod};

const NAME: &str = "link-html";

const HTML_ACCEPT: &str = "text/html, application/xhtml+xml;q=0.9, */*;q=0.1";

static HEAD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head(?:\s[^>]*)?>(.*?)</head\s*>").unwrap());

static LINK_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b([^>]*)>").unwrap());

static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .unwrap()
});

/// Discovery through `<link>` elements in the head of the identifier's page.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHtml;

impl<C: HttpClient + Sync> DiscoveryMethod<C> for LinkHtml {
    fn name(&self) -> &str {
        NAME
    }

    fn discover<'a>(&'a self, fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a> {
        Box::pin(async move {
            let url = http_url(identifier)?;
            let resp = fetcher
                .get(&url, Some(HTML_ACCEPT))
                .await?
                .error_for_status()?;
            let html = String::from_utf8_lossy(&resp.body);
            let links = parse_html_links(&html, &resp.url);
            if links.is_empty() {
                return Err(DiscoveryError::NoLinks(NAME.into()));
            }
            Ok(links)
        })
    }
}

/// Extract `<link>` elements from the `<head>` of `html`.
///
/// `rel`, `href`, `type` and `title` are read; relative hrefs are resolved
/// against `base`. Links without `rel` or `href` are skipped, and a
/// multi-valued `rel` yields one link per relation.
pub fn parse_html_links(html: &str, base: &Url) -> Vec<Link> {
    let Some(head) = HEAD_REGEX.captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    LINK_TAG_REGEX
        .captures_iter(head.as_str())
        .filter_map(|tag| tag.get(1))
        .flat_map(|attrs| links_from_attributes(attrs.as_str(), base))
        .collect()
}

fn links_from_attributes(attrs: &str, base: &Url) -> Vec<Link> {
    let mut rel = None;
    let mut href = None;
    let mut media_type = None;
    let mut title = None;
    for attr in ATTRIBUTE_REGEX.captures_iter(attrs) {
        let value = attr
            .get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map(|v| decode_entities(v.as_str()))
            .unwrap_or_default();
        let slot = match attr[1].to_ascii_lowercase().as_str() {
            "rel" => &mut rel,
            "href" => &mut href,
            "type" => &mut media_type,
            "title" => &mut title,
            _ => continue,
        };
        slot.get_or_insert(value);
    }

    let (Some(rel), Some(href)) = (rel, href) else {
        return Vec::new();
    };
    let target = resolve_reference(base, href.trim());
    rel.split_whitespace()
        .filter_map(|rel| hint_link(rel, &target, media_type.as_deref(), title.as_deref()))
        .collect()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
