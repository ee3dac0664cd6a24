//! HTTP `Link` header discovery (RFC 8288).

use fingerpost_common::Link;
use fingerpost_common::http_client::HttpClient;
use http::header::LINK;
use url::Url;

use super::{hint_link, http_url, resolve_reference};
use crate::fetch::Fetcher;
use crate::resolver::{DiscoveryError, DiscoveryFuture, DiscoveryMethod};

const NAME: &str = "link-header";

/// Discovery through the `Link` headers of a `HEAD` on the identifier URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHeader;

impl<C: HttpClient + Sync> DiscoveryMethod<C> for LinkHeader {
    fn name(&self) -> &str {
        NAME
    }

    fn discover<'a>(&'a self, fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a> {
        Box::pin(async move {
            let url = http_url(identifier)?;
            let resp = fetcher.head(&url).await?.error_for_status()?;

            let values = resp.headers.get_all(LINK);
            if values.iter().next().is_none() {
                return Err(DiscoveryError::NoLinkHeader);
            }
            let links: Vec<Link> = values
                .iter()
                .filter_map(|value| value.to_str().ok())
                .flat_map(|value| parse_link_header(value, &resp.url))
                .collect();
            if links.is_empty() {
                return Err(DiscoveryError::NoLinks(NAME.into()));
            }
            Ok(links)
        })
    }
}

/// Parse one `Link` header value into links.
///
/// Entries without `rel` are skipped; a multi-valued `rel` yields one link
/// per relation. References are resolved against `base`. For repeated
/// parameters the first occurrence wins.
pub fn parse_link_header(value: &str, base: &Url) -> Vec<Link> {
    split_unquoted(value, ',')
        .into_iter()
        .flat_map(|entry| parse_entry(entry, base))
        .collect()
}

fn parse_entry(entry: &str, base: &Url) -> Vec<Link> {
    let Some(rest) = entry.trim().strip_prefix('<') else {
        return Vec::new();
    };
    let Some((reference, params)) = rest.split_once('>') else {
        return Vec::new();
    };

    let mut rel = None;
    let mut media_type = None;
    let mut title = None;
    for param in split_unquoted(params, ';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (name, value) = match param.split_once('=') {
            Some((name, value)) => (name.trim(), unquote(value.trim())),
            None => (param, String::new()),
        };
        let slot = match name.to_ascii_lowercase().as_str() {
            "rel" => &mut rel,
            "type" => &mut media_type,
            "title" => &mut title,
            _ => continue,
        };
        slot.get_or_insert(value);
    }

    let Some(rel) = rel else {
        return Vec::new();
    };
    let target = resolve_reference(base, reference.trim());
    rel.split_whitespace()
        .filter_map(|rel| hint_link(rel, &target, media_type.as_deref(), title.as_deref()))
        .collect()
}

/// Split on `separator` outside of quoted strings and `<...>` references.
fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' if !in_angle => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            c if c == separator && !in_quotes && !in_angle => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Strip surrounding quotes and backslash escapes from a parameter value.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
