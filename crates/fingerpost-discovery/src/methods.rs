//! Built-in discovery methods.

use fingerpost_common::http_client::HttpClient;
use fingerpost_common::template::URI_PLACEHOLDER;
use fingerpost_common::{Identifier, Link};
use url::Url;

use crate::resolver::{DiscoveryError, MethodRegistry, Result};

pub mod host_meta;
pub mod link_header;
pub mod link_html;
pub mod webfinger;

pub use host_meta::HostMeta;
pub use link_header::LinkHeader;
pub use link_html::LinkHtml;
pub use webfinger::WebFinger;

impl<C: HttpClient + Sync> MethodRegistry<C> {
    /// WebFinger as primary; host-meta, `Link` header and HTML `<link>` as
    /// fallbacks, in that order.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register_primary(WebFinger)
            .register_fallback(HostMeta)
            .register_fallback(LinkHeader)
            .register_fallback(LinkHtml);
        registry
    }
}

/// The identifier as an HTTP(S) URL, or `BadResource`.
pub(crate) fn http_url(identifier: &str) -> Result<Url> {
    match Identifier::parse(identifier) {
        Ok(Identifier::Http(url)) => Ok(url),
        _ => Err(DiscoveryError::BadResource(identifier.to_string())),
    }
}

/// Resolve a (possibly relative) reference against `base`, keeping the raw
/// reference if it cannot be joined. A `{uri}` placeholder survives joining.
pub(crate) fn resolve_reference(base: &Url, reference: &str) -> String {
    match base.join(reference) {
        Ok(url) => String::from(url).replace("%7Buri%7D", URI_PLACEHOLDER),
        Err(_) => reference.to_string(),
    }
}

/// Build a link hint from a header or markup. Targets carrying `{uri}` become
/// templates, everything else an `href`.
pub(crate) fn hint_link(
    rel: &str,
    target: &str,
    media_type: Option<&str>,
    title: Option<&str>,
) -> Option<Link> {
    let mut builder = Link::builder(rel);
    builder = if target.contains(URI_PLACEHOLDER) {
        builder.template(target)
    } else {
        builder.href(target)
    };
    if let Some(media_type) = media_type.filter(|t| !t.is_empty()) {
        builder = builder.media_type(media_type);
    }
    if let Some(title) = title {
        builder = builder.title("", title);
    }
    builder.build().ok()
}
