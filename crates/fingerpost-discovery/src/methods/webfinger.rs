//! WebFinger (RFC 7033).
//!
//! No I/O happens here: the method only synthesizes the well-known query URL
//! as an `lrdd` template link, and the engine fetches it like any other
//! descriptor.

use fingerpost_common::identifier::AcctUri;
use fingerpost_common::{JRD_MEDIA_TYPE, LRDD_REL, Link, is_acct_uri};

use crate::fetch::Fetcher;
use crate::resolver::{DiscoveryError, DiscoveryFuture, DiscoveryMethod, Result};

/// Discovery through `https://{host}/.well-known/webfinger`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebFinger;

impl WebFinger {
    /// The single link WebFinger discovery yields for an `acct:` identifier.
    pub fn link_for(identifier: &str) -> Result<Link> {
        if !is_acct_uri(identifier) {
            return Err(DiscoveryError::BadResource(identifier.to_string()));
        }
        let acct = AcctUri::parse(identifier)
            .map_err(|_| DiscoveryError::BadResource(identifier.to_string()))?;
        Ok(Link::builder(LRDD_REL)
            .media_type(JRD_MEDIA_TYPE)
            .template(format!(
                "https://{}/.well-known/webfinger?resource={{uri}}",
                acct.host
            ))
            .build()?)
    }
}

impl<C> DiscoveryMethod<C> for WebFinger {
    fn name(&self) -> &str {
        "webfinger"
    }

    fn discover<'a>(&'a self, _fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a> {
        Box::pin(std::future::ready(
            Self::link_for(identifier).map(|link| vec![link]),
        ))
    }
}
