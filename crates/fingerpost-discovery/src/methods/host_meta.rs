//! Host metadata (RFC 6415): `/.well-known/host-meta`.

use fingerpost_common::Identifier;
use fingerpost_common::http_client::HttpClient;
use url::Url;

use crate::fetch::Fetcher;
use crate::resolver::{DiscoveryError, DiscoveryFuture, DiscoveryMethod, Result};

/// Well-known host metadata path.
pub const HOST_META_PATH: &str = "/.well-known/host-meta";

/// `Accept` header sent for host-meta requests.
pub const HOST_META_ACCEPT: &str = "application/xrd+xml, application/jrd+json";

/// Discovery through the identifier host's host-meta document.
///
/// Its links (usually a single `lrdd` template) are returned as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMeta;

impl HostMeta {
    /// host-meta URLs to try, in order.
    ///
    /// `acct:` identifiers try `https` then `http` on their domain; HTTP(S)
    /// URLs use their own scheme, host and port.
    pub fn candidates(identifier: &str) -> Result<Vec<Url>> {
        let parsed = Identifier::parse(identifier)
            .map_err(|_| DiscoveryError::BadResource(identifier.to_string()))?;
        let host = parsed
            .host()
            .ok_or_else(|| DiscoveryError::BadResource(identifier.to_string()))?;
        let schemes: &[&str] = match &parsed {
            Identifier::Acct(_) => &["https", "http"],
            Identifier::Http(url) if url.scheme() == "https" => &["https"],
            Identifier::Http(_) => &["http"],
        };
        schemes
            .iter()
            .map(|scheme| {
                Url::parse(&format!("{scheme}://{host}{HOST_META_PATH}"))
                    .map_err(DiscoveryError::from)
            })
            .collect()
    }
}

impl<C: HttpClient + Sync> DiscoveryMethod<C> for HostMeta {
    fn name(&self) -> &str {
        "host-meta"
    }

    fn discover<'a>(&'a self, fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a> {
        Box::pin(async move {
            let candidates = Self::candidates(identifier)?;
            for url in &candidates {
                let attempt = async {
                    let resp = fetcher
                        .get(url, Some(HOST_META_ACCEPT))
                        .await?
                        .error_for_status()?;
                    resp.document(None)
                };
                match attempt.await {
                    Ok(doc) if !doc.links().is_empty() => return Ok(doc.into_links()),
                    Ok(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(%url, "host-meta has no links");
                    }
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(%url, error = %_e, "host-meta candidate failed");
                    }
                }
            }
            Err(DiscoveryError::DiscoveryExhausted {
                tried: candidates.iter().map(Url::to_string).collect(),
            })
        })
    }
}
