//! Resource descriptor discovery for federated identities
//!
//! Fingerpost turns an identifier (`acct:alice@example.com`, a bare
//! `alice@example.com`, or an `https://` profile URL) into the descriptor
//! document (XRD or JRD) that describes it, trying a chain of discovery
//! methods until one works.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn example() -> miette::Result<()> {
//! use fingerpost_discovery::Discoverer;
//!
//! let discoverer = Discoverer::default();
//! let doc = discoverer.lookup("alice@example.com").await?;
//! for link in doc.links() {
//!     println!("{} -> {:?}", link.rel(), link.href());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Lookup order
//!
//! 1. WebFinger at `https://{host}/.well-known/webfinger?resource={uri}`
//! 2. host-meta at `/.well-known/host-meta` (`https`, then `http` for `acct:`)
//! 3. `Link` headers of a `HEAD` on the identifier URL
//! 4. `<link>` elements in the identifier page's `<head>`
//!
//! The first method whose descriptor link (`lrdd`) leads to a parseable
//! document wins. Methods can be replaced or reordered via
//! [`Discoverer::empty`], [`Discoverer::with_primary`] and
//! [`Discoverer::with_fallback`].
//!
//! ## Customization
//!
//! ```
//! use std::time::Duration;
//! use fingerpost_discovery::Discoverer;
//! use fingerpost_discovery::resolver::ResolverOptions;
//!
//! let opts = ResolverOptions::new()
//!     .request_timeout(Duration::from_secs(3))
//!     .user_agent("my-server/1.0")
//!     .require_describes(true)
//!     .build();
//!
//! let discoverer = Discoverer::new(reqwest::Client::new(), opts);
//! assert_eq!(
//!     discoverer.methods(),
//!     ["webfinger", "host-meta", "link-header", "link-html"]
//! );
//! ```

#![warn(missing_docs)]

pub mod fetch;
pub mod methods;
pub mod resolver;

pub use fingerpost_common::{DescriptorDocument, Link};

use fingerpost_common::http_client::HttpClient;
use fingerpost_common::normalize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::Fetcher;
use crate::resolver::{
    DiscoveryError, DiscoveryMethod, LookupError, MethodFailure, MethodRegistry, ResolverOptions,
};

/// `Accept` header for descriptor fetches when the link declares no type.
pub const DESCRIPTOR_ACCEPT: &str =
    "application/jrd+json, application/xrd+xml;q=0.9, application/json;q=0.8";

/// Discovery engine: an HTTP client, options and an ordered method registry.
#[derive(Clone)]
pub struct Discoverer<C = reqwest::Client> {
    fetcher: Fetcher<C>,
    opts: ResolverOptions,
    registry: MethodRegistry<C>,
}

impl<C: HttpClient + Sync> Discoverer<C> {
    /// Engine with the standard method chain.
    pub fn new(http: C, opts: ResolverOptions) -> Self {
        Self::with_registry(http, opts, MethodRegistry::standard())
    }
}

impl<C> Discoverer<C> {
    /// Engine with no methods registered; every lookup fails until some are added.
    pub fn empty(http: C, opts: ResolverOptions) -> Self {
        Self::with_registry(http, opts, MethodRegistry::empty())
    }

    /// Engine with a prepared registry.
    pub fn with_registry(http: C, opts: ResolverOptions, registry: MethodRegistry<C>) -> Self {
        #[cfg(feature = "tracing")]
        tracing::info!(
            methods = ?registry.names(),
            descriptor_rel = %opts.descriptor_rel,
            timeout = ?opts.request_timeout,
            require_describes = opts.require_describes,
            "fingerpost discoverer created"
        );

        Self {
            fetcher: Fetcher::new(http, &opts),
            opts,
            registry,
        }
    }

    /// Append a method to the primary group.
    pub fn with_primary(mut self, method: impl DiscoveryMethod<C> + 'static) -> Self {
        self.registry.register_primary(method);
        self
    }

    /// Append a method to the fallback group.
    pub fn with_fallback(mut self, method: impl DiscoveryMethod<C> + 'static) -> Self {
        self.registry.register_fallback(method);
        self
    }

    /// Method names in the order a lookup tries them.
    pub fn methods(&self) -> Vec<&str> {
        self.registry.names()
    }

    #[allow(missing_docs)]
    pub fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    #[allow(missing_docs)]
    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }
}

impl<C: HttpClient + Sync> Discoverer<C> {
    /// Find the descriptor document for `identifier`.
    ///
    /// Methods run one at a time in registry order. A method's failure is
    /// recorded and the next one tried; only when all have failed is
    /// [`LookupError::Unresolvable`] returned, carrying every failure.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), fields(identifier = %identifier)))]
    pub async fn lookup(&self, identifier: &str) -> Result<DescriptorDocument, LookupError> {
        let normalized = normalize(identifier)?;
        let mut failures = Vec::new();
        for method in self.registry.iter() {
            match self.try_method(method, &normalized).await {
                Ok(doc) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(method = method.name(), subject = ?doc.subject(), "resolved");
                    return Ok(doc);
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(method = method.name(), error = %error, "discovery method failed");
                    failures.push(MethodFailure {
                        method: method.name().into(),
                        error,
                    });
                }
            }
        }
        Err(LookupError::Unresolvable {
            identifier: normalized,
            failures,
        })
    }

    /// [`lookup`](Self::lookup), abandoned as soon as `token` is cancelled.
    ///
    /// The in-flight request is dropped and no further methods run.
    pub async fn lookup_cancellable(
        &self,
        identifier: &str,
        token: &CancellationToken,
    ) -> Result<DescriptorDocument, LookupError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(LookupError::Cancelled),
            result = self.lookup(identifier) => result,
        }
    }

    /// Raw link hints from the first method that produces any.
    ///
    /// No descriptor is fetched.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), fields(identifier = %identifier)))]
    pub async fn discover_links(&self, identifier: &str) -> Result<Vec<Link>, LookupError> {
        let normalized = normalize(identifier)?;
        let mut failures = Vec::new();
        for method in self.registry.iter() {
            match method.discover(&self.fetcher, &normalized).await {
                Ok(links) if !links.is_empty() => return Ok(links),
                Ok(_) => failures.push(MethodFailure {
                    method: method.name().into(),
                    error: DiscoveryError::NoLinks(method.name().into()),
                }),
                Err(error) => failures.push(MethodFailure {
                    method: method.name().into(),
                    error,
                }),
            }
        }
        Err(LookupError::Unresolvable {
            identifier: normalized,
            failures,
        })
    }

    async fn try_method(
        &self,
        method: &dyn DiscoveryMethod<C>,
        normalized: &str,
    ) -> resolver::Result<DescriptorDocument> {
        let links = method.discover(&self.fetcher, normalized).await?;
        if links.is_empty() {
            return Err(DiscoveryError::NoLinks(method.name().into()));
        }

        let rel = &self.opts.descriptor_rel;
        let link = links
            .iter()
            .find(|link| link.rel() == rel.as_str())
            .ok_or_else(|| DiscoveryError::NoDescriptorLink(rel.clone()))?;
        let target = link
            .target(normalized)
            .ok_or_else(|| DiscoveryError::UnusableLink(rel.clone()))?;
        let url = Url::parse(&target)?;

        let accept = link.media_type().unwrap_or(DESCRIPTOR_ACCEPT);
        let resp = self
            .fetcher
            .get(&url, Some(accept))
            .await?
            .error_for_status()?;
        let doc = resp.document(link.media_type())?;

        if self.opts.require_describes && !doc.describes(normalized) {
            return Err(DiscoveryError::SubjectMismatch(normalized.to_string()));
        }
        Ok(doc)
    }
}

impl Default for Discoverer<reqwest::Client> {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), ResolverOptions::default())
    }
}

/// The standard engine over `reqwest`.
pub type PublicDiscoverer = Discoverer<reqwest::Client>;
