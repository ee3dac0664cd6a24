//! Resource discovery: errors, options, and the pluggable method registry.
//!
//! Lookup order (default):
//! - primary: WebFinger (`https://{host}/.well-known/webfinger?resource={uri}`)
//! - fallback: host-meta → HTTP `Link` header → HTML `<link>` elements
//!
//! Every method produces link hints; the engine picks the first descriptor
//! link (`lrdd` unless configured otherwise), fetches it and parses the XRD or
//! JRD it points at. Per-method failures are collected, never surfaced on
//! their own, and only an exhausted chain is reported to the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use fingerpost_common::document::DocumentError;
use fingerpost_common::error::TransportError;
use fingerpost_common::{IdentifierError, LRDD_REL, Link};
use http::StatusCode;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::fetch::Fetcher;

/// Why a single discovery method (or the descriptor fetch that follows it)
/// did not produce a document.
#[derive(Debug, Error, Diagnostic)]
#[allow(missing_docs)]
pub enum DiscoveryError {
    #[error("identifier `{0}` is not usable by this discovery method")]
    #[diagnostic(code(fingerpost_discovery::bad_resource))]
    BadResource(String),
    #[error("{0} discovery found no links")]
    #[diagnostic(code(fingerpost_discovery::no_links))]
    NoLinks(SmolStr),
    #[error("response carried no Link header")]
    #[diagnostic(
        code(fingerpost_discovery::no_link_header),
        help("the server does not advertise descriptors via HTTP Link headers")
    )]
    NoLinkHeader,
    #[error("host-meta unavailable at {}", .tried.join(", "))]
    #[diagnostic(
        code(fingerpost_discovery::discovery_exhausted),
        help("the host serves no usable /.well-known/host-meta over https or http")
    )]
    DiscoveryExhausted { tried: Vec<String> },
    #[error("no `{0}` link among the discovered links")]
    #[diagnostic(code(fingerpost_discovery::no_descriptor_link))]
    NoDescriptorLink(SmolStr),
    #[error("`{0}` link has neither template nor href")]
    #[diagnostic(code(fingerpost_discovery::unusable_link))]
    UnusableLink(SmolStr),
    #[error("descriptor does not describe `{0}`")]
    #[diagnostic(
        code(fingerpost_discovery::subject_mismatch),
        help("neither the subject nor any alias matches the requested identifier")
    )]
    SubjectMismatch(String),
    #[error("HTTP status {0}")]
    #[diagnostic(
        code(fingerpost_discovery::http_status),
        help("verify well-known paths and descriptor endpoints")
    )]
    HttpStatus(StatusCode),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Identifier(#[from] IdentifierError),
    #[error("URL parse error: {0}")]
    #[diagnostic(code(fingerpost_discovery::url))]
    Url(#[from] url::ParseError),
}

/// One method's recorded failure during a lookup.
#[derive(Debug, Error, Diagnostic)]
#[error("{method}: {error}")]
#[diagnostic(code(fingerpost_discovery::method_failed))]
pub struct MethodFailure {
    /// [`DiscoveryMethod::name`] of the method that failed
    pub method: SmolStr,
    /// What went wrong
    #[source]
    pub error: DiscoveryError,
}

/// Errors returned from a lookup.
#[derive(Debug, Error, Diagnostic)]
pub enum LookupError {
    /// The input could not be normalized; nothing was attempted
    #[error("invalid identifier: {0}")]
    #[diagnostic(code(fingerpost_discovery::invalid_identifier))]
    InvalidIdentifier(
        #[from]
        #[diagnostic_source]
        IdentifierError,
    ),
    /// Every registered method failed
    #[error("could not resolve `{identifier}` ({} discovery methods tried)", .failures.len())]
    #[diagnostic(
        code(fingerpost_discovery::unresolvable),
        help("the remote host may not support WebFinger, host-meta or LRDD")
    )]
    Unresolvable {
        /// Normalized identifier
        identifier: String,
        /// Per-method failures, in the order the methods ran
        #[related]
        failures: Vec<MethodFailure>,
    },
    /// The caller cancelled the lookup
    #[error("lookup cancelled")]
    #[diagnostic(code(fingerpost_discovery::cancelled))]
    Cancelled,
}

/// Result alias for discovery methods.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Boxed future returned by [`DiscoveryMethod::discover`].
pub type DiscoveryFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Link>>> + Send + 'a>>;

/// One way of finding descriptor links for an identifier.
///
/// Methods are stateless; everything they need per call arrives as arguments.
/// An empty link list is never a success: return an error instead.
///
/// The trait is dyn-compatible so the engine can hold heterogeneous methods
/// in its registry.
pub trait DiscoveryMethod<C>: Send + Sync {
    /// Stable name used in logs and failure reports (e.g. `"host-meta"`).
    fn name(&self) -> &str;

    /// Produce candidate links for a normalized identifier.
    fn discover<'a>(&'a self, fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a>;
}

impl<C, T: DiscoveryMethod<C> + ?Sized> DiscoveryMethod<C> for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn discover<'a>(&'a self, fetcher: &'a Fetcher<C>, identifier: &'a str) -> DiscoveryFuture<'a> {
        (**self).discover(fetcher, identifier)
    }
}

/// Ordered discovery methods, in two groups.
///
/// Primary methods run first, in registration order, then fallback methods
/// in registration order.
pub struct MethodRegistry<C> {
    primary: Vec<Arc<dyn DiscoveryMethod<C>>>,
    fallback: Vec<Arc<dyn DiscoveryMethod<C>>>,
}

impl<C> MethodRegistry<C> {
    /// Registry with no methods.
    pub fn empty() -> Self {
        Self {
            primary: Vec::new(),
            fallback: Vec::new(),
        }
    }

    /// Append a method to the primary group.
    pub fn register_primary(&mut self, method: impl DiscoveryMethod<C> + 'static) -> &mut Self {
        self.primary.push(Arc::new(method));
        self
    }

    /// Append a method to the fallback group.
    pub fn register_fallback(&mut self, method: impl DiscoveryMethod<C> + 'static) -> &mut Self {
        self.fallback.push(Arc::new(method));
        self
    }

    /// Methods in the order a lookup tries them.
    pub fn iter(&self) -> impl Iterator<Item = &dyn DiscoveryMethod<C>> {
        self.primary
            .iter()
            .chain(self.fallback.iter())
            .map(|method| &**method)
    }

    /// Method names in lookup order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|method| method.name()).collect()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.primary.len() + self.fallback.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> Default for MethodRegistry<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> Clone for MethodRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<C> std::fmt::Debug for MethodRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configurable resolver options.
///
/// - `request_timeout`: applied to every HTTP fetch; expiry fails the current
///   method only.
/// - `user_agent`: sent with every request when set.
/// - `descriptor_rel`: relation of the link that points at the descriptor
///   (`lrdd`).
/// - `require_describes`: when set, a fetched document must list the requested
///   identifier as its subject or an alias, otherwise the next method is tried.
#[derive(Debug, Clone, Builder)]
#[builder(start_fn = new)]
pub struct ResolverOptions {
    /// Per-request timeout
    pub request_timeout: Option<Duration>,
    /// `User-Agent` header value
    #[builder(into)]
    pub user_agent: Option<SmolStr>,
    /// Relation selecting the descriptor link
    #[builder(into, default = SmolStr::new_static(LRDD_REL))]
    pub descriptor_rel: SmolStr,
    /// Reject documents that do not describe the requested identifier
    #[builder(default)]
    pub require_describes: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::new()
            .request_timeout(DEFAULT_REQUEST_TIMEOUT)
            .user_agent(concat!("fingerpost/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}
