//! # Fingerpost
//!
//! Find out where a federated identity describes itself.
//!
//! Given `alice@example.com`, `acct:alice@example.com` or a profile URL,
//! Fingerpost walks WebFinger, host-meta, HTTP `Link` headers and HTML
//! `<link>` elements until it finds the identity's resource descriptor (an
//! XRD or JRD document), then hands it back parsed.
//!
//! ```no_run
//! # async fn example() -> miette::Result<()> {
//! use fingerpost::{Discoverer, PROFILE_PAGE_REL};
//!
//! let doc = Discoverer::default().lookup("alice@example.com").await?;
//! if let Some(profile) = doc.get(PROFILE_PAGE_REL, Some("text/html"), true) {
//!     println!("profile page: {:?}", profile.href());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The pieces live in their own crates and are re-exported here:
//!
//! - [`common`]: identifiers, descriptor documents and their XRD/JRD forms,
//!   and the [`HttpClient`](common::http_client::HttpClient) seam
//! - [`discovery`]: discovery methods and the lookup engine
//!
//! The `cli` feature (on by default) builds the `fingerpost` binary.

#![warn(missing_docs)]

pub use fingerpost_common as common;
pub use fingerpost_discovery as discovery;

pub use fingerpost_common::{
    DescriptorDocument, DocumentError, Identifier, IdentifierError, JRD_MEDIA_TYPE, LRDD_REL,
    Link, PROFILE_PAGE_REL, SELF_REL, XRD_MEDIA_TYPE, apply_template, is_acct_uri, normalize,
};
pub use fingerpost_common::document::DocumentFormat;
pub use fingerpost_discovery::resolver::{
    DiscoveryError, DiscoveryMethod, LookupError, MethodFailure, MethodRegistry, ResolverOptions,
};
pub use fingerpost_discovery::{Discoverer, PublicDiscoverer};

#[cfg(feature = "cli")]
pub mod cli;
