//! Common types for the Fingerpost discovery stack
//!
//! - [`identifier`]: normalization and classification of `acct:`, bare `user@host`
//!   and HTTP(S) identifiers
//! - [`document`]: the resource descriptor model ([`DescriptorDocument`], [`Link`])
//!   with its XRD ([`xrd`]) and JRD ([`jrd`]) wire forms
//! - [`template`]: `{uri}` template substitution for LRDD links
//! - [`http_client`]: the minimal HTTP abstraction every fetch goes through

#![warn(missing_docs)]
pub use smol_str;
pub use url;

/// Resource descriptor documents and links.
pub mod document;
pub mod error;
/// HTTP client abstraction used by fingerpost crates.
pub mod http_client;
pub mod identifier;
pub mod jrd;
pub mod template;
pub mod xrd;

pub use document::{DescriptorDocument, DocumentError, Link};
pub use identifier::{Identifier, IdentifierError, is_acct_uri, normalize};
pub use template::apply_template;

/// `application/jrd+json`, the preferred descriptor media type.
pub const JRD_MEDIA_TYPE: &str = "application/jrd+json";
/// `application/json`, served by older JRD endpoints.
pub const JRD_LEGACY_MEDIA_TYPE: &str = "application/json";
/// `application/xrd+xml`
pub const XRD_MEDIA_TYPE: &str = "application/xrd+xml";

/// Link-based Resource Descriptor Discovery relation.
pub const LRDD_REL: &str = "lrdd";
/// Relation pointing at the resource itself (e.g. an ActivityPub actor).
pub const SELF_REL: &str = "self";
/// WebFinger profile page relation.
pub const PROFILE_PAGE_REL: &str = "http://webfinger.net/rel/profile-page";
