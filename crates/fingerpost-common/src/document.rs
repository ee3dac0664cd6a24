//! Resource descriptor model shared by the XRD and JRD wire forms.
//!
//! A [`DescriptorDocument`] describes one resource: its canonical `subject`,
//! any `aliases`, typed `properties`, and an ordered list of [`Link`]s. Link
//! order is significant: relation lookups return the first match in document
//! order, so parsers keep links exactly as they appear on the wire.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::template::apply_template;
use crate::{JRD_LEGACY_MEDIA_TYPE, JRD_MEDIA_TYPE, XRD_MEDIA_TYPE};

/// Property type URI → value. `None` is an explicit nil, distinct from absence.
pub type Properties = BTreeMap<SmolStr, Option<String>>;

/// Errors from parsing, building or serializing descriptor documents.
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    /// Syntactically invalid input for the chosen format
    #[error("malformed {format} document: {message}")]
    #[diagnostic(
        code(fingerpost_common::document::malformed),
        help("the server answered, but not with a usable XRD/JRD document")
    )]
    Malformed {
        /// `XRD` or `JRD`
        format: &'static str,
        /// Parser message
        message: String,
    },
    /// Neither the media type nor the content identified a known format
    #[error("unrecognized descriptor format (media type {0:?})")]
    #[diagnostic(
        code(fingerpost_common::document::unknown_format),
        help("expected application/jrd+json, application/json or application/xrd+xml")
    )]
    UnknownFormat(Option<String>),
    /// A link was built without a relation
    #[error("invalid link: {0}")]
    #[diagnostic(code(fingerpost_common::document::invalid_link))]
    InvalidLink(&'static str),
    /// Writing the wire form failed
    #[error("failed to serialize {format} document: {message}")]
    #[diagnostic(code(fingerpost_common::document::serialize))]
    Serialize {
        /// `XRD` or `JRD`
        format: &'static str,
        /// Writer message
        message: String,
    },
}

impl DocumentError {
    pub(crate) fn malformed(format: &'static str, message: impl Display) -> Self {
        Self::Malformed {
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn serialize(format: &'static str, message: impl Display) -> Self {
        Self::Serialize {
            format,
            message: message.to_string(),
        }
    }
}

/// Wire format of a descriptor document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// XML Resource Descriptor
    Xrd,
    /// JSON Resource Descriptor
    Jrd,
}

impl DocumentFormat {
    /// Map a `Content-Type`/link `type` value to a format, ignoring parameters.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            JRD_MEDIA_TYPE | JRD_LEGACY_MEDIA_TYPE => Some(Self::Jrd),
            XRD_MEDIA_TYPE | "application/xml" | "text/xml" => Some(Self::Xrd),
            _ => None,
        }
    }

    /// Guess from the first non-whitespace byte.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let first = bytes
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF)?;
        match first {
            b'{' => Some(Self::Jrd),
            b'<' => Some(Self::Xrd),
            _ => None,
        }
    }

    /// Preferred media type for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Xrd => XRD_MEDIA_TYPE,
            Self::Jrd => JRD_MEDIA_TYPE,
        }
    }
}

/// A typed link inside a descriptor document.
///
/// Build with [`Link::builder`]. Both `href` and `template` may be stored;
/// [`Link::target`] prefers the template when resolving a concrete URL, and the
/// wire writers only emit `template` for links without an `href`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub(crate) rel: SmolStr,
    pub(crate) media_type: Option<SmolStr>,
    pub(crate) href: Option<String>,
    pub(crate) template: Option<String>,
    pub(crate) titles: BTreeMap<SmolStr, String>,
    pub(crate) properties: Properties,
}

impl Link {
    /// Start building a link with the given relation.
    pub fn builder(rel: impl Into<SmolStr>) -> LinkBuilder {
        LinkBuilder {
            link: Link {
                rel: rel.into(),
                media_type: None,
                href: None,
                template: None,
                titles: BTreeMap::new(),
                properties: Properties::new(),
            },
        }
    }

    /// Relation name or URI
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// Declared media type (`type` attribute)
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    #[allow(missing_docs)]
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// URL template carrying a `{uri}` placeholder
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Titles keyed by language tag; `""` means no language.
    pub fn titles(&self) -> &BTreeMap<SmolStr, String> {
        &self.titles
    }

    /// Title for `lang`, falling back to the untagged title.
    pub fn title(&self, lang: &str) -> Option<&str> {
        self.titles
            .get(lang)
            .or_else(|| self.titles.get(""))
            .map(String::as_str)
    }

    #[allow(missing_docs)]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Concrete URL this link points at for `uri`: the filled-in template if
    /// there is one, else `href`.
    pub fn target(&self, uri: &str) -> Option<String> {
        match (&self.template, &self.href) {
            (Some(template), _) => Some(apply_template(template, uri)),
            (None, Some(href)) => Some(href.clone()),
            (None, None) => None,
        }
    }

    /// Copy of this link with `href` replaced.
    pub fn with_href(&self, href: impl Into<String>) -> Link {
        Link {
            href: Some(href.into()),
            ..self.clone()
        }
    }
}

/// Builder for [`Link`].
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    link: Link,
}

impl LinkBuilder {
    #[allow(missing_docs)]
    pub fn media_type(mut self, media_type: impl Into<SmolStr>) -> Self {
        self.link.media_type = Some(media_type.into());
        self
    }

    #[allow(missing_docs)]
    pub fn href(mut self, href: impl Into<String>) -> Self {
        self.link.href = Some(href.into());
        self
    }

    #[allow(missing_docs)]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.link.template = Some(template.into());
        self
    }

    /// Add a title; use `""` for no language.
    pub fn title(mut self, lang: impl Into<SmolStr>, title: impl Into<String>) -> Self {
        self.link.titles.insert(lang.into(), title.into());
        self
    }

    /// Add a property; `None` is an explicit nil.
    pub fn property(mut self, r#type: impl Into<SmolStr>, value: Option<String>) -> Self {
        self.link.properties.insert(r#type.into(), value);
        self
    }

    /// Finish the link. The relation must not be blank.
    pub fn build(mut self) -> Result<Link, DocumentError> {
        let rel = SmolStr::new(self.link.rel.trim());
        if rel.is_empty() {
            return Err(DocumentError::InvalidLink("relation must not be empty"));
        }
        self.link.rel = rel;
        Ok(self.link)
    }
}

/// A discovered resource descriptor (XRD or JRD).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorDocument {
    pub(crate) id: Option<SmolStr>,
    pub(crate) expires: Option<DateTime<Utc>>,
    pub(crate) subject: Option<String>,
    pub(crate) aliases: Vec<String>,
    pub(crate) properties: Properties,
    pub(crate) links: Vec<Link>,
}

impl DescriptorDocument {
    /// Start building a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// Parse either wire form. The media type wins when it names a known
    /// format; otherwise the content is sniffed.
    pub fn from_bytes(bytes: &[u8], media_type: Option<&str>) -> Result<Self, DocumentError> {
        let format = media_type
            .and_then(DocumentFormat::from_media_type)
            .or_else(|| DocumentFormat::sniff(bytes))
            .ok_or_else(|| DocumentError::UnknownFormat(media_type.map(str::to_string)))?;
        match format {
            DocumentFormat::Xrd => Self::from_xrd(bytes),
            DocumentFormat::Jrd => Self::from_jrd(bytes),
        }
    }

    /// Serialize in the given wire form.
    pub fn to_format(&self, format: DocumentFormat) -> Result<Vec<u8>, DocumentError> {
        match format {
            DocumentFormat::Xrd => self.to_xrd(),
            DocumentFormat::Jrd => self.to_jrd(),
        }
    }

    /// Opaque document identifier (`xml:id`)
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[allow(missing_docs)]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// True once `now` has reached the document's expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    #[allow(missing_docs)]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[allow(missing_docs)]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    #[allow(missing_docs)]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// All links in document order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Consume the document, keeping only its links.
    pub fn into_links(self) -> Vec<Link> {
        self.links
    }

    /// Whether this document describes `uri` (subject or alias, exact match).
    pub fn describes(&self, uri: &str) -> bool {
        self.subject.as_deref() == Some(uri) || self.aliases.iter().any(|alias| alias == uri)
    }

    /// First link for `rel`, see [`get_all`](Self::get_all) for type matching.
    pub fn get(&self, rel: &str, media_type: Option<&str>, type_fallback: bool) -> Option<&Link> {
        self.get_all(rel, media_type, type_fallback).into_iter().next()
    }

    /// Links for `rel` in document order.
    ///
    /// Without a requested type every link of the relation matches. With one,
    /// exact type matches are returned; only when there are none, and
    /// `type_fallback` is set, are links without any type returned instead.
    /// Exact matches always shadow untyped links.
    pub fn get_all(&self, rel: &str, media_type: Option<&str>, type_fallback: bool) -> Vec<&Link> {
        let candidates = self.links.iter().filter(|link| link.rel == rel);
        let Some(wanted) = media_type else {
            return candidates.collect();
        };
        let mut exact = Vec::new();
        let mut untyped = Vec::new();
        for link in candidates {
            match link.media_type.as_deref() {
                Some(ty) if ty == wanted => exact.push(link),
                None if type_fallback => untyped.push(link),
                _ => {}
            }
        }
        if exact.is_empty() { untyped } else { exact }
    }
}

/// Builder for [`DescriptorDocument`].
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    doc: DescriptorDocument,
}

impl DocumentBuilder {
    #[allow(missing_docs)]
    pub fn id(mut self, id: impl Into<SmolStr>) -> Self {
        self.doc.id = Some(id.into());
        self
    }

    #[allow(missing_docs)]
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.doc.expires = Some(expires);
        self
    }

    #[allow(missing_docs)]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.doc.subject = Some(subject.into());
        self
    }

    /// Add an alias; repeats are ignored.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.doc.aliases.contains(&alias) {
            self.doc.aliases.push(alias);
        }
        self
    }

    /// Add a property; `None` is an explicit nil.
    pub fn property(mut self, r#type: impl Into<SmolStr>, value: Option<String>) -> Self {
        self.doc.properties.insert(r#type.into(), value);
        self
    }

    /// Append a link, keeping insertion order.
    pub fn link(mut self, link: Link) -> Self {
        self.doc.links.push(link);
        self
    }

    #[allow(missing_docs)]
    pub fn build(self) -> DescriptorDocument {
        self.doc
    }
}
