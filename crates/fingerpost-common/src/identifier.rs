//! Identifier normalization and classification.
//!
//! Users type all sorts of things into a "remote follow" box. Discovery works on
//! two shapes only: `acct:user@host` URIs and absolute HTTP(S) URLs. A bare
//! `user@host` is promoted to `acct:`; anything else passes through untouched
//! and is left for the individual discovery methods to accept or reject.

use std::fmt;
use std::sync::LazyLock;

use miette::Diagnostic;
use percent_encoding::percent_decode_str;
use regex::Regex;
use smol_str::SmolStr;
use thiserror::Error;
use url::Url;

static SCHEME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

static USER_AT_HOST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap());

/// Errors produced while normalizing or classifying an identifier.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum IdentifierError {
    #[error("no resource given")]
    #[diagnostic(
        code(fingerpost_common::identifier::empty),
        help("pass an acct: URI, a user@host handle or an http(s) URL")
    )]
    Empty,
    #[error("malformed acct: URI `{0}`")]
    #[diagnostic(
        code(fingerpost_common::identifier::malformed_acct),
        help("expected acct:user@host")
    )]
    MalformedAcct(String),
    #[error("unsupported identifier scheme in `{0}`")]
    #[diagnostic(
        code(fingerpost_common::identifier::unsupported_scheme),
        help("supported schemes: acct, http, https")
    )]
    UnsupportedScheme(String),
    #[error("invalid URL `{input}`: {error}")]
    #[diagnostic(code(fingerpost_common::identifier::url))]
    Url {
        input: String,
        #[source]
        error: url::ParseError,
    },
}

/// Normalize raw user input into the form discovery works on.
///
/// - surrounding whitespace is ignored; nothing left is an error
/// - scheme-less `user@host` becomes `acct:user@host`; input with more than
///   one `@` has no single host and is not promoted
/// - everything else is returned unchanged
///
/// ```
/// use fingerpost_common::normalize;
/// assert_eq!(normalize("alice@example.com").unwrap(), "acct:alice@example.com");
/// assert_eq!(normalize("https://example.com/alice").unwrap(), "https://example.com/alice");
/// ```
pub fn normalize(input: &str) -> Result<String, IdentifierError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if !SCHEME_REGEX.is_match(input) && USER_AT_HOST_REGEX.is_match(input) {
        return Ok(format!("acct:{input}"));
    }
    Ok(input.to_string())
}

/// True if `s` starts with `acct:` (case-insensitive).
pub fn is_acct_uri(s: &str) -> bool {
    s.get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("acct:"))
        .unwrap_or(false)
}

/// The two parts of an `acct:user@host` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcctUri {
    /// Percent-decoded user part
    pub user: String,
    /// Host, possibly with a `:port` suffix
    pub host: SmolStr,
}

impl AcctUri {
    /// Parse an `acct:` URI, splitting on the first `@`.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if !is_acct_uri(s) {
            return Err(IdentifierError::MalformedAcct(s.to_string()));
        }
        let rest = &s[5..];
        let (user, host) = rest
            .split_once('@')
            .ok_or_else(|| IdentifierError::MalformedAcct(s.to_string()))?;
        if user.is_empty() || host.is_empty() || host.contains(['/', '?', '#', '@']) {
            return Err(IdentifierError::MalformedAcct(s.to_string()));
        }
        Ok(Self {
            user: percent_decode_str(user).decode_utf8_lossy().into_owned(),
            host: SmolStr::new(host.to_ascii_lowercase()),
        })
    }
}

impl fmt::Display for AcctUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}@{}", self.user, self.host)
    }
}

/// A normalized identifier, classified by what discovery can do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// `acct:user@host`
    Acct(AcctUri),
    /// Absolute `http:` or `https:` URL
    Http(Url),
}

impl Identifier {
    /// Classify an already normalized identifier.
    pub fn parse(normalized: &str) -> Result<Self, IdentifierError> {
        if normalized.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if is_acct_uri(normalized) {
            return AcctUri::parse(normalized).map(Identifier::Acct);
        }
        let url = Url::parse(normalized).map_err(|error| IdentifierError::Url {
            input: normalized.to_string(),
            error,
        })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(Identifier::Http(url)),
            _ => Err(IdentifierError::UnsupportedScheme(normalized.to_string())),
        }
    }

    /// The host this identifier lives on (with port for URLs that carry one).
    pub fn host(&self) -> Option<String> {
        match self {
            Identifier::Acct(acct) => Some(acct.host.to_string()),
            Identifier::Http(url) => url.host_str().map(|h| match url.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            }),
        }
    }
}
