//! LRDD URL templates.
//!
//! Only the `{uri}` placeholder is defined. Every occurrence is replaced by the
//! percent-encoded identifier; any other brace sequence is left as written.

/// The one placeholder LRDD templates support.
pub const URI_PLACEHOLDER: &str = "{uri}";

/// Substitute `{uri}` in `template` with the percent-encoded `uri`.
///
/// ```
/// use fingerpost_common::apply_template;
/// assert_eq!(
///     apply_template("https://h/.well-known/webfinger?resource={uri}", "acct:a@h"),
///     "https://h/.well-known/webfinger?resource=acct%3Aa%40h"
/// );
/// ```
pub fn apply_template(template: &str, uri: &str) -> String {
    template.replace(URI_PLACEHOLDER, &urlencoding::encode(uri))
}
