//! JRD (JSON) wire form, as served by WebFinger (RFC 7033).
//!
//! Nil properties are written as JSON `null`; absent properties are simply not
//! present. The untagged link title uses the key `"default"`.
//!
//! Parsing is lenient below the top level: aliases, titles and property
//! values that are not strings (or `null` for properties) are dropped, and a
//! link entry that cannot be read is skipped.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::document::{DescriptorDocument, DocumentError, Link, Properties};
use crate::xrd::parse_expires;

const FORMAT: &str = "JRD";
const DEFAULT_TITLE_KEY: &str = "default";

#[derive(Debug, Default, Serialize, Deserialize)]
struct JrdWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    aliases: Vec<String>,
    #[serde(
        default,
        deserialize_with = "property_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    properties: Properties,
    #[serde(
        default,
        deserialize_with = "readable_links",
        skip_serializing_if = "Vec::is_empty"
    )]
    links: Vec<JrdLinkWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JrdLinkWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rel: Option<SmolStr>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    media_type: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(
        default,
        deserialize_with = "title_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    titles: BTreeMap<SmolStr, String>,
    #[serde(
        default,
        deserialize_with = "property_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    properties: Properties,
}

fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect())
}

fn title_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<SmolStr, String>, D::Error> {
    let values = Option::<BTreeMap<SmolStr, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|(lang, value)| match value {
            Value::String(title) => Some((lang, title)),
            _ => None,
        })
        .collect())
}

fn property_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Properties, D::Error> {
    let values = Option::<BTreeMap<SmolStr, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|(ty, value)| match value {
            Value::String(s) => Some((ty, Some(s))),
            Value::Null => Some((ty, None)),
            _ => None,
        })
        .collect())
}

fn readable_links<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<JrdLinkWire>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

impl DescriptorDocument {
    /// Parse a JRD document.
    pub fn from_jrd(bytes: &[u8]) -> Result<Self, DocumentError> {
        let wire: JrdWire =
            serde_json::from_slice(bytes).map_err(|e| DocumentError::malformed(FORMAT, e))?;

        let mut doc = DescriptorDocument::builder();
        if let Some(expires) = wire.expires {
            let expires = parse_expires(&expires).map_err(|_| {
                DocumentError::malformed(FORMAT, format!("bad expires `{expires}`"))
            })?;
            doc = doc.expires(expires);
        }
        if let Some(subject) = wire.subject {
            doc = doc.subject(subject);
        }
        for alias in wire.aliases {
            doc = doc.alias(alias);
        }
        for (ty, value) in wire.properties {
            doc = doc.property(ty, value);
        }
        for link in wire.links {
            if let Some(link) = link_from_wire(link) {
                doc = doc.link(link);
            }
        }
        Ok(doc.build())
    }

    /// Serialize as a (pretty-printed) JRD document.
    pub fn to_jrd(&self) -> Result<Vec<u8>, DocumentError> {
        let wire = JrdWire {
            expires: self
                .expires
                .map(|e| e.to_rfc3339_opts(SecondsFormat::Secs, true)),
            subject: self.subject.clone(),
            aliases: self.aliases.clone(),
            properties: self.properties.clone(),
            links: self.links.iter().map(link_to_wire).collect(),
        };
        serde_json::to_vec_pretty(&wire).map_err(|e| DocumentError::serialize(FORMAT, e))
    }
}

fn link_from_wire(wire: JrdLinkWire) -> Option<Link> {
    let mut builder = Link::builder(wire.rel?);
    if let Some(ty) = wire.media_type {
        builder = builder.media_type(ty);
    }
    match (wire.href, wire.template) {
        (Some(href), _) => builder = builder.href(href),
        (None, Some(template)) => builder = builder.template(template),
        (None, None) => {}
    }
    for (lang, title) in wire.titles {
        let lang = if lang == DEFAULT_TITLE_KEY {
            SmolStr::default()
        } else {
            lang
        };
        builder = builder.title(lang, title);
    }
    for (ty, value) in wire.properties {
        builder = builder.property(ty, value);
    }
    builder.build().ok()
}

fn link_to_wire(link: &Link) -> JrdLinkWire {
    let (href, template) = match (&link.href, &link.template) {
        (Some(href), _) => (Some(href.clone()), None),
        (None, template) => (None, template.clone()),
    };
    JrdLinkWire {
        rel: Some(link.rel.clone()),
        media_type: link.media_type.clone(),
        href,
        template,
        titles: link
            .titles
            .iter()
            .map(|(lang, title)| {
                let key = if lang.is_empty() {
                    SmolStr::new_static(DEFAULT_TITLE_KEY)
                } else {
                    lang.clone()
                };
                (key, title.clone())
            })
            .collect(),
        properties: link.properties.clone(),
    }
}
