//! XRD 1.0 (XML) wire form.
//!
//! Parsing is driven by element local names so namespace prefixes do not
//! matter; unknown elements and attributes are skipped. A `template` is only
//! read when the `Link` has no `href`.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use smol_str::SmolStr;

use crate::document::{DescriptorDocument, DocumentBuilder, DocumentError, Link, Properties};

/// XRD 1.0 namespace
pub const XRD_NAMESPACE: &str = "http://docs.oasis-open.org/ns/xri/xrd-1.0";
/// XML Schema instance namespace, used for `xsi:nil`
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

const FORMAT: &str = "XRD";

impl DescriptorDocument {
    /// Parse an XRD document.
    pub fn from_xrd(bytes: &[u8]) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::malformed(FORMAT, e))?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut parser = XrdParser::default();
        loop {
            match reader
                .read_event()
                .map_err(|e| DocumentError::malformed(FORMAT, e))?
            {
                Event::Start(e) => parser.open(&e)?,
                Event::Empty(e) => {
                    parser.open(&e)?;
                    parser.close()?;
                }
                Event::End(_) => parser.close()?,
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| DocumentError::malformed(FORMAT, e))?;
                    parser.text(&text);
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|e| DocumentError::malformed(FORMAT, e))?;
                    parser.text(text);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        parser.finish()
    }

    /// Serialize as an XRD document.
    pub fn to_xrd(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;

        let mut root = BytesStart::new("XRD");
        root.push_attribute(("xmlns", XRD_NAMESPACE));
        if self.has_nil_property() {
            root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        }
        if let Some(id) = &self.id {
            root.push_attribute(("xml:id", id.as_str()));
        }
        emit(&mut writer, Event::Start(root))?;

        if let Some(expires) = &self.expires {
            let stamp = expires.to_rfc3339_opts(SecondsFormat::Secs, true);
            text_element(&mut writer, BytesStart::new("Expires"), &stamp)?;
        }
        if let Some(subject) = &self.subject {
            text_element(&mut writer, BytesStart::new("Subject"), subject)?;
        }
        for alias in &self.aliases {
            text_element(&mut writer, BytesStart::new("Alias"), alias)?;
        }
        write_properties(&mut writer, &self.properties)?;
        for link in &self.links {
            write_link(&mut writer, link)?;
        }

        emit(&mut writer, Event::End(BytesEnd::new("XRD")))?;
        Ok(writer.into_inner())
    }

    fn has_nil_property(&self) -> bool {
        self.properties.values().any(Option::is_none)
            || self
                .links
                .iter()
                .any(|link| link.properties.values().any(Option::is_none))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::serialize(FORMAT, e))
}

fn text_element(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), DocumentError> {
    let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(end))
}

fn write_properties(
    writer: &mut Writer<Vec<u8>>,
    properties: &Properties,
) -> Result<(), DocumentError> {
    for (ty, value) in properties {
        let mut start = BytesStart::new("Property");
        start.push_attribute(("type", ty.as_str()));
        match value {
            Some(value) => text_element(writer, start, value)?,
            None => {
                start.push_attribute(("xsi:nil", "true"));
                emit(writer, Event::Empty(start))?;
            }
        }
    }
    Ok(())
}

fn write_link(writer: &mut Writer<Vec<u8>>, link: &Link) -> Result<(), DocumentError> {
    let mut start = BytesStart::new("Link");
    start.push_attribute(("rel", link.rel.as_str()));
    if let Some(ty) = &link.media_type {
        start.push_attribute(("type", ty.as_str()));
    }
    match (&link.href, &link.template) {
        (Some(href), _) => start.push_attribute(("href", href.as_str())),
        (None, Some(template)) => start.push_attribute(("template", template.as_str())),
        (None, None) => {}
    }
    if link.titles.is_empty() && link.properties.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    for (lang, title) in &link.titles {
        let mut title_start = BytesStart::new("Title");
        if !lang.is_empty() {
            title_start.push_attribute(("xml:lang", lang.as_str()));
        }
        text_element(writer, title_start, title)?;
    }
    write_properties(writer, &link.properties)?;
    emit(writer, Event::End(BytesEnd::new("Link")))
}

enum Field {
    Subject,
    Alias,
    Expires,
    Property { ty: SmolStr, nil: bool, in_link: bool },
    Title { lang: SmolStr },
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct PendingLink {
    rel: Option<SmolStr>,
    media_type: Option<SmolStr>,
    href: Option<String>,
    template: Option<String>,
    titles: Vec<(SmolStr, String)>,
    properties: Vec<(SmolStr, Option<String>)>,
}

impl PendingLink {
    fn build(self) -> Option<Link> {
        let mut builder = Link::builder(self.rel?);
        if let Some(ty) = self.media_type {
            builder = builder.media_type(ty);
        }
        match (self.href, self.template) {
            (Some(href), _) => builder = builder.href(href),
            (None, Some(template)) => builder = builder.template(template),
            (None, None) => {}
        }
        for (lang, title) in self.titles {
            builder = builder.title(lang, title);
        }
        for (ty, value) in self.properties {
            builder = builder.property(ty, value);
        }
        builder.build().ok()
    }
}

/// Depth-tracking event sink. `depth` counts currently open elements.
#[derive(Default)]
struct XrdParser {
    doc: DocumentBuilder,
    depth: usize,
    seen_root: bool,
    link: Option<PendingLink>,
    capture: Option<Capture>,
}

impl XrdParser {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), DocumentError> {
        let name = e.local_name();
        let name = name.as_ref();
        match self.depth {
            0 => {
                if self.seen_root {
                    return Err(DocumentError::malformed(FORMAT, "multiple root elements"));
                }
                if name != b"XRD" {
                    return Err(DocumentError::malformed(
                        FORMAT,
                        format!(
                            "root element is <{}>, expected <XRD>",
                            String::from_utf8_lossy(name)
                        ),
                    ));
                }
                self.seen_root = true;
                if let Some(id) = attribute(e, b"xml:id")? {
                    self.doc = std::mem::take(&mut self.doc).id(id);
                }
            }
            1 => {
                let field = match name {
                    b"Subject" => Some(Field::Subject),
                    b"Alias" => Some(Field::Alias),
                    b"Expires" => Some(Field::Expires),
                    b"Property" => property_field(e, false)?,
                    b"Link" => {
                        self.link = Some(PendingLink {
                            rel: attribute(e, b"rel")?.map(SmolStr::from),
                            media_type: attribute(e, b"type")?.map(SmolStr::from),
                            href: attribute(e, b"href")?,
                            template: attribute(e, b"template")?,
                            ..Default::default()
                        });
                        None
                    }
                    _ => None,
                };
                self.begin_capture(field);
            }
            2 if self.link.is_some() => {
                let field = match name {
                    b"Title" => Some(Field::Title {
                        lang: attribute(e, b"xml:lang")?
                            .map(SmolStr::from)
                            .unwrap_or_default(),
                    }),
                    b"Property" => property_field(e, true)?,
                    _ => None,
                };
                self.begin_capture(field);
            }
            _ => {}
        }
        self.depth += 1;
        Ok(())
    }

    fn begin_capture(&mut self, field: Option<Field>) {
        if let Some(field) = field {
            self.capture = Some(Capture {
                field,
                depth: self.depth,
                text: String::new(),
            });
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            if capture.depth + 1 == self.depth {
                capture.text.push_str(text);
            }
        }
    }

    fn close(&mut self) -> Result<(), DocumentError> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| DocumentError::malformed(FORMAT, "unbalanced end tag"))?;

        if self
            .capture
            .as_ref()
            .is_some_and(|capture| capture.depth == self.depth)
        {
            if let Some(capture) = self.capture.take() {
                self.finish_capture(capture)?;
            }
        } else if self.depth == 1 {
            if let Some(pending) = self.link.take() {
                match pending.build() {
                    Some(link) => self.doc = std::mem::take(&mut self.doc).link(link),
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("skipping XRD link without a relation");
                    }
                }
            }
        }
        Ok(())
    }

    fn finish_capture(&mut self, capture: Capture) -> Result<(), DocumentError> {
        let doc = std::mem::take(&mut self.doc);
        let text = capture.text;
        self.doc = match capture.field {
            Field::Subject => doc.subject(text),
            Field::Alias => doc.alias(text),
            Field::Expires => doc.expires(parse_expires(&text)?),
            Field::Property { ty, nil, in_link } => {
                let value = if nil { None } else { Some(text) };
                match self.link.as_mut() {
                    Some(link) if in_link => {
                        link.properties.push((ty, value));
                        doc
                    }
                    _ => doc.property(ty, value),
                }
            }
            Field::Title { lang } => {
                if let Some(link) = self.link.as_mut() {
                    link.titles.push((lang, text));
                }
                doc
            }
        };
        Ok(())
    }

    fn finish(self) -> Result<DescriptorDocument, DocumentError> {
        if !self.seen_root {
            return Err(DocumentError::malformed(FORMAT, "missing <XRD> root element"));
        }
        if self.depth != 0 {
            return Err(DocumentError::malformed(FORMAT, "unexpected end of document"));
        }
        Ok(self.doc.build())
    }
}

fn property_field(e: &BytesStart<'_>, in_link: bool) -> Result<Option<Field>, DocumentError> {
    let Some(ty) = attribute(e, b"type")? else {
        return Ok(None);
    };
    Ok(Some(Field::Property {
        ty: SmolStr::from(ty),
        nil: is_nil(e)?,
        in_link,
    }))
}

/// Value of the attribute whose qualified name is `key`.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, DocumentError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| DocumentError::malformed(FORMAT, e))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::malformed(FORMAT, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `xsi:nil="true"` under whatever prefix the document bound.
fn is_nil(e: &BytesStart<'_>) -> Result<bool, DocumentError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| DocumentError::malformed(FORMAT, e))?;
        if attr.key.local_name().as_ref() == b"nil" && attr.key.prefix().is_some() {
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::malformed(FORMAT, e))?;
            return Ok(matches!(value.trim(), "true" | "1"));
        }
    }
    Ok(false)
}

pub(crate) fn parse_expires(text: &str) -> Result<DateTime<Utc>, DocumentError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocumentError::malformed(FORMAT, format!("bad Expires `{text}`: {e}")))
}
