//! Command-line interface for the `fingerpost` binary.

use std::fmt::Write as _;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use fingerpost_common::http_client::HttpClient;
use fingerpost_discovery::methods::{HostMeta, LinkHeader, LinkHtml, WebFinger};

use crate::{DescriptorDocument, DocumentError, DocumentFormat, MethodRegistry, ResolverOptions};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find the resource descriptor (XRD/JRD) for a federated identity",
    long_about = None
)]
pub struct Args {
    /// acct: URI, user@host handle, or http(s) URL
    pub identifier: String,

    /// How to print the document
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u64,

    /// Only accept documents whose subject or aliases include the identifier
    #[arg(long)]
    pub require_describes: bool,

    /// Discovery methods to try, comma separated (default: all)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub methods: Vec<MethodName>,

    /// Relation of the link that points at the descriptor
    #[arg(long, default_value = fingerpost_common::LRDD_REL)]
    pub rel: String,
}

/// Output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Resource Descriptor
    Jrd,
    /// XML Resource Descriptor
    Xrd,
    /// Human-readable listing
    Summary,
}

/// Built-in discovery methods, as named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[allow(missing_docs)]
pub enum MethodName {
    Webfinger,
    HostMeta,
    LinkHeader,
    LinkHtml,
}

impl Args {
    /// Resolver options from the flags.
    pub fn options(&self) -> ResolverOptions {
        ResolverOptions::new()
            .request_timeout(Duration::from_secs(self.timeout))
            .user_agent(concat!("fingerpost/", env!("CARGO_PKG_VERSION")))
            .descriptor_rel(self.rel.as_str())
            .require_describes(self.require_describes)
            .build()
    }

    /// The method chain to run: everything by default, otherwise the listed
    /// methods in order, with WebFinger (if listed) as the primary method.
    pub fn registry<C: HttpClient + Sync>(&self) -> MethodRegistry<C> {
        if self.methods.is_empty() {
            return MethodRegistry::standard();
        }
        let mut registry = MethodRegistry::empty();
        for method in &self.methods {
            match method {
                MethodName::Webfinger => registry.register_primary(WebFinger),
                MethodName::HostMeta => registry.register_fallback(HostMeta),
                MethodName::LinkHeader => registry.register_fallback(LinkHeader),
                MethodName::LinkHtml => registry.register_fallback(LinkHtml),
            };
        }
        registry
    }
}

/// Render a document for printing.
pub fn render(doc: &DescriptorDocument, format: OutputFormat) -> Result<String, DocumentError> {
    match format {
        OutputFormat::Jrd => wire(doc, DocumentFormat::Jrd),
        OutputFormat::Xrd => wire(doc, DocumentFormat::Xrd),
        OutputFormat::Summary => {
            let mut out = String::new();
            write_summary(&mut out, doc).expect("Failed to write summary");
            Ok(out)
        }
    }
}

fn wire(doc: &DescriptorDocument, format: DocumentFormat) -> Result<String, DocumentError> {
    let bytes = doc.to_format(format)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_summary(out: &mut String, doc: &DescriptorDocument) -> std::fmt::Result {
    writeln!(out, "subject: {}", doc.subject().unwrap_or("(none)"))?;
    if let Some(expires) = doc.expires() {
        writeln!(out, "expires: {}", expires.to_rfc3339())?;
    }
    for alias in doc.aliases() {
        writeln!(out, "alias:   {alias}")?;
    }
    for (ty, value) in doc.properties() {
        writeln!(out, "property {ty} = {}", value.as_deref().unwrap_or("(nil)"))?;
    }
    for link in doc.links() {
        write!(out, "link {}", link.rel())?;
        if let Some(ty) = link.media_type() {
            write!(out, " [{ty}]")?;
        }
        match (link.href(), link.template()) {
            (Some(href), _) => writeln!(out, " -> {href}")?,
            (None, Some(template)) => writeln!(out, " -> template {template}")?,
            (None, None) => writeln!(out)?,
        }
        for (lang, title) in link.titles() {
            let lang = if lang.is_empty() { "default" } else { lang.as_str() };
            writeln!(out, "  title ({lang}): {title}")?;
        }
        for (ty, value) in link.properties() {
            writeln!(out, "  property {ty} = {}", value.as_deref().unwrap_or("(nil)"))?;
        }
    }
    Ok(())
}
