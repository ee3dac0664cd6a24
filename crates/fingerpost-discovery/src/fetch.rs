//! HTTP fetching on top of [`HttpClient`], with the resolver's timeout and
//! `User-Agent` applied to every request.

use std::time::Duration;

use bytes::Bytes;
use fingerpost_common::DescriptorDocument;
use fingerpost_common::document::DocumentFormat;
use fingerpost_common::error::TransportError;
use fingerpost_common::http_client::HttpClient;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use smol_str::SmolStr;
use url::Url;

use crate::resolver::{DiscoveryError, ResolverOptions, Result};

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// URL the request was sent to
    pub url: Url,
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl FetchedResponse {
    /// `Content-Type` without parameters, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| !ct.is_empty())
    }

    /// Turn non-2xx responses into [`DiscoveryError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(DiscoveryError::HttpStatus(self.status))
        }
    }

    /// Parse the body as a descriptor document.
    ///
    /// A recognizable `Content-Type` wins; otherwise `declared` (typically the
    /// media type of the link that led here) is used, and failing that the
    /// body is sniffed.
    pub fn document(&self, declared: Option<&str>) -> Result<DescriptorDocument> {
        let hint = self
            .content_type()
            .filter(|ct| DocumentFormat::from_media_type(ct).is_some())
            .or(declared);
        Ok(DescriptorDocument::from_bytes(&self.body, hint)?)
    }
}

/// Performs the HTTP requests discovery needs.
#[derive(Debug, Clone)]
pub struct Fetcher<C> {
    http: C,
    timeout: Option<Duration>,
    user_agent: Option<SmolStr>,
}

impl<C> Fetcher<C> {
    /// Wrap a client with the timeout and user agent from `opts`.
    pub fn new(http: C, opts: &ResolverOptions) -> Self {
        Self {
            http,
            timeout: opts.request_timeout,
            user_agent: opts.user_agent.clone(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.http
    }
}

impl<C: HttpClient + Sync> Fetcher<C> {
    /// `GET` a URL, optionally with an `Accept` header.
    pub async fn get(&self, url: &Url, accept: Option<&str>) -> Result<FetchedResponse> {
        self.fetch(Method::GET, url, accept).await
    }

    /// `HEAD` a URL.
    pub async fn head(&self, url: &Url) -> Result<FetchedResponse> {
        self.fetch(Method::HEAD, url, None).await
    }

    async fn fetch(&self, method: Method, url: &Url, accept: Option<&str>) -> Result<FetchedResponse> {
        let mut builder = http::Request::builder()
            .method(method.clone())
            .uri(url.as_str());
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.header(USER_AGENT, ua.as_str());
        }
        let request = builder.body(Vec::new()).map_err(TransportError::from)?;

        let pending = self.http.send_http(request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => pending.await,
        }
        .map_err(transport_error)?;

        let (parts, body) = response.into_parts();
        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %url, status = %parts.status, bytes = body.len(), "fetched");

        Ok(FetchedResponse {
            url: url.clone(),
            status: parts.status,
            headers: parts.headers,
            body: Bytes::from(body),
        })
    }
}

/// Classify a client error, keeping reqwest's distinctions where we can see them.
fn transport_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> TransportError {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
    match boxed.downcast::<reqwest::Error>() {
        Ok(e) => TransportError::from(*e),
        Err(other) => TransportError::Other(other),
    }
}
