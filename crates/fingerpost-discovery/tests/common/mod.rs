#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fingerpost_common::http_client::HttpClient;
use fingerpost_discovery::Discoverer;
use fingerpost_discovery::resolver::ResolverOptions;
use http::{Method, Response as HttpResponse, StatusCode};
use tokio::sync::Mutex;

pub const XRD_TYPE: &str = "application/xrd+xml";
pub const JRD_TYPE: &str = "application/jrd+json";

/// What the mock does for a given method + URL.
#[derive(Clone)]
pub enum Route {
    Respond {
        status: StatusCode,
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    },
    /// Fail as if the connection was refused
    Refuse,
    /// Never answer (until the caller's timeout fires)
    Hang,
}

impl Route {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Route::Respond {
            status: StatusCode::OK,
            headers: vec![("content-type", content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Route::Respond {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        if let Route::Respond { headers, .. } = &mut self {
            headers.push((name, value.into()));
        }
        self
    }
}

#[derive(Clone, Default)]
pub struct MockClient {
    // Routes keyed by (method, absolute URL); anything else is a 404
    routes: Arc<Mutex<HashMap<(Method, String), Route>>>,
    // Capture requests for assertions
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    pub async fn route(&self, method: Method, url: &str, route: Route) {
        self.routes
            .lock()
            .await
            .insert((method, url.to_string()), route);
    }

    pub async fn requests(&self) -> Vec<(Method, String)> {
        self.log
            .lock()
            .await
            .iter()
            .map(|req| (req.method().clone(), req.uri().to_string()))
            .collect()
    }

    pub async fn take_log(&self) -> Vec<http::Request<Vec<u8>>> {
        let mut log = self.log.lock().await;
        let out = log.clone();
        log.clear();
        out
    }
}

impl HttpClient for MockClient {
    type Error = std::io::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let log = self.log.clone();
        let routes = self.routes.clone();
        async move {
            let key = (request.method().clone(), request.uri().to_string());
            log.lock().await.push(request);
            let route = routes
                .lock()
                .await
                .get(&key)
                .cloned()
                .unwrap_or(Route::status(StatusCode::NOT_FOUND));
            match route {
                Route::Respond {
                    status,
                    headers,
                    body,
                } => {
                    let mut builder = HttpResponse::builder().status(status);
                    for (name, value) in headers {
                        builder = builder.header(name, value);
                    }
                    Ok(builder.body(body).unwrap())
                }
                Route::Refuse => Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
                Route::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "hung"))
                }
            }
        }
    }
}

pub fn discoverer(mock: &MockClient) -> Discoverer<MockClient> {
    Discoverer::new(mock.clone(), ResolverOptions::default())
}

pub fn xrd(subject: &str, links: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">
  <Subject>{subject}</Subject>
  {links}
</XRD>"#
    )
}

pub fn host_meta(template: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">
  <Link rel="lrdd" type="application/xrd+xml" template="{template}"/>
</XRD>"#
    )
}

pub fn jrd(subject: &str) -> String {
    serde_json::json!({
        "subject": subject,
        "links": [{
            "rel": "http://webfinger.net/rel/profile-page",
            "type": "text/html",
            "href": "https://example.com/@alice"
        }]
    })
    .to_string()
}
