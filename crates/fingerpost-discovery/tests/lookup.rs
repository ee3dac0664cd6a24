mod common;

use std::time::Duration;

use common::*;
use fingerpost_common::Link;
use fingerpost_common::error::TransportError;
use fingerpost_discovery::Discoverer;
use fingerpost_discovery::fetch::Fetcher;
use fingerpost_discovery::resolver::{
    DiscoveryError, DiscoveryFuture, DiscoveryMethod, LookupError, ResolverOptions,
};
use http::{Method, StatusCode};
use tokio_util::sync::CancellationToken;

const WEBFINGER_URL: &str =
    "https://example.com/.well-known/webfinger?resource=acct%3Aalice%40example.com";
const HOST_META_HTTPS: &str = "https://example.com/.well-known/host-meta";
const HOST_META_HTTP: &str = "http://example.com/.well-known/host-meta";
const DESCRIBE_URL: &str = "https://example.com/describe?uri=acct%3Aalice%40example.com";

#[tokio::test]
async fn webfinger_answers_first() {
    let mock = MockClient::default();
    mock.route(
        Method::GET,
        WEBFINGER_URL,
        Route::ok(JRD_TYPE, jrd("acct:alice@example.com")),
    )
    .await;

    let doc = discoverer(&mock).lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
    assert_eq!(doc.links()[0].href(), Some("https://example.com/@alice"));

    let log = mock.take_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].headers()["accept"], "application/jrd+json");
    assert!(
        log[0].headers()["user-agent"]
            .to_str()
            .unwrap()
            .starts_with("fingerpost/")
    );
}

#[tokio::test]
async fn shared_client() {
    let mock = MockClient::default();
    mock.route(
        Method::GET,
        WEBFINGER_URL,
        Route::ok(JRD_TYPE, jrd("acct:alice@example.com")),
    )
    .await;

    let discoverer = Discoverer::new(std::sync::Arc::new(mock.clone()), ResolverOptions::default());
    let doc = discoverer.lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
    assert_eq!(mock.requests().await.len(), 1);
}

#[tokio::test]
async fn falls_back_to_host_meta() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::status(StatusCode::NOT_FOUND))
        .await;
    mock.route(
        Method::GET,
        HOST_META_HTTPS,
        Route::ok(XRD_TYPE, host_meta("https://example.com/describe?uri={uri}")),
    )
    .await;
    mock.route(
        Method::GET,
        DESCRIBE_URL,
        Route::ok(XRD_TYPE, xrd("acct:alice@example.com", "")),
    )
    .await;

    let doc = discoverer(&mock).lookup("acct:alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));

    let log = mock.take_log().await;
    let urls: Vec<String> = log.iter().map(|r| r.uri().to_string()).collect();
    assert_eq!(urls, [WEBFINGER_URL, HOST_META_HTTPS, DESCRIBE_URL]);
    assert_eq!(
        log[1].headers()["accept"],
        "application/xrd+xml, application/jrd+json"
    );
    // the host-meta link declared a type, so it drives Accept
    assert_eq!(log[2].headers()["accept"], "application/xrd+xml");
}

#[tokio::test]
async fn host_meta_falls_back_to_plain_http() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::Refuse).await;
    mock.route(Method::GET, HOST_META_HTTPS, Route::Refuse).await;
    mock.route(
        Method::GET,
        HOST_META_HTTP,
        Route::ok("text/xml", host_meta("https://example.com/describe?uri={uri}")),
    )
    .await;
    mock.route(
        Method::GET,
        DESCRIBE_URL,
        Route::ok(XRD_TYPE, xrd("acct:alice@example.com", "")),
    )
    .await;

    let doc = discoverer(&mock).lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
    assert_eq!(
        mock.requests().await,
        [
            (Method::GET, WEBFINGER_URL.to_string()),
            (Method::GET, HOST_META_HTTPS.to_string()),
            (Method::GET, HOST_META_HTTP.to_string()),
            (Method::GET, DESCRIBE_URL.to_string()),
        ]
    );
}

#[tokio::test]
async fn exhausted_chain_reports_every_failure() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::Refuse).await;

    let err = discoverer(&mock)
        .lookup("alice@example.com")
        .await
        .unwrap_err();
    let (identifier, failures) = match err {
        LookupError::Unresolvable {
            identifier,
            failures,
        } => (identifier, failures),
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(identifier, "acct:alice@example.com");

    let methods: Vec<&str> = failures.iter().map(|f| f.method.as_str()).collect();
    assert_eq!(methods, ["webfinger", "host-meta", "link-header", "link-html"]);
    assert!(matches!(
        failures[0].error,
        DiscoveryError::Transport(TransportError::Other(_))
    ));
    match &failures[1].error {
        DiscoveryError::DiscoveryExhausted { tried } => {
            assert_eq!(tried, &[HOST_META_HTTPS, HOST_META_HTTP]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(failures[2].error, DiscoveryError::BadResource(_)));
    assert!(matches!(failures[3].error, DiscoveryError::BadResource(_)));

    // link-header and link-html never touch the network for acct: identifiers
    assert_eq!(mock.requests().await.len(), 3);
}

#[tokio::test]
async fn http_identifier_resolves_through_link_header() {
    let mock = MockClient::default();
    mock.route(
        Method::HEAD,
        "https://example.com/alice",
        Route::status(StatusCode::OK)
            .header("link", r#"<https://example.com/style.css>; rel=stylesheet"#)
            .header(
                "link",
                r#"</describe/alice>; rel="lrdd"; type="application/jrd+json""#,
            ),
    )
    .await;
    mock.route(
        Method::GET,
        "https://example.com/describe/alice",
        Route::ok("application/json", jrd("https://example.com/alice")),
    )
    .await;

    let doc = discoverer(&mock)
        .lookup("https://example.com/alice")
        .await
        .unwrap();
    assert_eq!(doc.subject(), Some("https://example.com/alice"));
    assert_eq!(
        mock.requests().await,
        [
            (Method::GET, HOST_META_HTTPS.to_string()),
            (Method::HEAD, "https://example.com/alice".to_string()),
            (Method::GET, "https://example.com/describe/alice".to_string()),
        ]
    );
}

#[tokio::test]
async fn http_identifier_resolves_through_html() {
    let page = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <link rel="lrdd" href="/describe?uri={uri}">
  </head>
  <body>hi</body>
</html>"#;
    let mock = MockClient::default();
    mock.route(
        Method::HEAD,
        "https://example.com/alice",
        Route::status(StatusCode::OK),
    )
    .await;
    mock.route(
        Method::GET,
        "https://example.com/alice",
        Route::ok("text/html", page),
    )
    .await;
    mock.route(
        Method::GET,
        "https://example.com/describe?uri=https%3A%2F%2Fexample.com%2Falice",
        Route::ok(XRD_TYPE, xrd("https://example.com/alice", "")),
    )
    .await;

    let doc = discoverer(&mock)
        .lookup("https://example.com/alice")
        .await
        .unwrap();
    assert_eq!(doc.subject(), Some("https://example.com/alice"));

    let log = mock.take_log().await;
    assert_eq!(log.len(), 4);
    // untyped descriptor link: the default negotiation header is sent
    assert_eq!(
        log[3].headers()["accept"],
        fingerpost_discovery::DESCRIPTOR_ACCEPT
    );
}

#[tokio::test]
async fn require_describes_moves_on_to_next_method() {
    let mock = MockClient::default();
    mock.route(
        Method::GET,
        WEBFINGER_URL,
        Route::ok(JRD_TYPE, jrd("acct:mallory@example.com")),
    )
    .await;
    mock.route(
        Method::GET,
        HOST_META_HTTPS,
        Route::ok(XRD_TYPE, host_meta("https://example.com/describe?uri={uri}")),
    )
    .await;
    mock.route(
        Method::GET,
        DESCRIBE_URL,
        Route::ok(
            XRD_TYPE,
            xrd(
                "https://example.com/users/alice",
                "<Alias>acct:alice@example.com</Alias>",
            ),
        ),
    )
    .await;

    // without the check, the first document wins
    let doc = discoverer(&mock).lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:mallory@example.com"));

    let opts = ResolverOptions::new().require_describes(true).build();
    let strict = Discoverer::new(mock.clone(), opts);
    let doc = strict.lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("https://example.com/users/alice"));
    assert!(doc.describes("acct:alice@example.com"));
}

#[tokio::test]
async fn malformed_descriptor_is_a_method_failure() {
    let mock = MockClient::default();
    mock.route(
        Method::GET,
        WEBFINGER_URL,
        Route::ok(JRD_TYPE, "{\"subject\": "),
    )
    .await;
    mock.route(
        Method::GET,
        HOST_META_HTTPS,
        Route::ok(XRD_TYPE, host_meta("https://example.com/describe?uri={uri}")),
    )
    .await;
    mock.route(
        Method::GET,
        DESCRIBE_URL,
        Route::ok(XRD_TYPE, xrd("acct:alice@example.com", "")),
    )
    .await;

    let doc = discoverer(&mock).lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
}

#[tokio::test(start_paused = true)]
async fn timeouts_fail_only_the_current_method() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::Hang).await;
    mock.route(
        Method::GET,
        HOST_META_HTTPS,
        Route::ok(XRD_TYPE, host_meta("https://example.com/describe?uri={uri}")),
    )
    .await;
    mock.route(
        Method::GET,
        DESCRIBE_URL,
        Route::ok(XRD_TYPE, xrd("acct:alice@example.com", "")),
    )
    .await;

    let opts = ResolverOptions::new()
        .request_timeout(Duration::from_secs(2))
        .build();
    let doc = Discoverer::new(mock.clone(), opts)
        .lookup("alice@example.com")
        .await
        .unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
}

#[tokio::test(start_paused = true)]
async fn timeout_is_reported_as_transport_timeout() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::Hang).await;

    let opts = ResolverOptions::new()
        .request_timeout(Duration::from_secs(1))
        .build();
    let discoverer = Discoverer::empty(mock.clone(), opts)
        .with_primary(fingerpost_discovery::methods::WebFinger);
    match discoverer.lookup("alice@example.com").await {
        Err(LookupError::Unresolvable { failures, .. }) => {
            assert!(matches!(
                failures[0].error,
                DiscoveryError::Transport(TransportError::Timeout)
            ));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_before_any_request() {
    let mock = MockClient::default();
    let token = CancellationToken::new();
    token.cancel();

    let err = discoverer(&mock)
        .lookup_cancellable("alice@example.com", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Cancelled));
    assert!(mock.requests().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_lookup_drops_the_fetch() {
    let mock = MockClient::default();
    mock.route(Method::GET, WEBFINGER_URL, Route::Hang).await;
    let opts = ResolverOptions::new()
        .request_timeout(Duration::from_secs(60))
        .build();
    let discoverer = Discoverer::new(mock.clone(), opts);
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(
        discoverer.lookup_cancellable("alice@example.com", &token),
        async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        }
    );
    assert!(matches!(result, Err(LookupError::Cancelled)));
    // only the hung WebFinger request was ever issued
    assert_eq!(
        mock.requests().await,
        [(Method::GET, WEBFINGER_URL.to_string())]
    );
}

/// A method that hands out fixed links.
struct Fixed(&'static str, Vec<Link>);

impl<C> DiscoveryMethod<C> for Fixed {
    fn name(&self) -> &str {
        self.0
    }

    fn discover<'a>(&'a self, _: &'a Fetcher<C>, _: &'a str) -> DiscoveryFuture<'a> {
        Box::pin(std::future::ready(Ok(self.1.clone())))
    }
}

#[tokio::test]
async fn custom_methods_and_descriptor_relation() {
    let mock = MockClient::default();
    mock.route(
        Method::GET,
        "https://example.com/d/alice.json",
        Route::ok(JRD_TYPE, jrd("acct:alice@example.com")),
    )
    .await;

    let opts = ResolverOptions::new().descriptor_rel("describedby").build();
    let discoverer = Discoverer::empty(mock.clone(), opts)
        .with_primary(Fixed(
            "no-target",
            vec![Link::builder("describedby").build().unwrap()],
        ))
        .with_fallback(Fixed(
            "wrong-rel",
            vec![
                Link::builder("lrdd")
                    .href("https://example.com/never")
                    .build()
                    .unwrap(),
            ],
        ))
        .with_fallback(Fixed("nothing", Vec::new()))
        .with_fallback(Fixed(
            "static",
            vec![
                Link::builder("alternate")
                    .href("https://example.com/@alice")
                    .build()
                    .unwrap(),
                Link::builder("describedby")
                    .href("https://example.com/d/alice.json")
                    .build()
                    .unwrap(),
            ],
        ));
    assert_eq!(
        discoverer.methods(),
        ["no-target", "wrong-rel", "nothing", "static"]
    );

    let doc = discoverer.lookup("alice@example.com").await.unwrap();
    assert_eq!(doc.subject(), Some("acct:alice@example.com"));
    assert_eq!(
        mock.requests().await,
        [(Method::GET, "https://example.com/d/alice.json".to_string())]
    );
}

#[tokio::test]
async fn failed_selection_steps_are_recorded() {
    let mock = MockClient::default();
    let discoverer = Discoverer::empty(mock.clone(), ResolverOptions::default())
        .with_primary(Fixed(
            "no-target",
            vec![Link::builder("lrdd").build().unwrap()],
        ))
        .with_fallback(Fixed(
            "wrong-rel",
            vec![Link::builder("alternate").href("https://h/").build().unwrap()],
        ))
        .with_fallback(Fixed("nothing", Vec::new()));

    let Err(LookupError::Unresolvable { failures, .. }) =
        discoverer.lookup("alice@example.com").await
    else {
        panic!("expected failure");
    };
    assert!(matches!(failures[0].error, DiscoveryError::UnusableLink(_)));
    assert!(matches!(failures[1].error, DiscoveryError::NoDescriptorLink(_)));
    assert!(matches!(failures[2].error, DiscoveryError::NoLinks(_)));
    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn discover_links_skips_the_descriptor_fetch() {
    let mock = MockClient::default();
    let links = discoverer(&mock)
        .discover_links("alice@example.com")
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].rel(), "lrdd");
    assert_eq!(
        links[0].target("acct:alice@example.com").as_deref(),
        Some(WEBFINGER_URL)
    );
    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn invalid_identifier_touches_nothing() {
    let mock = MockClient::default();
    let err = discoverer(&mock).lookup("").await.unwrap_err();
    assert!(matches!(err, LookupError::InvalidIdentifier(_)));
    assert!(mock.requests().await.is_empty());
}
