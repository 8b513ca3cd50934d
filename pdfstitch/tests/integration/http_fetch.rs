//! Real HTTP against a local stub server.

use std::time::Duration;

use crate::common::{StubServer, donor, expected_texts, page_texts};
use pdfstitch::config::{FetchConfig, UrlList};
use pdfstitch::io::{Fetcher, HttpFetcher, TransportError};
use pdfstitch::merge::{MergeRequest, Merger};
use pdfstitch::{ErrorKind, StitchError};

fn http_fetcher() -> HttpFetcher {
    HttpFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(5),
        ..FetchConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_ok_and_not_found() {
    let bytes = donor("A", 1);
    let server = StubServer::start([("a.pdf", bytes.clone())]).await;
    let fetcher = http_fetcher();

    assert_eq!(fetcher.fetch(&server.url("a.pdf")).await.unwrap(), bytes);
    assert_eq!(
        fetcher.fetch(&server.url("nope.pdf")).await.unwrap_err(),
        TransportError::Status { code: 404 }
    );
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to find a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = http_fetcher()
        .fetch(&format!("http://{addr}/a.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Request { .. }), "{err}");
}

#[tokio::test]
async fn test_merge_over_http() {
    let server = StubServer::start([("one.pdf", donor("A", 2)), ("two.pdf", donor("B", 1))]).await;
    let urls = UrlList::from_strings([server.url("one.pdf"), server.url("two.pdf")]).unwrap();
    let merger = Merger::new(http_fetcher(), 2);

    let output = merger
        .merge(&MergeRequest::new(urls, "bundle.pdf"))
        .await
        .unwrap();

    assert_eq!(output.report.file_name, "bundle.pdf");
    assert_eq!(output.report.page_count, 3);
    assert_eq!(
        page_texts(&output.bytes),
        expected_texts(&[("A", 2), ("B", 1)])
    );
}

#[tokio::test]
async fn test_http_404_names_url() {
    let server = StubServer::start([("one.pdf", donor("A", 1))]).await;
    let missing = server.url("missing.pdf");
    let urls = UrlList::from_strings([server.url("one.pdf"), missing.clone()]).unwrap();
    let merger = Merger::new(http_fetcher(), 2);

    let err = merger
        .merge(&MergeRequest::new(urls, "merged.pdf"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.url(), Some(missing.as_str()));
    assert!(matches!(
        err,
        StitchError::Transport {
            index: 1,
            source: TransportError::Status { code: 404 },
            ..
        }
    ));
}
