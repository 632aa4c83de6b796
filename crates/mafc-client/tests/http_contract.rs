//! Validates `ReqwestRangeClient` against a real HTTP server (via
//! `wiremock`): the `Range:` header it sends and the status codes it
//! accepts.

use mafc_client::RangeClient;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sends_inclusive_range_header_and_accepts_206() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.fvec"))
        .and(header("Range", "bytes=100-199"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_bytes(vec![9u8; 100])
                .insert_header("Content-Range", "bytes 100-199/1000"),
        )
        .mount(&server)
        .await;

    let client = mafc_client::ReqwestRangeClient::new(reqwest::Client::new());
    let url = format!("{}/data.fvec", server.uri());
    let bytes = client.fetch_range(&url, 100, 199).await.unwrap();
    assert_eq!(bytes.len(), 100);
    assert_eq!(bytes.as_ref(), &vec![9u8; 100][..]);
}

#[tokio::test]
async fn server_error_is_classified_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.fvec"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = mafc_client::ReqwestRangeClient::new(reqwest::Client::new());
    let url = format!("{}/data.fvec", server.uri());
    let err = client.fetch_range(&url, 0, 9).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn not_found_is_classified_as_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.fvec"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = mafc_client::ReqwestRangeClient::new(reqwest::Client::new());
    let url = format!("{}/missing.fvec", server.uri());
    let err = client.fetch_range(&url, 0, 9).await.unwrap_err();
    assert!(!err.is_transient());
}
