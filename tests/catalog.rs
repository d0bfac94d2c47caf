use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use planetary_fetch::app::{ProgressEvent, ProgressSink};
use planetary_fetch::catalog::{CatalogClient, OdeHttpClient, ProductFileClient};
use planetary_fetch::classify::target_path;
use planetary_fetch::domain::ProductQuery;
use planetary_fetch::downloader::Downloader;
use planetary_fetch::error::FetchError;

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

// Answers a single request with a fixed status and body, then closes.
fn serve_once(status: &str, content_type: &str, body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => request.extend_from_slice(&buf[..read]),
            }
        }
        stream.write_all(response.as_bytes()).unwrap();
    });
    format!("http://{addr}")
}

fn client(endpoint: &str) -> OdeHttpClient {
    OdeHttpClient::new(endpoint, Duration::from_secs(5)).unwrap()
}

fn query() -> ProductQuery {
    "FRT00009876*".parse().unwrap()
}

#[test]
fn catalog_json_is_decoded() {
    let endpoint = serve_once(
        "200 OK",
        "application/json",
        r#"{"ODEResults": {"Products": "No Products Found"}}"#,
    );
    let value = client(&endpoint).query(&query()).unwrap();
    assert_eq!(value["ODEResults"]["Products"], "No Products Found");
}

#[test]
fn catalog_invalid_json_is_unavailable() {
    let endpoint = serve_once("200 OK", "text/html", "<html>maintenance</html>");
    let err = client(&endpoint).query(&query()).unwrap_err();
    assert_matches!(err, FetchError::CatalogUnavailable(_));
}

#[test]
fn catalog_server_error_is_unavailable() {
    let endpoint = serve_once("503 Service Unavailable", "text/plain", "try later");
    let err = client(&endpoint).query(&query()).unwrap_err();
    assert_matches!(err, FetchError::CatalogUnavailable(message) if message.contains("503"));
}

#[test]
fn file_body_is_streamed() {
    let base = serve_once("200 OK", "application/octet-stream", "PDS_VERSION_ID = PDS3");
    let mut sink = Vec::new();
    let bytes = client(&base)
        .fetch(&format!("{base}/FRT00009876_07_IF123_TRR3.LBL"), &mut sink)
        .unwrap();
    assert_eq!(bytes, 21);
    assert_eq!(sink, b"PDS_VERSION_ID = PDS3");
}

#[test]
fn missing_file_is_a_status_error() {
    let base = serve_once("404 Not Found", "text/plain", "not found");
    let url = format!("{base}/FRT00009876_07_IF123_TRR3.IMG");
    let err = client(&base).fetch(&url, &mut Vec::new()).unwrap_err();
    assert_matches!(err, FetchError::DownloadStatus { status: 404, .. });
}

#[test]
fn missing_file_leaves_no_target_through_downloader() {
    let temp = tempfile::tempdir().unwrap();
    let out = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let base = serve_once("404 Not Found", "text/plain", "not found");
    let client = client(&base);

    let report = Downloader::new(&client, &out, 1)
        .unwrap()
        .download(&[format!("{base}/FRT00009876_07_IF123_TRR3.IMG")], &NoopSink);

    assert_eq!(report.attempted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 0);
    let target = target_path(&out, "FRT00009876_07_IF123_TRR3.IMG").unwrap();
    assert!(!target.as_std_path().exists());
    let dir = target.parent().unwrap();
    let leftovers = std::fs::read_dir(dir.as_std_path())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}
