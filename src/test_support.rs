//! Shared fixtures for unit tests

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Two years, two indicators, one geo, one unit, no `id` header
pub const SAMPLE_DATASET: &str = r#"{
    "label": "Sample",
    "dimension": {
        "time": {"category": {"index": {"2020": 0, "2021": 1}, "label": {"2020": "2020", "2021": "2021"}}},
        "na_item": {"category": {"index": {"B1GQ": 0, "CP00": 1}, "label": {"B1GQ": "GDP", "CP00": "CPI"}}},
        "geo": {"category": {"index": {"IT": 0}, "label": {"IT": "IT"}}},
        "unit": {"category": {"index": {"EUR": 0}, "label": {"EUR": "EUR"}}}
    },
    "value": {"0": 100, "1": 200, "2": 5, "3": 7}
}"#;

/// Serves a single HTTP response on a loopback port
///
/// Returns the base URL (with trailing `/`) and a handle resolving to the
/// request line the server received.
pub async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 16 * 1024];
        let n = socket.read(&mut buf).await.expect("read request");
        let request = String::from_utf8_lossy(&buf[..n]).into_owned();

        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        let _ = socket.shutdown().await;

        request.lines().next().unwrap_or_default().to_string()
    });

    (format!("http://{}/", addr), handle)
}
