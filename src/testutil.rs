//! Test-only HTTP fixtures: a one-shot local server and a closed port.

use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the one-shot server received.
#[derive(Debug)]
pub struct Recorded {
  pub request_line: String,
  /// Request line plus headers, as received.
  pub head: String,
  pub body: String,
}

fn header_end(buf: &[u8]) -> Option<usize> {
  buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

fn content_length(head: &str) -> usize {
  head
    .lines()
    .filter_map(|line| line.split_once(':'))
    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
    .and_then(|(_, value)| value.trim().parse().ok())
    .unwrap_or(0)
}

/// Serve exactly one request with the given status and body. Returns the base URL
/// (`http://127.0.0.1:port`) and a receiver for the recorded request.
pub async fn serve_once(status: u16, body: &str) -> (String, oneshot::Receiver<Recorded>) {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
  let addr = listener.local_addr().expect("test listener address");
  let body = body.to_string();
  let (tx, rx) = oneshot::channel();

  tokio::spawn(async move {
    let Ok((mut socket, _)) = listener.accept().await else { return };
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let end = loop {
      let n = socket.read(&mut chunk).await.unwrap_or(0);
      if n == 0 {
        return;
      }
      buf.extend_from_slice(&chunk[..n]);
      if let Some(end) = header_end(&buf) {
        break end;
      }
    };
    let head = String::from_utf8_lossy(&buf[..end]).to_string();
    let wanted = end + content_length(&head);
    while buf.len() < wanted {
      let n = socket.read(&mut chunk).await.unwrap_or(0);
      if n == 0 {
        break;
      }
      buf.extend_from_slice(&chunk[..n]);
    }

    let reason = match status {
      200 => "OK",
      404 => "Not Found",
      500 => "Internal Server Error",
      503 => "Service Unavailable",
      _ => "Unknown",
    };
    let response = format!(
      "HTTP/1.1 {status} {reason}\r\nContent-Type: text/html; charset=utf-8\r\n\
       Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
      body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[end..]).to_string();
    let _ = tx.send(Recorded { request_line, head, body });
  });

  (format!("http://{addr}"), rx)
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
  let addr = listener.local_addr().expect("test listener address");
  drop(listener);
  format!("http://{addr}")
}

/// A client that talks to the local fixtures directly, ignoring proxy settings.
pub fn http_client() -> Client {
  Client::builder().no_proxy().build().expect("build test http client")
}
