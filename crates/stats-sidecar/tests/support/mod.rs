//! Shared helpers: loopback game server, loopback ingestion endpoint

#![allow(dead_code)]

use stats_sidecar::Identity;
use status_probe::protocol;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// 32 bytes 0x00..=0x1f
pub const SHARED_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

/// Identity pointing at `host:port`
pub fn identity(host: &str, port: u16) -> Identity {
    let vars: HashMap<&str, String> = HashMap::from([
        ("POD_NAME", "pod-1".to_string()),
        ("HOST", host.to_string()),
        ("PORT", port.to_string()),
        ("AZURE_CUSTOMER_ID", "cust".to_string()),
        ("AZURE_SHARED_KEY", SHARED_KEY.to_string()),
    ]);
    Identity::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// A request as seen by the fake ingestion endpoint
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    /// Lower-cased header names
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("missing header {}", name))
    }
}

/// Spawn an HTTP endpoint answering every request with `status_line`.
///
/// Returns the base URL and a stream of captured requests.
pub async fn spawn_ingestion_server(
    status_line: &'static str,
) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let tx = tx.clone();

            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let mut reader = BufReader::new(reader);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let target = parts.next().unwrap_or_default().to_string();

                let mut headers = HashMap::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        headers.insert(name.trim().to_lowercase(), value.trim().to_string());
                    }
                }

                let length: usize = headers
                    .get("content-length")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let mut body = vec![0u8; length];
                reader.read_exact(&mut body).await.unwrap();

                let _ = tx.send(CapturedRequest {
                    method,
                    target,
                    headers,
                    body,
                });

                let reply = "{}";
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    reply.len(),
                    reply
                );
                let _ = writer.write_all(response.as_bytes()).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    (base_url, rx)
}

/// Spawn a game server reporting `online`/`max` players to every query.
///
/// Returns its port and a counter of answered queries.
pub async fn spawn_game_server(online: u32, max: u32) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let answered = Arc::new(AtomicUsize::new(0));
    let counter = answered.clone();

    let json = format!(
        r#"{{"version":{{"name":"1.20.4","protocol":765}},"players":{{"max":{},"online":{}}},"description":{{"text":"test"}}}}"#,
        max, online
    );

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let json = json.clone();
            let counter = counter.clone();

            tokio::spawn(async move {
                // Handshake, then the status request
                if protocol::read_packet(&mut socket).await.is_err() {
                    return;
                }
                if protocol::read_packet(&mut socket).await.is_err() {
                    return;
                }
                if socket
                    .write_all(&protocol::status_response(&json))
                    .await
                    .is_ok()
                {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    (port, answered)
}
