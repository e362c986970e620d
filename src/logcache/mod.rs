//! Log Cache metadata client.
//!
//! parse_addr -> Url (http/https; a bare `host:port` is read as http)
//! MetaSource: the one capability the `meta` command needs from a cache.
//! HttpClient: `GET {addr}/api/v1/meta` under a deadline.
//!
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Path of the metadata endpoint, relative to the service root.
pub const META_PATH: &str = "/api/v1/meta";

/// Per-source summary statistics reported by Log Cache.
///
/// Timestamps are nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaInfo {
    #[serde(deserialize_with = "de_int64")]
    pub count: i64,
    #[serde(deserialize_with = "de_int64")]
    pub expired: i64,
    #[serde(deserialize_with = "de_int64")]
    pub oldest_timestamp: i64,
    #[serde(deserialize_with = "de_int64")]
    pub newest_timestamp: i64,
}

/// Failures of a metadata request.
#[derive(Debug, Error)]
pub enum MetaError {
    /// The service answered without any content.
    #[error("end of stream")]
    EndOfStream,

    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("GET {url}: deadline exceeded after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("GET {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("failed to decode meta response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to start request runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Anything able to answer a metadata query.
pub trait MetaSource {
    /// Fetch the source-id -> MetaInfo mapping, giving up after `timeout`.
    fn fetch_meta(&self, timeout: Duration) -> Result<HashMap<String, MetaInfo>, MetaError>;
}

/// Parse a user supplied Log Cache address.
///
/// - "https://log-cache.example.com" -> as is
/// - "localhost:8080" -> "http://localhost:8080/"
/// - "ftp://host" -> InvalidAddress
pub fn parse_addr(raw: &str) -> Result<Url, MetaError> {
    let invalid = |reason: String| MetaError::InvalidAddress {
        addr: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("address is empty".into()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Decode a metadata response body.
///
/// An empty body means the stream closed before any content arrived.
pub fn decode_meta(body: &str) -> Result<HashMap<String, MetaInfo>, MetaError> {
    if body.trim().is_empty() {
        return Err(MetaError::EndOfStream);
    }
    let resp: MetaResponse = serde_json::from_str(body)?;
    Ok(resp.meta.unwrap_or_default())
}

/// HTTP client bound to one Log Cache address.
#[derive(Debug, Clone)]
pub struct HttpClient {
    addr: Url,
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(addr: Url) -> Self {
        Self {
            addr,
            http: reqwest::Client::new(),
        }
    }

    /// Full URL of the metadata endpoint. Any path on the address is replaced.
    pub fn meta_url(&self) -> Url {
        let mut url = self.addr.clone();
        url.set_path(META_PATH);
        url.set_query(None);
        url
    }

    /// Async variant of [`MetaSource::fetch_meta`].
    pub async fn fetch_meta_async(
        &self,
        timeout: Duration,
    ) -> Result<HashMap<String, MetaInfo>, MetaError> {
        let url = self.meta_url();
        let started = Instant::now();
        debug!(%url, ?timeout, "requesting metadata");

        let exchange = async {
            let transport = |source| MetaError::Transport {
                url: url.to_string(),
                source,
            };
            let resp = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(transport)?;
            let status = resp.status();
            if status != reqwest::StatusCode::OK {
                return Err(MetaError::Status(status.as_u16()));
            }
            let body = resp.text().await.map_err(transport)?;
            Ok::<String, MetaError>(body)
        };

        let body = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| MetaError::Timeout {
                url: url.to_string(),
                timeout,
            })??;

        let meta = decode_meta(&body)?;
        debug!(
            sources = meta.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received metadata"
        );
        Ok(meta)
    }
}

impl MetaSource for HttpClient {
    /// Blocks on a private single-threaded runtime for the one request.
    fn fetch_meta(&self, timeout: Duration) -> Result<HashMap<String, MetaInfo>, MetaError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.fetch_meta_async(timeout))
    }
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    meta: Option<HashMap<String, MetaInfo>>,
}

/// int64 fields arrive as JSON strings from protobuf gateways, numbers otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum Int64Repr {
    Num(i64),
    Str(String),
}

fn de_int64<'de, D>(de: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Int64Repr::deserialize(de)? {
        Int64Repr::Num(n) => Ok(n),
        Int64Repr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Answer a single HTTP request with `status` and `body`.
    /// Returns the base address and a receiver yielding the request line.
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let n = stream.read(&mut buf).unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let _ = tx.send(request.lines().next().unwrap_or("").to_string());
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn client(addr: &str) -> HttpClient {
        HttpClient::new(parse_addr(addr).unwrap())
    }

    #[test]
    fn parse_addr_http_and_https() {
        assert_eq!(parse_addr("http://lc:8080").unwrap().scheme(), "http");
        assert_eq!(
            parse_addr("https://log-cache.example.com").unwrap().host_str(),
            Some("log-cache.example.com")
        );
    }

    #[test]
    fn parse_addr_without_scheme_defaults_to_http() {
        let url = parse_addr("localhost:8080").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn parse_addr_rejects_other_schemes_and_empty() {
        let err = parse_addr("ftp://example.com").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));
        assert!(matches!(
            parse_addr("   "),
            Err(MetaError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn meta_url_replaces_path() {
        let c = client("https://lc.example.com/some/prefix?x=1");
        assert_eq!(
            c.meta_url().as_str(),
            "https://lc.example.com/api/v1/meta"
        );
    }

    #[test]
    fn decode_accepts_string_and_number_int64() {
        let body = r#"{"meta":{
            "ns1/gauge/cpu":{"count":"10","expired":"2","oldestTimestamp":"0","newestTimestamp":"5000000000"},
            "ns1/counter/mem":{"count":3,"expired":0,"oldestTimestamp":7,"newestTimestamp":9}
        }}"#;
        let meta = decode_meta(body).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(
            meta["ns1/gauge/cpu"],
            MetaInfo {
                count: 10,
                expired: 2,
                oldest_timestamp: 0,
                newest_timestamp: 5_000_000_000,
            }
        );
        assert_eq!(meta["ns1/counter/mem"].count, 3);
        assert_eq!(meta["ns1/counter/mem"].newest_timestamp, 9);
    }

    #[test]
    fn decode_missing_fields_default_to_zero() {
        let meta = decode_meta(r#"{"meta":{"a":{"count":"4"}}}"#).unwrap();
        assert_eq!(
            meta["a"],
            MetaInfo {
                count: 4,
                ..MetaInfo::default()
            }
        );
        assert!(decode_meta("{}").unwrap().is_empty());
    }

    #[test]
    fn decode_empty_body_is_end_of_stream() {
        assert!(matches!(decode_meta(""), Err(MetaError::EndOfStream)));
        assert!(matches!(decode_meta(" \n"), Err(MetaError::EndOfStream)));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        assert!(matches!(decode_meta("not json"), Err(MetaError::Decode(_))));
        assert!(matches!(
            decode_meta(r#"{"meta":{"a":{"count":"ten"}}}"#),
            Err(MetaError::Decode(_))
        ));
    }

    #[test]
    fn fetch_meta_over_http() {
        let (addr, requests) = serve_once(
            "200 OK",
            r#"{"meta":{"ns1/gauge/cpu":{"count":"10","expired":"2","oldestTimestamp":"0","newestTimestamp":"5000000000"}}}"#,
        );
        let meta = client(&addr)
            .fetch_meta(Duration::from_secs(5))
            .unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["ns1/gauge/cpu"].expired, 2);
        assert_eq!(requests.recv().unwrap(), "GET /api/v1/meta HTTP/1.1");
    }

    #[test]
    fn fetch_meta_empty_body_is_end_of_stream() {
        let (addr, _requests) = serve_once("200 OK", "");
        let err = client(&addr)
            .fetch_meta(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, MetaError::EndOfStream));
    }

    #[test]
    fn fetch_meta_non_200_status() {
        let (addr, _requests) = serve_once("503 Service Unavailable", "");
        let err = client(&addr)
            .fetch_meta(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, MetaError::Status(503)));
        assert_eq!(err.to_string(), "unexpected status code 503");
    }

    #[test]
    fn fetch_meta_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            // Accept and hold the connection without answering.
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(3));
                drop(stream);
            }
        });
        let err = client(&format!("http://{addr}"))
            .fetch_meta(Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, MetaError::Timeout { .. }), "got {err:?}");
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[test]
    fn fetch_meta_connection_refused_is_transport_error() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = client(&format!("127.0.0.1:{port}"))
            .fetch_meta(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, MetaError::Transport { .. }), "got {err:?}");
    }
}
