//! HTTP client wrapper for archive requests.
//!
//! This module provides the `HttpClient` struct which issues single GET
//! attempts and hands back the body as raw bytes. Retrying is the caller's
//! concern (see [`fetch_with_retry`](super::fetch_with_retry)).

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for the listing and content endpoints.
///
/// Created once per run and reused for every request, taking advantage of
/// connection pooling.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use waybackdl_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::try_new(Duration::from_secs(10))?;
/// let body = client
///     .get_bytes("http://web.archive.org/web/20200101000000id_/http://example.com/")
///     .await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client whose connect timeout and per-read inactivity
    /// timeout both equal `timeout`.
    ///
    /// There is no cap on total transfer time, so a large capture that keeps
    /// streaming is never cut off.
    ///
    /// Gzip transfer decoding is enabled and requests carry the tool's
    /// User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend or system
    /// configuration prevents building a client.
    pub fn try_new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(DownloadError::client)?;
        Ok(Self { client })
    }

    /// Issues one GET and returns the response body as raw bytes.
    ///
    /// The body is never decoded through the declared charset: archived
    /// pages frequently declare the wrong one, and the mirror must hold the
    /// bytes exactly as captured.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Timeout`] if connecting or any single read stalls
    ///   past the timeout
    /// - [`DownloadError::Network`] for other transport failures
    /// - [`DownloadError::HttpStatus`] for any non-2xx response
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(body.to_vec())
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else if error.is_builder() {
        DownloadError::invalid_url(url)
    } else {
        DownloadError::network(url, error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn client() -> HttpClient {
        HttpClient::try_new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_bytes_returns_body_unchanged() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        // Latin-1 bytes under a UTF-8 declaration must survive as-is.
        let body: &[u8] = b"<p>caf\xe9</p>";
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=utf-8")
                    .set_body_bytes(body),
            )
            .mount(&mock_server)
            .await;

        let bytes = client()
            .get_bytes(&format!("{}/page", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, body);
    }

    #[tokio::test]
    async fn test_get_bytes_non_success_status_is_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = client()
            .get_bytes(&format!("{}/missing", mock_server.uri()))
            .await;
        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_bytes_sends_tool_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(header_regex("user-agent", "^waybackdl/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bytes = client().get_bytes(&mock_server.uri()).await.unwrap();
        assert_eq!(bytes, b"ok");
    }

    #[tokio::test]
    async fn test_get_bytes_times_out() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::try_new(Duration::from_millis(200)).unwrap();
        let result = client.get_bytes(&mock_server.uri()).await;
        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_get_bytes_slow_steady_body_is_not_cut_off() {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            return;
        };
        let addr = listener.local_addr().unwrap();
        let chunks = 10_usize;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    format!("HTTP/1.1 200 OK\r\nContent-Length: {chunks}\r\n\r\n").as_bytes(),
                )
                .await
                .unwrap();
            for _ in 0..chunks {
                tokio::time::sleep(Duration::from_millis(150)).await;
                socket.write_all(b"x").await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        // Total transfer takes ~1.5s, every gap stays well under the timeout.
        let client = HttpClient::try_new(Duration::from_millis(600)).unwrap();
        let body = client.get_bytes(&format!("http://{addr}/big")).await.unwrap();
        assert_eq!(body, vec![b'x'; chunks]);
    }

    #[tokio::test]
    async fn test_get_bytes_connection_refused_is_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let result = client().get_bytes("http://127.0.0.1:9/").await;
        assert!(matches!(
            result,
            Err(DownloadError::Network { .. } | DownloadError::Timeout { .. })
        ));
    }

    #[test]
    fn test_get_bytes_invalid_url_is_rejected() {
        let result = tokio_test::block_on(client().get_bytes("not-a-valid-url"));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
