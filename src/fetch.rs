//! HTTP(S) retrieval of target documents.

use crate::{CaptureConfig, Error, Result, Target};
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// Fetches target bodies with a shared connection pool.
///
/// Certificates are accepted unconditionally: targets are often appliances
/// with self-signed or expired certificates. Any HTTP status counts as
/// content; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout_ms: u64,
}

impl Fetcher {
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_ms: config.timeout_ms,
        })
    }

    /// GET the target and return the full response body.
    pub async fn fetch(&self, target: &Target) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| self.classify(target, e))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.classify(target, e))?;
        debug!("Fetched {} ({}, {} bytes)", target, status, body.len());
        Ok(body.to_vec())
    }

    fn classify(&self, target: &Target, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(self.timeout_ms)
        } else {
            Error::FetchError(format!("{}: {}", target, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn serve(body: &'static str, status: u16, delay_ms: u64) -> String {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                std::thread::sleep(Duration::from_millis(delay_ms));
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn non_success_status_is_content() {
        let url = serve("<html>nope</html>", 404, 0);
        let fetcher = Fetcher::new(&CaptureConfig::default()).unwrap();
        let body = fetcher.fetch(&Target::new(url)).await.unwrap();
        assert_eq!(body, b"<html>nope</html>".to_vec());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let url = serve("late", 200, 2000);
        let cfg = CaptureConfig {
            timeout_ms: 200,
            ..Default::default()
        };
        let fetcher = Fetcher::new(&cfg).unwrap();
        let err = fetcher.fetch(&Target::new(url)).await.unwrap_err();
        assert!(matches!(err, Error::FetchTimeout(200)), "got {:?}", err);
    }

    #[tokio::test]
    async fn refused_connection_is_fetch_error() {
        // Bind then drop to obtain a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let fetcher = Fetcher::new(&CaptureConfig::default()).unwrap();
        let err = fetcher
            .fetch(&Target::new(format!("http://127.0.0.1:{}", port)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchError(_)));
    }

    #[tokio::test]
    async fn malformed_url_is_fetch_error() {
        let fetcher = Fetcher::new(&CaptureConfig::default()).unwrap();
        let err = fetcher.fetch(&Target::new("not a url")).await.unwrap_err();
        assert!(matches!(err, Error::FetchError(_)));
    }
}
