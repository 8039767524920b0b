//! Reachability of the system under test

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls the admin's base URL before any browser is launched
pub struct TargetProbe {
    client: reqwest::Client,
    url: Url,
}

impl TargetProbe {
    pub fn new(url: Url) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, url })
    }

    /// Wait until the target answers any HTTP response
    ///
    /// Status codes are not judged here: a 503 during a deploy still means
    /// the host is up, and the browser steps report what the page does.
    pub async fn wait_until_reachable(&self, timeout: Duration) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.client.get(self.url.clone()).send().await {
                Ok(resp) => {
                    info!("Target {} reachable (HTTP {})", self.url, resp.status());
                    return Ok(());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to respond...", self.url);
                    }
                    // Connection refused is expected while the target is starting
                    if !e.is_connect() {
                        warn!("Probe error: {}", e);
                    }
                }
            }

            if start.elapsed() >= timeout {
                return Err(E2eError::TargetUnreachable(attempts));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// A port nobody listens on
    fn closed_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn test_unreachable_target_gives_up() {
        let url = Url::parse(&format!("http://127.0.0.1:{}/", closed_port())).unwrap();
        let probe = TargetProbe::new(url).unwrap();

        let err = probe
            .wait_until_reachable(Duration::from_millis(300))
            .await
            .unwrap_err();
        match err {
            E2eError::TargetUnreachable(attempts) => assert!(attempts >= 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_any_http_response_counts() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let probe = TargetProbe::new(url).unwrap();
        probe.wait_until_reachable(Duration::from_secs(5)).await.unwrap();
    }
}
