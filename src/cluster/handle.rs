//! Peer Handle
//!
//! `PeerClient` is the master-side proxy for one storage node: the four data
//! operations plus a liveness ping and a shutdown command. `PeerConnector` dials a
//! node and hands back a fresh client.
//!
//! The HTTP implementations below are what the master runs with; tests plug in an
//! in-memory double at the same seam.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::{DfsError, ErrorBody, Result};
use crate::peer::protocol::*;

#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Address the peer registered with.
    fn address(&self) -> &str;

    /// Sends `token` and returns what the peer echoed.
    async fn ping(&self, token: &str) -> Result<String>;

    async fn shutdown(&self) -> Result<()>;

    async fn file_exists(&self, filename: &str) -> Result<bool>;

    async fn create_file(&self, filename: &str) -> Result<()>;

    async fn delete_file(&self, filename: &str) -> Result<()>;

    async fn read_bytes(&self, filename: &str, offset: u64, count: u64) -> Result<Vec<u8>>;

    async fn write_bytes(&self, filename: &str, offset: u64, data: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Establishes a transport handle to `address`.
    async fn connect(&self, address: &str) -> Result<Arc<dyn PeerClient>>;
}

/// Dials peers over HTTP.
///
/// A dial is only a reachability check: a bounded TCP connect that is closed as
/// soon as it succeeds. Requests then go through the shared `reqwest::Client`,
/// which opens and pools its own connections under the same connect timeout.
pub struct HttpConnector {
    http: reqwest::Client,
    dial_timeout: Duration,
    call_timeout: Duration,
}

impl HttpConnector {
    pub fn new(dial_timeout: Duration, call_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(dial_timeout)
            .build()
            .map_err(|e| DfsError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            dial_timeout,
            call_timeout,
        })
    }
}

#[async_trait]
impl PeerConnector for HttpConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn PeerClient>> {
        let host = address
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        // Only reachability matters; the connection is dropped right away
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect(host.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(DfsError::transport(address, e)),
            Err(_) => {
                return Err(DfsError::transport(
                    address,
                    format!("dial timed out after {:?}", self.dial_timeout),
                ));
            }
        }

        Ok(Arc::new(HttpPeerClient {
            address: address.to_string(),
            base_url: format!("http://{}", host),
            http: self.http.clone(),
            timeout: self.call_timeout,
        }))
    }
}

pub struct HttpPeerClient {
    address: String,
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerClient {
    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn transport(&self, err: reqwest::Error) -> DfsError {
        DfsError::transport(&self.address, err)
    }

    /// Turns a non-2xx answer into a peer-reported error.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => format!("HTTP {}", status),
        };

        Err(DfsError::Peer {
            address: self.address.clone(),
            message,
        })
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.url(endpoint))
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        self.check(response).await
    }

    async fn ack(&self, response: reqwest::Response) -> Result<()> {
        let ack: PeerAckResponse = response.json().await.map_err(|e| self.transport(e))?;
        if ack.success {
            Ok(())
        } else {
            Err(DfsError::Peer {
                address: self.address.clone(),
                message: "operation not acknowledged".to_string(),
            })
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self, token: &str) -> Result<String> {
        let response = self
            .post_json(
                ENDPOINT_PING,
                &PingMessage {
                    token: token.to_string(),
                },
            )
            .await?;
        let echo: PingMessage = response.json().await.map_err(|e| self.transport(e))?;
        Ok(echo.token)
    }

    async fn shutdown(&self) -> Result<()> {
        let response = self
            .http
            .post(self.url(ENDPOINT_SHUTDOWN))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let response = self.check(response).await?;
        self.ack(response).await
    }

    async fn file_exists(&self, filename: &str) -> Result<bool> {
        let response = self
            .post_json(
                ENDPOINT_EXISTS,
                &PeerFileRequest {
                    filename: filename.to_string(),
                },
            )
            .await?;
        let body: PeerExistsResponse = response.json().await.map_err(|e| self.transport(e))?;
        Ok(body.exists)
    }

    async fn create_file(&self, filename: &str) -> Result<()> {
        let response = self
            .post_json(
                ENDPOINT_CREATE,
                &PeerFileRequest {
                    filename: filename.to_string(),
                },
            )
            .await?;
        self.ack(response).await
    }

    async fn delete_file(&self, filename: &str) -> Result<()> {
        let response = self
            .post_json(
                ENDPOINT_DELETE,
                &PeerFileRequest {
                    filename: filename.to_string(),
                },
            )
            .await?;
        self.ack(response).await
    }

    async fn read_bytes(&self, filename: &str, offset: u64, count: u64) -> Result<Vec<u8>> {
        let query = PeerReadQuery {
            filename: filename.to_string(),
            offset,
            count,
        };
        let response = self
            .http
            .get(self.url(ENDPOINT_READ))
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let response = self.check(response).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport(e))?;
        Ok(bytes.to_vec())
    }

    async fn write_bytes(&self, filename: &str, offset: u64, data: Vec<u8>) -> Result<()> {
        let query = PeerWriteQuery {
            filename: filename.to_string(),
            offset,
        };
        let response = self
            .http
            .post(self.url(ENDPOINT_WRITE))
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let response = self.check(response).await?;
        self.ack(response).await
    }
}
