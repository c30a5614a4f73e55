//! Client Library
//!
//! `DfsClient` talks to the master over its HTTP contract. Failures reported by the
//! master arrive as an `ErrorBody` and are rebuilt into the same `DfsError` the
//! master raised; a master that cannot be reached surfaces as `Transport`.

use std::time::Duration;

use crate::error::{DfsError, ErrorBody, Result};
use crate::master::protocol::*;
use crate::stripe::RecordSizes;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DfsClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl DfsClient {
    pub fn new(master: &str) -> Result<Self> {
        Self::with_timeout(master, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(master: &str, timeout: Duration) -> Result<Self> {
        let master = master.trim().trim_end_matches('/');
        let base_url = if master.starts_with("http://") || master.starts_with("https://") {
            master.to_string()
        } else {
            format!("http://{}", master)
        };

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DfsError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url,
            http,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DfsError::transport(&self.base_url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match response.json::<ErrorBody>().await {
            Ok(body) => Err(body.error),
            Err(_) => Err(DfsError::Internal {
                message: format!("master answered HTTP {}", status),
            }),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| DfsError::transport(&self.base_url, e))
    }

    async fn post_file(&self, endpoint: &str, filename: &str) -> Result<reqwest::Response> {
        let request = self.http.post(self.url(endpoint)).json(&FileRequest {
            filename: filename.to_string(),
        });
        self.send(request).await
    }

    pub async fn init_mapping(&self, records: RecordSizes) -> Result<()> {
        let request = self
            .http
            .post(self.url(ENDPOINT_INIT_MAPPING))
            .json(&InitMappingRequest { records });
        self.send(request).await?;
        Ok(())
    }

    pub async fn write_bytes(&self, filename: &str, offset: i32, data: Vec<u8>) -> Result<()> {
        let request = self
            .http
            .post(self.url(ENDPOINT_WRITE))
            .query(&WriteQuery {
                filename: filename.to_string(),
                offset,
            })
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        self.send(request).await?;
        Ok(())
    }

    pub async fn read_bytes(&self, filename: &str, offset: i32, count: i32) -> Result<Vec<u8>> {
        let request = self.http.get(self.url(ENDPOINT_READ)).query(&ReadQuery {
            filename: filename.to_string(),
            offset,
            count,
        });
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DfsError::transport(&self.base_url, e))?;
        Ok(bytes.to_vec())
    }

    pub async fn create_file(&self, filename: &str) -> Result<()> {
        self.post_file(ENDPOINT_CREATE, filename).await?;
        Ok(())
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        self.post_file(ENDPOINT_DELETE, filename).await?;
        Ok(())
    }

    pub async fn file_exists(&self, filename: &str) -> Result<bool> {
        let response = self.post_file(ENDPOINT_EXISTS, filename).await?;
        let body: ExistsResponse = self.decode(response).await?;
        Ok(body.exists)
    }

    pub async fn register_peer(&self, address: &str) -> Result<RegisterResponse> {
        let request = self.http.post(self.url(ENDPOINT_REGISTER)).json(&RegisterRequest {
            address: address.to_string(),
        });
        let response = self.send(request).await?;
        self.decode(response).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let response = self.send(self.http.get(self.url(ENDPOINT_STATUS))).await?;
        self.decode(response).await
    }
}
