//! Request/response source for the polling fallback

use crate::error::PollError;
use async_trait::async_trait;
use filaman_common::protocol::AmsUnit;
use reqwest::Url;
use std::time::Duration;

/// Source of AMS units when the live session is down
#[async_trait]
pub trait AmsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<AmsUnit>, PollError>;
}

/// `GET /api/ams` on the device
pub struct HttpAmsSource {
    http_client: reqwest::Client,
    url: Url,
}

impl HttpAmsSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Network(e.to_string()))?;
        Ok(Self { http_client, url })
    }
}

#[async_trait]
impl AmsSource for HttpAmsSource {
    async fn fetch(&self) -> Result<Vec<AmsUnit>, PollError> {
        let response = self
            .http_client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| PollError::Parse(e.to_string()))
    }
}
