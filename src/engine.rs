//! Engine analysis dispatch.
//! Posts each recognized FEN to an external analysis server (`{base}/api/analyze`).
//! The server owns engine search and move selection; its reply is logged, not parsed.
//! A bad server address is a configuration error. Every failure while posting is reported as
//! `SinkDispatchFailed` and never ends the loop.

use crate::config::DispatchConfig;
use crate::error::{BoardError, Result};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;

pub const ANALYZE_PATH: &str = "/api/analyze";

#[derive(Debug, Serialize, PartialEq, Eq)]
struct AnalyzeRequest<'a> {
    fen: &'a str,
    depth: u32,
    multipv: u32,
}

#[derive(Debug, Clone)]
pub struct AnalysisClient {
    client: Client,
    url: String,
    depth: u32,
    multipv: u32,
}

impl AnalysisClient {
    /// `base` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base: &str, config: &DispatchConfig) -> Result<Self> {
        let url = analyze_url(base);
        let parsed = Url::parse(&url)
            .map_err(|e| BoardError::InvalidConfig(format!("analysis server '{}': {}", base, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BoardError::InvalidConfig(format!(
                "analysis server '{}' must use http or https",
                base
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BoardError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            depth: config.depth,
            multipv: config.multipv,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `fen` and returns the raw response body.
    pub async fn dispatch(&self, fen: &str) -> Result<String> {
        let request = AnalyzeRequest {
            fen,
            depth: self.depth,
            multipv: self.multipv,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BoardError::SinkDispatchFailed(format!("POST {}: {}", self.url, e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            BoardError::SinkDispatchFailed(format!("reading response from {}: {}", self.url, e))
        })?;
        if !status.is_success() {
            return Err(BoardError::SinkDispatchFailed(format!(
                "server returned {}: {}",
                status, body
            )));
        }
        Ok(body)
    }
}

fn analyze_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), ANALYZE_PATH)
}
