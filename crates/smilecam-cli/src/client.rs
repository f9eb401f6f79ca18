//! Thin async client for the smilecamd HTTP API.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetectResult {
    pub smile_detected: bool,
    pub coordinates: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmileEntry {
    pub timestamp: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerStatus {
    pub version: String,
    pub camera_active: bool,
    pub frame_available: bool,
    pub smiles_recorded: u64,
}

#[derive(Debug, Deserialize)]
struct Message {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct SmileClient {
    http: reqwest::Client,
    base: String,
}

impl SmileClient {
    pub fn new(server: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub async fn start_camera(&self) -> Result<String> {
        let resp = self.http.post(self.url("start-camera")).send().await?;
        Ok(parse_json::<Message>(resp).await?.message)
    }

    pub async fn stop_camera(&self) -> Result<String> {
        let resp = self.http.post(self.url("stop-camera")).send().await?;
        Ok(parse_json::<Message>(resp).await?.message)
    }

    pub async fn frame(&self) -> Result<Vec<u8>> {
        let resp = self.http.get(self.url("get-frame")).send().await?;
        parse_bytes(resp).await
    }

    pub async fn detect(&self) -> Result<DetectResult> {
        let resp = self.http.get(self.url("detect-smile")).send().await?;
        parse_json(resp).await
    }

    pub async fn smiles(&self) -> Result<Vec<SmileEntry>> {
        let resp = self.http.get(self.url("get-smiles")).send().await?;
        parse_json(resp).await
    }

    pub async fn image(&self, filename: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.url(&format!("get-image/{filename}")))
            .send()
            .await?;
        parse_bytes(resp).await
    }

    pub async fn status(&self) -> Result<ServerStatus> {
        let resp = self.http.get(self.url("status")).send().await?;
        parse_json(resp).await
    }
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        bail!("{}", server_error(status, &body));
    }
    serde_json::from_slice(&body).context("unexpected response body")
}

async fn parse_bytes(resp: reqwest::Response) -> Result<Vec<u8>> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        bail!("{}", server_error(status, &body));
    }
    Ok(body.to_vec())
}

/// Human-readable failure: the server's `{error}` message when present.
fn server_error(status: reqwest::StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(e) => format!("server error ({status}): {}", e.error),
        Err(_) => format!("server error ({status})"),
    }
}

/// One line describing a detect-smile result.
pub fn describe_detection(result: &DetectResult) -> String {
    if result.smile_detected {
        format!("smile detected at {}", result.coordinates)
    } else {
        "no smile".to_string()
    }
}
