use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::types::{
    GenerationParams, GenerationResult, GenerationStatus, StatusSnapshot, TaskHandle,
};
use crate::GenerationBackend;

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Async HTTP client for a Z-Image generation service instance.
///
/// Implements [`GenerationBackend`]: job submission and status fetches, plus
/// a model-status helper for the submission precondition.
///
/// # Example
/// ```no_run
/// use zimage_client::{ZImageClient, GenerationParams, GenerationBackend};
///
/// # async fn example() -> zimage_client::Result<()> {
/// let client = ZImageClient::new("http://127.0.0.1:5000");
/// let params = GenerationParams::builder().build()?;
/// let handle = client.submit("a sunset over mountains", &params).await?;
/// let snapshot = client.fetch_status(&handle).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ZImageClient {
    http: Client,
    endpoint: String,
}

impl ZImageClient {
    /// Create a new client pointing at the given service endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn unreachable_err(&self, source: reqwest::Error) -> TrackerError {
        TrackerError::Network {
            context: format!(
                "Cannot connect to the generation service at {}. Is it running?",
                self.endpoint
            ),
            source,
        }
    }

    /// Check whether the service has a model loaded, via `/api/status`.
    pub async fn model_status(&self) -> Result<bool> {
        let url = format!("{}/api/status", self.endpoint);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| self.unreachable_err(e))?;

        let json: Value = resp.json().await.map_err(|e| TrackerError::Network {
            context: "Failed to parse model status response".into(),
            source: e,
        })?;

        Ok(json
            .get("model_loaded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

impl GenerationBackend for ZImageClient {
    async fn submit(&self, prompt: &str, params: &GenerationParams) -> Result<TaskHandle> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = serde_json::json!({
            "prompt": prompt,
            "width": params.width,
            "height": params.height,
            "steps": params.steps,
            "filename": params.filename,
            "optimize_prompt": params.optimize_prompt,
            "optimization_mode": params.optimization_mode.as_str(),
            "art_style": params.art_style,
            "character_description": params.character,
            "pose_description": params.pose,
            "background_description": params.background,
            "clothing_description": params.clothing,
            "lighting_description": params.lighting,
            "composition_description": params.composition,
            "additional_details": params.details,
        });

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable_err(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Http {
                status,
                body: body_text,
            });
        }

        let json: Value = resp.json().await.map_err(|e| TrackerError::Network {
            context: "Failed to parse submission response".into(),
            source: e,
        })?;

        parse_submit_response(&json)
    }

    async fn fetch_status(&self, handle: &TaskHandle) -> Result<StatusSnapshot> {
        let url = format!("{}/api/generate/progress/{}", self.endpoint, handle);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| TrackerError::Network {
                context: "Failed to fetch task status".into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(TrackerError::Http {
                status: resp.status().as_u16(),
                body: format!("Status fetch for task {} rejected", handle),
            });
        }

        let json: Value = resp.json().await.map_err(|e| TrackerError::Network {
            context: "Failed to parse task status response".into(),
            source: e,
        })?;

        parse_snapshot(&json)
    }
}

fn parse_submit_response(json: &Value) -> Result<TaskHandle> {
    let success = json.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
    if !success {
        let message = json
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Generation task could not be started");
        return Err(TrackerError::Submission(message.to_string()));
    }

    json.get("task_id")
        .and_then(|v| v.as_str())
        .map(TaskHandle::new)
        .ok_or_else(|| TrackerError::InvalidResponse("Response missing task_id".into()))
}

fn parse_snapshot(json: &Value) -> Result<StatusSnapshot> {
    let success = json.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
    if !success {
        let message = json
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Task not found");
        return Err(TrackerError::InvalidResponse(message.to_string()));
    }

    // Unknown status strings display as pending rather than killing the poll.
    let status = json
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(GenerationStatus::parse)
        .unwrap_or(GenerationStatus::Pending);

    let progress = json
        .get("progress")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
        .min(100) as u8;

    let stage = json
        .get("stage")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let message = json
        .get("message")
        .and_then(|v| v.as_str())
        .map(String::from);

    let result = if status == GenerationStatus::Completed {
        json.get("image_url")
            .and_then(|v| v.as_str())
            .map(|artifact_url| GenerationResult {
                artifact_url: artifact_url.to_string(),
                file_path: json
                    .get("file_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                final_prompt: json
                    .get("prompt")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            })
    } else {
        None
    };

    Ok(StatusSnapshot {
        status,
        progress,
        stage,
        result,
        message,
    })
}
