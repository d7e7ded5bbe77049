//! Analysis / transformation collaborator client.
//!
//! Calls are blocking; the studio runs them on the blocking pool under a
//! timeout, so nothing here touches the render path.

use crate::config::{CaptureMode, Config};
use facepaint_core::{AnalysisResult, CapturePayload, LayerSettings, TransformationResult};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("backend reported failure: {error}{}", detail_suffix(.details))]
    Rejected {
        error: String,
        details: Option<String>,
    },
}

fn detail_suffix(details: &Option<String>) -> String {
    details.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}

/// One capture submission.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub mode: CaptureMode,
    /// JPEG data URL of the snapshot.
    pub image_data: String,
    pub settings: LayerSettings,
    /// Name of the last applied preset, if any.
    pub look_id: Option<String>,
}

impl CaptureRequest {
    /// JSON body for the collaborator.
    pub fn body(&self) -> serde_json::Value {
        match self.mode {
            CaptureMode::Analysis => serde_json::json!({
                "imageData": self.image_data,
                "settings": self.settings,
            }),
            CaptureMode::Transformation => serde_json::json!({
                "imageData": self.image_data,
                "lookStyle": self.settings,
                "lookId": self.look_id.as_deref().unwrap_or("custom"),
            }),
        }
    }
}

/// A collaborator that turns a snapshot into a capture payload.
pub trait CaptureBackend: Send + Sync + 'static {
    fn submit(&self, request: &CaptureRequest) -> Result<CapturePayload, BackendError>;
}

/// HTTP JSON collaborator.
pub struct HttpBackend {
    agent: ureq::Agent,
    analysis_url: String,
    transform_url: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Self {
        let timeout = config.request_timeout();
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            analysis_url: config.analysis_url.clone(),
            transform_url: config.transform_url.clone(),
            timeout,
        }
    }
}

impl CaptureBackend for HttpBackend {
    fn submit(&self, request: &CaptureRequest) -> Result<CapturePayload, BackendError> {
        let url = match request.mode {
            CaptureMode::Analysis => &self.analysis_url,
            CaptureMode::Transformation => &self.transform_url,
        };

        let response = self
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_json(request.body())
            .map_err(|e| match e {
                ureq::Error::Status(status, resp) => BackendError::Status {
                    status,
                    body: resp.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(t) => {
                    let msg = t.to_string();
                    if msg.contains("timeout") || msg.contains("timed out") {
                        BackendError::Timeout(self.timeout)
                    } else {
                        BackendError::Transport(msg)
                    }
                }
            })?;

        let text = response
            .into_string()
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        parse_response(request, &text)
    }
}

/// Raw collaborator response; both success shapes share one envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    success: Option<bool>,
    error: Option<String>,
    details: Option<String>,
    skin_tone: Option<String>,
    #[serde(default)]
    undertone: Option<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    recommendations: serde_json::Value,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(alias = "transformed_image", alias = "processed_image")]
    transformed_image: Option<String>,
}

/// Interpret a response body for `request`.
pub fn parse_response(request: &CaptureRequest, body: &str) -> Result<CapturePayload, BackendError> {
    let env: Envelope = serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    if env.success == Some(false) || (env.success.is_none() && env.error.is_some()) {
        return Err(BackendError::Rejected {
            error: env.error.unwrap_or_else(|| "unknown error".into()),
            details: env.details,
        });
    }

    match request.mode {
        CaptureMode::Analysis => {
            let skin_tone = env
                .skin_tone
                .ok_or_else(|| BackendError::Malformed("missing skinTone".into()))?;
            Ok(CapturePayload::Analysis(AnalysisResult {
                skin_tone,
                undertone: env.undertone,
                concerns: env.concerns,
                recommendations: env.recommendations,
                confidence: env.confidence.unwrap_or_default(),
            }))
        }
        CaptureMode::Transformation => {
            let transformed = env
                .transformed_image
                .ok_or_else(|| BackendError::Malformed("missing transformed_image".into()))?;
            Ok(CapturePayload::Transformation(TransformationResult {
                original: request.image_data.clone(),
                transformed,
            }))
        }
    }
}
