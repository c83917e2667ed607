use super::{ClassificationResult, Classifier, parse_structured_result, prompt};
use crate::common::NormalizedImage;
use crate::config::ClassifierSettings;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

impl ApiError {
    fn reasons(&self) -> impl Iterator<Item = &str> {
        self.details
            .iter()
            .filter_map(|detail| detail.get("reason").and_then(Value::as_str))
    }
}

/// Whether an upstream failure means the credential was rejected.
fn is_auth_rejection(status: StatusCode, error: Option<&ApiError>) -> bool {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return true;
    }
    let Some(error) = error else {
        return false;
    };
    if error
        .reasons()
        .any(|reason| reason == "API_KEY_INVALID" || reason == "API_KEY_SERVICE_BLOCKED")
    {
        return true;
    }
    if error.status.as_deref() == Some("UNAUTHENTICATED") {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("api key not valid")
        || message.contains("api key expired")
        || message.contains("unregistered callers")
}

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiClassifier {
    http: reqwest::Client,
    url: String,
    api_key: String,
    strict_labels: bool,
}

impl GeminiClassifier {
    pub fn new(settings: &ClassifierSettings, api_key: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.endpoint.trim_end_matches('/'),
            settings.model
        );
        info!("Classifier endpoint: {}", url);
        Ok(Self {
            http,
            url,
            api_key: api_key.into(),
            strict_labels: settings.strict_labels,
        })
    }

    fn build_request<'a>(&self, image: &'a NormalizedImage) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt::instruction_text(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
            },
        }
    }

    fn upstream_failure(status: StatusCode, body: &str) -> AppError {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let api_error = envelope.as_ref().map(|envelope| &envelope.error);
        let message = match api_error {
            Some(api_error) if !api_error.message.is_empty() => api_error.message.clone(),
            _ if !body.trim().is_empty() => body.trim().to_string(),
            _ => status.to_string(),
        };

        if is_auth_rejection(status, api_error) {
            warn!("Classification service rejected the credential ({})", status);
            AppError::Auth(message)
        } else {
            error!("Classification service failed with {}: {}", status, message);
            AppError::Service(format!("{}: {}", status, message))
        }
    }

    fn extract_text(response: GenerateContentResponse) -> Result<String, AppError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(AppError::EmptyResponse)?;
        if let Some(reason) = candidate.finish_reason.as_deref() {
            debug!("Candidate finish reason: {}", reason);
        }
        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn classify(&self, image: &NormalizedImage) -> Result<ClassificationResult, AppError> {
        let request = self.build_request(image);
        debug!("Sending classification request ({} bytes of image)", image.bytes().len());

        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Self::upstream_failure(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Schema(format!("response body is not valid JSON: {}", e)))?;
        let text = Self::extract_text(parsed)?;
        let result = parse_structured_result(&text, self.strict_labels)?;
        info!(
            "Classified as {:?} ({:.3})",
            result.waste_type, result.confidence
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
