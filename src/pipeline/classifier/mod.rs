pub mod gemini;
pub mod prompt;

use crate::common::NormalizedImage;
use crate::error::AppError;
use crate::pipeline::taxonomy::WasteCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::warn;

pub use gemini::GeminiClassifier;

/// The four fields the classification service must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub waste_type: String,
    pub confidence: f64,
    pub reasoning: String,
    pub disposal_method: String,
}

impl ClassificationResult {
    pub fn category(&self) -> Option<WasteCategory> {
        WasteCategory::from_label(&self.waste_type)
    }
}

/// Strips a Markdown code fence some models wrap around their JSON.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The info string (`json`, `JSON`, ...) runs to the end of the first line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses and validates the structured text of a candidate.
pub fn parse_structured_result(
    text: &str,
    strict_labels: bool,
) -> Result<ClassificationResult, AppError> {
    let result: ClassificationResult = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::Schema(e.to_string()))?;

    if result.waste_type.trim().is_empty() {
        return Err(AppError::Schema("waste_type is empty".to_string()));
    }
    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(AppError::Schema(format!(
            "confidence {} is outside [0, 1]",
            result.confidence
        )));
    }

    match result.category() {
        Some(category) => {
            if WasteCategory::from_disposal_method(&result.disposal_method) != Some(category) {
                warn!(
                    "Disposal method {:?} does not match {}; expected {:?}",
                    result.disposal_method,
                    category,
                    category.disposal_method()
                );
            }
        }
        None if strict_labels => {
            return Err(AppError::Schema(format!(
                "unknown waste_type {:?}",
                result.waste_type
            )));
        }
        None => {
            warn!("Unknown waste_type {:?} from classifier", result.waste_type);
        }
    }
    Ok(result)
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &NormalizedImage) -> Result<ClassificationResult, AppError>;
    fn name(&self) -> &'static str;
}

/// Adapts any [`Classifier`] into a tower service.
#[derive(Clone)]
pub struct ClassificationService {
    inner: Arc<dyn Classifier>,
}

impl ClassificationService {
    pub fn new(inner: Box<dyn Classifier>) -> Self {
        Self {
            inner: Arc::from(inner),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl Service<NormalizedImage> for ClassificationService {
    type Response = ClassificationResult;
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, image: NormalizedImage) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { inner.classify(&image).await })
    }
}
