//! Best-effort photo captioning.
//!
//! A vision model is asked which fixture a photo shows. Every failure path
//! degrades to [`Classification::unknown`], and unknown results fall back to
//! file-name keywords. Nothing else in the pipeline depends on this module.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::models::ReportImage;

pub const CLASSIFY_PROMPT: &str = "This photo was taken during a water conservation retrofit. \
     Which fixture does it show? Reply with exactly one of: tub, kitchen_sink, bathroom_sink, unknown.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureLabel {
    Tub,
    KitchenSink,
    BathroomSink,
    Unknown,
}

impl FixtureLabel {
    pub fn caption(self) -> Option<&'static str> {
        match self {
            FixtureLabel::Tub => Some("Tub"),
            FixtureLabel::KitchenSink => Some("Kitchen Sink"),
            FixtureLabel::BathroomSink => Some("Bathroom Sink"),
            FixtureLabel::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: FixtureLabel,
    /// Keyword-derived, not a calibrated probability.
    pub confidence: f32,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            label: FixtureLabel::Unknown,
            confidence: 0.0,
        }
    }
}

const TUB_WORDS: [&str; 5] = ["bathtub", "tub", "spout", "diverter", "shower"];
const KITCHEN_WORDS: [&str; 2] = ["kitchen", "galley"];
const BATHROOM_WORDS: [&str; 4] = ["bathroom", "vanity", "lavatory", "washbasin"];

fn match_words(text: &str) -> Option<FixtureLabel> {
    if KITCHEN_WORDS.iter().any(|w| text.contains(w)) {
        Some(FixtureLabel::KitchenSink)
    } else if TUB_WORDS.iter().any(|w| text.contains(w)) {
        Some(FixtureLabel::Tub)
    } else if BATHROOM_WORDS.iter().any(|w| text.contains(w)) {
        Some(FixtureLabel::BathroomSink)
    } else {
        None
    }
}

/// Maps the model's free-text reply to a label.
pub fn parse_reply(reply: &str) -> Classification {
    let normalized = reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '_')
        .to_lowercase();

    let exact = match normalized.as_str() {
        "tub" => Some(FixtureLabel::Tub),
        "kitchen_sink" => Some(FixtureLabel::KitchenSink),
        "bathroom_sink" => Some(FixtureLabel::BathroomSink),
        _ => None,
    };
    if let Some(label) = exact {
        return Classification {
            label,
            confidence: 0.9,
        };
    }

    match match_words(&normalized) {
        Some(label) => Classification {
            label,
            confidence: 0.8,
        },
        None => Classification::unknown(),
    }
}

/// What a classifier gets to look at.
#[derive(Debug, Clone, Default)]
pub struct ImageInput {
    pub file_name: String,
    pub data_url: Option<String>,
}

#[async_trait]
pub trait FixtureClassifier: Send + Sync {
    /// Never fails; problems degrade to an unknown classification.
    async fn classify(&self, image: &ImageInput) -> Classification;
}

/// File-name heuristic used when the model cannot say.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_name(&self, file_name: &str) -> Classification {
        let normalized = file_name.to_lowercase();
        match match_words(&normalized) {
            Some(label) => Classification {
                label,
                confidence: 0.5,
            },
            None => Classification::unknown(),
        }
    }
}

#[async_trait]
impl FixtureClassifier for KeywordClassifier {
    async fn classify(&self, image: &ImageInput) -> Classification {
        self.classify_name(&image.file_name)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions vision endpoint (OpenAI-compatible).
pub struct VisionClassifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl VisionClassifier {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    async fn request_reply(&self, data_url: &str) -> ReportResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ReportError::Classifier("no vision API key configured".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 10,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": CLASSIFY_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReportError::Classifier(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ReportError::Classifier(format!("{status}: {text}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Classifier(format!("failed to parse response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReportError::Classifier("no completion in response".to_string()))
    }
}

#[async_trait]
impl FixtureClassifier for VisionClassifier {
    async fn classify(&self, image: &ImageInput) -> Classification {
        let Some(data_url) = image.data_url.as_deref() else {
            return Classification::unknown();
        };
        match self.request_reply(data_url).await {
            Ok(reply) => {
                let result = parse_reply(&reply);
                tracing::debug!(file = %image.file_name, reply = %reply.trim(), label = ?result.label, "classified photo");
                result
            }
            Err(err) => {
                tracing::warn!(file = %image.file_name, error = %err, "photo classification failed");
                Classification::unknown()
            }
        }
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn encode_data_url(path: &Path) -> ReportResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes)))
}

/// Captions every uncaptioned image, one request at a time.
///
/// Returns how many captions were set.
pub async fn caption_images(
    images: &mut [ReportImage],
    classifier: &dyn FixtureClassifier,
    delay: Duration,
) -> usize {
    let fallback = KeywordClassifier;
    let mut captioned = 0;
    let mut first_request = true;

    for image in images.iter_mut() {
        if image.caption.as_deref().is_some_and(|c| !c.trim().is_empty()) {
            continue;
        }

        let data_url = match image.path.as_deref() {
            Some(path) => match encode_data_url(Path::new(path)) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(file = %image.file_name, error = %err, "could not read photo");
                    None
                }
            },
            None => None,
        };

        let mut result = Classification::unknown();
        if data_url.is_some() {
            if !first_request && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            first_request = false;
            let input = ImageInput {
                file_name: image.file_name.clone(),
                data_url,
            };
            result = classifier.classify(&input).await;
        }
        if result.label == FixtureLabel::Unknown {
            result = fallback.classify_name(&image.file_name);
        }

        if let Some(caption) = result.label.caption() {
            image.caption = Some(caption.to_string());
            captioned += 1;
        }
    }

    captioned
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(FixtureLabel);

    #[async_trait]
    impl FixtureClassifier for FixedClassifier {
        async fn classify(&self, _image: &ImageInput) -> Classification {
            Classification {
                label: self.0,
                confidence: 0.9,
            }
        }
    }

    #[test]
    fn exact_replies_score_highest() {
        assert_eq!(
            parse_reply("kitchen_sink"),
            Classification {
                label: FixtureLabel::KitchenSink,
                confidence: 0.9
            }
        );
        assert_eq!(parse_reply(" Tub. ").confidence, 0.9);
    }

    #[test]
    fn synonyms_score_lower() {
        let result = parse_reply("It looks like a bathtub with a diverter");
        assert_eq!(result.label, FixtureLabel::Tub);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(parse_reply("a bathroom vanity").label, FixtureLabel::BathroomSink);
        assert_eq!(parse_reply("Kitchen sink").label, FixtureLabel::KitchenSink);
    }

    #[test]
    fn unrecognised_reply_is_unknown() {
        assert_eq!(parse_reply("a dog"), Classification::unknown());
        assert_eq!(parse_reply("unknown"), Classification::unknown());
    }

    #[test]
    fn keyword_fallback_reads_file_names() {
        let keywords = KeywordClassifier;
        assert_eq!(
            keywords.classify_name("A01_Kitchen_after.jpg").label,
            FixtureLabel::KitchenSink
        );
        assert_eq!(keywords.classify_name("IMG_0001.jpg").label, FixtureLabel::Unknown);
    }

    #[tokio::test]
    async fn vision_without_key_degrades_to_unknown() {
        let classifier = VisionClassifier::new("http://127.0.0.1:9", None, "gpt-4o-mini");
        let input = ImageInput {
            file_name: "x.jpg".to_string(),
            data_url: Some("data:image/jpeg;base64,AAAA".to_string()),
        };
        assert_eq!(classifier.classify(&input).await, Classification::unknown());
    }

    #[tokio::test]
    async fn captions_only_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("IMG_1.jpg");
        std::fs::write(&photo, [0xFF, 0xD8, 0xFF]).unwrap();

        let mut images = vec![
            ReportImage {
                unit: "A01".to_string(),
                file_name: "IMG_1.jpg".to_string(),
                path: Some(photo.display().to_string()),
                ..ReportImage::default()
            },
            ReportImage {
                unit: "A01".to_string(),
                file_name: "a01-bathroom.jpg".to_string(),
                ..ReportImage::default()
            },
            ReportImage {
                unit: "A02".to_string(),
                file_name: "IMG_2.jpg".to_string(),
                caption: Some("Kept".to_string()),
                ..ReportImage::default()
            },
            ReportImage {
                unit: "A02".to_string(),
                file_name: "IMG_3.jpg".to_string(),
                ..ReportImage::default()
            },
        ];

        let classifier = FixedClassifier(FixtureLabel::Tub);
        let count = caption_images(&mut images, &classifier, Duration::ZERO).await;
        assert_eq!(count, 2);
        assert_eq!(images[0].caption.as_deref(), Some("Tub"));
        // no file on disk, so only the name heuristic applies
        assert_eq!(images[1].caption.as_deref(), Some("Bathroom Sink"));
        assert_eq!(images[2].caption.as_deref(), Some("Kept"));
        assert_eq!(images[3].caption, None);
    }
}
