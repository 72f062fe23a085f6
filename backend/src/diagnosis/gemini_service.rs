use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ImageInput, VisionError, VisionModel};
use crate::config::GeminiConfig;

#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, VisionError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn extract_text(response: GenerateContentResponse) -> Result<String, VisionError> {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(VisionError::Blocked(reason));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(VisionError::EmptyResponse)?;

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
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                return Err(VisionError::Blocked(reason));
            }
            return Err(VisionError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, prompt: &str, image: ImageInput<'_>) -> Result<String, VisionError> {
        let api_key = self.api_key.as_deref().ok_or(VisionError::NotConfigured)?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: BASE64.encode(image.data),
                        },
                    },
                ],
            }],
        };

        log::info!(
            "Sending {} byte {} image to {}",
            image.data.len(),
            image.mime_type,
            self.model
        );

        let response = self
            .http_client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            log::error!("Gemini API error {}: {}", status, message);
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        Self::extract_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_serializes_to_gemini_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::Text { text: "look" },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: BASE64.encode([1u8, 2, 3]),
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "look");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn text_parts_are_concatenated() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Early "},{"text":"blight"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(GeminiClient::extract_text(response).unwrap(), "Early blight");
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(
            GeminiClient::extract_text(response).unwrap_err(),
            VisionError::Blocked(reason) if reason == "SAFETY"
        ));
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response = parse(r#"{"candidates":[]}"#);
        assert!(matches!(
            GeminiClient::extract_text(response).unwrap_err(),
            VisionError::EmptyResponse
        ));
    }

    #[test]
    fn url_targets_the_configured_model() {
        let config = GeminiConfig {
            endpoint: "https://example.test/v1beta/".into(),
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.generate_url(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!client.is_configured());
    }

    #[actix_web::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(&GeminiConfig::default()).unwrap();
        let image = ImageInput {
            mime_type: "image/png",
            data: &[0u8; 4],
        };
        let err = client.generate("prompt", image).await.unwrap_err();
        assert!(matches!(err, VisionError::NotConfigured));
    }
}
