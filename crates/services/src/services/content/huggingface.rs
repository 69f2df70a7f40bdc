//! Hugging Face Inference API backend

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationError, GenerationRequest, TextBackend};

pub struct HuggingFaceBackend {
    client: Client,
    endpoint: String,
    model_id: String,
    token: SecretString,
}

impl HuggingFaceBackend {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
        token: SecretString,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model_id: model_id.into(),
            token,
        }
    }

    fn model_url(&self) -> String {
        format!(
            "{}/models/{}",
            self.endpoint.trim_end_matches('/'),
            self.model_id
        )
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<GeneratedText>),
    Single(GeneratedText),
    Error { error: String },
}

/// Extract the generated text from an Inference API response body
pub fn parse_inference_body(body: &str) -> Result<String, GenerationError> {
    let parsed: InferenceResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Parse(format!("{}: {}", e, body)))?;

    match parsed {
        InferenceResponse::Batch(items) => items
            .into_iter()
            .next()
            .map(|item| item.generated_text)
            .ok_or_else(|| GenerationError::Parse("empty generation batch".to_string())),
        InferenceResponse::Single(item) => Ok(item.generated_text),
        InferenceResponse::Error { error } => Err(GenerationError::Api {
            status: 200,
            message: error,
        }),
    }
}

#[async_trait]
impl TextBackend for HuggingFaceBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = InferenceRequest {
            inputs: &request.prompt,
            parameters: InferenceParameters {
                max_new_tokens: request.params.max_new_tokens,
                temperature: request.params.temperature,
                top_p: request.params.top_p,
                repetition_penalty: request.params.repetition_penalty,
                return_full_text: false,
            },
        };

        debug!("Requesting generation from {}", self.model_id);

        let response = self
            .client
            .post(self.model_url())
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        parse_inference_body(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_response() {
        let body = r#"[{"generated_text": "Hook line\nQuiz time! #EnglishLearning"}]"#;
        assert_eq!(
            parse_inference_body(body).unwrap(),
            "Hook line\nQuiz time! #EnglishLearning"
        );
    }

    #[test]
    fn test_parse_single_response() {
        let body = r#"{"generated_text": "single"}"#;
        assert_eq!(parse_inference_body(body).unwrap(), "single");
    }

    #[test]
    fn test_parse_error_body() {
        let body = r#"{"error": "Model is currently loading"}"#;
        match parse_inference_body(body) {
            Err(GenerationError::Api { message, .. }) => {
                assert_eq!(message, "Model is currently loading")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_batch_and_garbage() {
        assert!(matches!(
            parse_inference_body("[]"),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(
            parse_inference_body("<html>"),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn test_model_url_joins_endpoint() {
        let backend = HuggingFaceBackend::new(
            Client::new(),
            "https://api-inference.huggingface.co/",
            "meta-llama/Meta-Llama-3-8B-Instruct",
            SecretString::from("t".to_string()),
        );
        assert_eq!(
            backend.model_url(),
            "https://api-inference.huggingface.co/models/meta-llama/Meta-Llama-3-8B-Instruct"
        );
    }
}
