use async_trait::async_trait;
use futures_util::{stream, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::client::{error_message, provider_error};
use super::{Paragraph, NO_TRANSLATION};
use crate::{CoreResult, TranscriptorError};

/// Text-completion capability: run an instruction over a piece of text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, instruction: String, text: String) -> CoreResult<String>;
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for `POST {base}/chat/completions`
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionClient {
    async fn complete(&self, instruction: String, text: String) -> CoreResult<String> {
        let endpoint = format!("{}/chat/completions", self.base_url);

        let request_body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(instruction),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(text),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| provider_error("Translation", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptorError::Provider(error_message("Translation", status, &body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| provider_error("Translation", e))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Check if the target language asks for a translation at all
pub fn wants_translation(target_language: &str) -> bool {
    let target = target_language.trim();
    !target.is_empty() && target != NO_TRANSLATION
}

pub fn translation_instruction(target_language: &str) -> String {
    format!(
        "Translate the user provided text to {}. Return only the translated text, no quotes.",
        target_language
    )
}

/// Rewrites paragraph text into a target language, one request per paragraph, in order
pub struct TranslationStage {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl TranslationStage {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    pub async fn translate(&self, paragraphs: Vec<Paragraph>, target_language: &str) -> CoreResult<Vec<Paragraph>> {
        if !wants_translation(target_language) {
            return Ok(paragraphs);
        }

        let provider = self.provider.as_deref().ok_or_else(|| {
            TranscriptorError::Provider("translation provider is not configured".to_string())
        })?;

        tracing::info!("Translating {} paragraphs to {}", paragraphs.len(), target_language);

        let instruction = translation_instruction(target_language);
        let instruction = instruction.as_str();
        let capacity = paragraphs.len();

        // try_fold awaits each request before starting the next
        stream::iter(paragraphs.into_iter().map(Ok::<_, TranscriptorError>))
            .try_fold(Vec::with_capacity(capacity), |mut translated, paragraph| async move {
                let text = provider
                    .complete(instruction.to_string(), paragraph.text.clone())
                    .await?;
                let text = text.trim();

                translated.push(Paragraph {
                    start: paragraph.start,
                    end: paragraph.end,
                    text: if text.is_empty() { paragraph.text } else { text.to_string() },
                });
                Ok::<_, TranscriptorError>(translated)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn para(start: f64, end: f64, text: &str) -> Paragraph {
        Paragraph {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_original_is_a_no_op() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().never();

        let stage = TranslationStage::new(Some(Arc::new(provider)));
        let input = vec![para(0.0, 10.5, "hola")];
        assert_eq!(stage.translate(input.clone(), "original").await.unwrap(), input);
    }

    #[tokio::test]
    async fn test_paragraphs_translated_in_order() {
        let mut seq = Sequence::new();
        let mut provider = MockCompletionProvider::new();
        for (source, target) in [("uno", " one "), ("dos", "two")] {
            provider
                .expect_complete()
                .withf(move |instruction, text| instruction.contains("English") && text == source)
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _| Ok(target.to_string()));
        }

        let stage = TranslationStage::new(Some(Arc::new(provider)));
        let output = stage
            .translate(vec![para(0.0, 10.0, "uno"), para(10.0, 12.5, "dos")], "English")
            .await
            .unwrap();

        assert_eq!(output, vec![para(0.0, 10.0, "one"), para(10.0, 12.5, "two")]);
    }

    #[tokio::test]
    async fn test_empty_translation_keeps_source_text() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().returning(|_, _| Ok("   ".to_string()));

        let stage = TranslationStage::new(Some(Arc::new(provider)));
        let output = stage.translate(vec![para(1.0, 2.0, "bonjour")], "German").await.unwrap();
        assert_eq!(output, vec![para(1.0, 2.0, "bonjour")]);
    }

    #[tokio::test]
    async fn test_provider_failure_fails_the_stage() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_, _| Err(TranscriptorError::Provider("rate limited".to_string())));

        let stage = TranslationStage::new(Some(Arc::new(provider)));
        let err = stage
            .translate(vec![para(0.0, 1.0, "a"), para(1.0, 2.0, "b")], "French")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_an_error() {
        let stage = TranslationStage::new(None);
        let err = stage.translate(vec![para(0.0, 1.0, "a")], "French").await.unwrap_err();
        assert!(matches!(err, TranscriptorError::Provider(_)));

        // but no translation needs no provider
        assert!(stage.translate(vec![], "original").await.is_ok());
    }
}
