//! LLM-based metadata enrichment for exam questions.

pub mod error;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod syllabus;

use serde_json::{Map, Value};

pub use error::EnrichError;
pub use parser::EnrichedMetadata;
pub use provider::{AnthropicProvider, ModelProvider, OpenAiProvider, ProviderKind};
pub use syllabus::Subject;

use error::Result;

/// Client that turns OCR text plus existing metadata into structured
/// enrichment via a remote model.
///
/// The provider backend is injected at construction; see
/// [`EnrichmentClient::from_config`] for the environment-resolved path.
pub struct EnrichmentClient {
    provider: Box<dyn ModelProvider>,
}

impl EnrichmentClient {
    pub fn new(provider: Box<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// Builds a client from configuration, resolving the provider API key
    /// from the environment.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let provider = provider::provider_from_env(
            config.provider,
            config.model.as_deref(),
            std::time::Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(provider))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Builds the enrichment prompt without calling the model, so callers
    /// can preview or hand-edit it.
    pub fn build_prompt(
        &self,
        ocr_text: &str,
        existing: Option<&Map<String, Value>>,
    ) -> Result<String> {
        if ocr_text.trim().is_empty() {
            return Err(EnrichError::Input(
                "No question text provided for analysis".to_string(),
            ));
        }

        Ok(prompt::build_prompt(ocr_text, existing))
    }

    /// Analyzes question text and returns structured metadata.
    ///
    /// Empty text fails immediately without a network call.
    pub async fn enrich(
        &self,
        ocr_text: &str,
        existing: Option<&Map<String, Value>>,
    ) -> Result<EnrichedMetadata> {
        let prompt = self.build_prompt(ocr_text, existing)?;
        self.enrich_with_prompt(&prompt).await
    }

    /// Runs a caller-supplied prompt through the same call/parse path.
    pub async fn enrich_with_prompt(&self, prompt: &str) -> Result<EnrichedMetadata> {
        let raw = self.provider.complete(prompt).await?;
        log::debug!("Model response:\n{}", raw);
        parser::parse_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProvider {
        reply: String,
    }

    impl StubProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }

        fn name(&self) -> &'static str {
            "Stub"
        }
    }

    /// Provider double that fails the test if the client ever calls it.
    struct UnreachableProvider;

    #[async_trait]
    impl ModelProvider for UnreachableProvider {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            panic!("provider must not be called for empty input");
        }

        fn name(&self) -> &'static str {
            "Unreachable"
        }
    }

    #[tokio::test]
    async fn test_empty_text_fails_without_network_call() {
        let client = EnrichmentClient::new(Box::new(UnreachableProvider));

        let result = client.enrich("   \n", None).await;
        assert!(matches!(result, Err(EnrichError::Input(_))));
    }

    #[tokio::test]
    async fn test_enrich_parses_stubbed_reply() {
        let client = EnrichmentClient::new(Box::new(StubProvider::new(
            r#"{"question_type": "essay", "difficulty_level": "hard"}"#,
        )));

        let metadata = client.enrich("Discuss globalisation.", None).await.unwrap();
        assert_eq!(metadata.question_type.as_deref(), Some("essay"));
        assert_eq!(metadata.difficulty_level.as_deref(), Some("hard"));
    }

    #[tokio::test]
    async fn test_malformed_reply_becomes_parse_error() {
        let client =
            EnrichmentClient::new(Box::new(StubProvider::new("Sorry, I cannot help with that.")));

        let result = client.enrich("What is 2+2?", None).await;
        assert!(matches!(result, Err(EnrichError::Parse { .. })));
    }

    #[test]
    fn test_build_prompt_rejects_empty_text() {
        let client = EnrichmentClient::new(Box::new(StubProvider::new("{}")));
        assert!(client.build_prompt("", None).is_err());
    }
}
