//! Model-backed translator.
//!
//! Talks to an OpenAI-compatible chat completion endpoint (for example a
//! llama.cpp server hosting the configured GGUF model).

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;

use super::{parser, prompt, Translation, TranslationError, TranslationRequest};

const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.1;

pub struct ModelTranslator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl std::fmt::Debug for ModelTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTranslator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ModelTranslator {
    /// Create a client for `model` served at `api_base`.
    ///
    /// The API key comes from `OPENAI_API_KEY` when set; local servers accept
    /// any value.
    pub fn new(api_base: &str, model: impl Into<String>) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "local".to_string());
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    #[allow(deprecated)]
    pub async fn translate(
        &self,
        request: &TranslationRequest<'_>,
    ) -> Result<Translation, TranslationError> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt::SYSTEM_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt::build_prompt(request))
                .build()?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(MAX_TOKENS)
            .temperature(TEMPERATURE)
            .build()?;

        tracing::debug!("Requesting translation from model {}", self.model);
        let response = self.client.chat().create(chat_request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(TranslationError::EmptyReply)?;

        parser::parse_reply(&content, &self.model)
    }
}
