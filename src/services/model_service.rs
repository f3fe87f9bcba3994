use std::pin::Pin;
use std::time::Duration;

use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::Config,
    constants::quiz_prompt::{exclusion_instruction, DOCUMENT_INSTRUCTION, QUIZ_GENERATION_PROMPT},
    errors::{AppError, AppResult},
    models::domain::{
        document::GenerationRequest,
        question::{Question, QuestionBatch},
    },
    services::stream_parser::generation_stream,
};

/// Structured-output schema sent with every request.
static BATCH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema =
        serde_json::to_value(schemars::schema_for!(QuestionBatch)).unwrap_or_default();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
});

/// Progressive output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// Questions fully received so far; not yet validated as a batch.
    Progress { questions: Vec<Question> },
    /// The validated batch. Always the last item of a successful stream.
    Complete(QuestionBatch),
}

pub type GenerationStream = Pin<Box<dyn Stream<Item = AppResult<GenerationEvent>> + Send>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Starts one generation call for the document in `request`.
    async fn stream_batch(&self, request: GenerationRequest) -> AppResult<GenerationStream>;
}

/// Drains a generation stream and returns its validated batch.
pub async fn collect_batch(mut stream: GenerationStream) -> AppResult<QuestionBatch> {
    while let Some(event) = stream.next().await {
        if let GenerationEvent::Complete(batch) = event? {
            return Ok(batch);
        }
    }

    Err(AppError::GenerationError(
        "model stream ended without a complete batch".to_string(),
    ))
}

pub async fn generate_batch(
    generator: &dyn QuestionGenerator,
    request: GenerationRequest,
) -> AppResult<QuestionBatch> {
    collect_batch(generator.stream_batch(request).await?).await
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl ChatCompletionChunk {
    fn into_text(self) -> AppResult<String> {
        let mut text = String::new();
        for choice in self.choices {
            if let Some(refusal) = choice.delta.refusal.filter(|r| !r.is_empty()) {
                return Err(AppError::GenerationError(format!(
                    "model refused the request: {}",
                    refusal
                )));
            }
            if let Some(content) = choice.delta.content {
                text.push_str(&content);
            }
        }
        Ok(text)
    }
}

/// Generates questions through an OpenAI-compatible chat completions endpoint.
pub struct OpenAiQuestionGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiQuestionGenerator {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.model_api_key.expose_secret())
            .with_api_base(&config.model_api_base);

        Self {
            client: Client::with_config(openai_config),
            model: config.model_name.clone(),
            timeout: config.model_timeout(),
        }
    }

    fn build_request(&self, request: &GenerationRequest) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": QUIZ_GENERATION_PROMPT,
        })];

        if let Some(exclusions) = exclusion_instruction(&request.exclude_questions) {
            messages.push(json!({ "role": "system", "content": exclusions }));
        }

        messages.push(json!({
            "role": "user",
            "content": [
                { "type": "text", "text": DOCUMENT_INSTRUCTION },
                {
                    "type": "file",
                    "file": {
                        "filename": "document.pdf",
                        "file_data": request.document.to_data_url(),
                    }
                }
            ]
        }));

        json!({
            "model": self.model,
            "stream": true,
            "messages": messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "question_batch",
                    "schema": BATCH_SCHEMA.clone(),
                }
            }
        })
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiQuestionGenerator {
    async fn stream_batch(&self, request: GenerationRequest) -> AppResult<GenerationStream> {
        log::info!(
            "Requesting question batch from {} for document {} ({} bytes, {} excluded)",
            self.model,
            request.document.short_digest(),
            request.document.len(),
            request.exclude_questions.len()
        );

        let body = self.build_request(&request);
        let chunks = self.client.chat().create_stream_byot(body).await?;

        let deltas = chunks.map(|chunk: Result<ChatCompletionChunk, OpenAIError>| {
            chunk.map_err(AppError::from).and_then(ChatCompletionChunk::into_text)
        });

        Ok(generation_stream(deltas, self.timeout))
    }
}
