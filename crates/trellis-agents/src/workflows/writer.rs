use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use trellis_common::Result;

use crate::providers::{ChatMessage, LlmProvider, LlmRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Article,
    BlogPost,
    Email,
    SocialPost,
    Report,
}

impl ContentType {
    fn label(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::BlogPost => "blog post",
            ContentType::Email => "email",
            ContentType::SocialPost => "social media post",
            ContentType::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Persuasive,
    Informative,
}

impl Tone {
    fn label(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Persuasive => "persuasive",
            Tone::Informative => "informative",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriterOutcome {
    pub topic: String,
    pub outline: String,
    pub content: String,
    /// False when the polish step failed and the draft was returned as-is.
    pub polished: bool,
}

/// Three-stage content pipeline: outline, draft, polish. A polish failure
/// falls back to the draft rather than failing the whole request.
pub struct WriterWorkflow {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl WriterWorkflow {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn write(
        &self,
        topic: &str,
        content_type: ContentType,
        tone: Tone,
    ) -> Result<WriterOutcome> {
        let kind = content_type.label();
        let tone_label = tone.label();

        let outline = self
            .step(
                &format!(
                    "You are an editor planning a {tone_label} {kind}. Produce a \
                     short structured outline: sections with one-line notes."
                ),
                &format!("Topic: {topic}"),
            )
            .await?;

        let draft = self
            .step(
                &format!(
                    "You are a writer producing a {tone_label} {kind}. Follow \
                     the outline closely and write the full text."
                ),
                &format!("Topic: {topic}\n\nOutline:\n{outline}"),
            )
            .await?;

        let (content, polished) = match self
            .step(
                &format!(
                    "You are a copy editor. Polish this {kind} for clarity, \
                     flow and a consistent {tone_label} tone. Return only the \
                     improved text."
                ),
                &draft,
            )
            .await
        {
            Ok(polished) => (polished, true),
            Err(e) => {
                warn!("polish step failed, returning draft: {e}");
                (draft, false)
            }
        };

        Ok(WriterOutcome {
            topic: topic.to_string(),
            outline,
            content,
            polished,
        })
    }

    async fn step(&self, system: &str, user: &str) -> Result<String> {
        let mut request = LlmRequest::new(&self.model, vec![ChatMessage::user(user)]);
        request.system = Some(system.to_string());
        let response = self.provider.complete(&request).await?;
        Ok(response.text())
    }
}
