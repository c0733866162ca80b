use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trellis_common::{Error, Result};

use crate::providers::{ChatMessage, LlmProvider, LlmRequest};

/// Where a query should be answered from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Datasource {
    RedmineTools,
    WebSearch,
    DirectAnswer,
}

impl Datasource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datasource::RedmineTools => "redmine_tools",
            Datasource::WebSearch => "web_search",
            Datasource::DirectAnswer => "direct_answer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub datasource: Datasource,
    pub reasoning: String,
}

const ROUTER_SYSTEM_PROMPT: &str = "\
You are an expert at routing a user question to the right datasource.

Datasources:
- redmine_tools: questions about projects, issues, tickets, time entries, \
statuses, priorities, trackers, users, or anything else in the project \
tracker.
- web_search: questions about current events, recent developments, or \
topics that need up-to-date external information.
- direct_answer: greetings, small talk, and general knowledge questions \
answerable without any external data.

Respond with a JSON object: \
{\"datasource\": \"redmine_tools\" | \"web_search\" | \"direct_answer\", \
\"reasoning\": \"one sentence\"}";

/// Classifies a query into a datasource using a structured LLM call.
pub struct QueryRouter {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl QueryRouter {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Route a query. Parse failures fall back to the tracker tools, which
    /// can handle the widest range of questions.
    pub async fn route(&self, query: &str) -> Result<RouteDecision> {
        let mut request = LlmRequest::new(&self.model, vec![ChatMessage::user(query)]);
        request.system = Some(ROUTER_SYSTEM_PROMPT.to_string());
        request.temperature = Some(0.0);
        request.json_response = true;

        let response = self.provider.complete(&request).await?;
        let text = response.text();

        match parse_json_object::<RouteDecision>(&text) {
            Ok(decision) => {
                debug!(
                    datasource = decision.datasource.as_str(),
                    reasoning = %decision.reasoning,
                    "routed query"
                );
                Ok(decision)
            }
            Err(e) => {
                warn!("router output was not valid JSON ({e}); defaulting to redmine_tools");
                Ok(RouteDecision {
                    datasource: Datasource::RedmineTools,
                    reasoning: "router output unparseable; defaulted to tracker tools"
                        .to_string(),
                })
            }
        }
    }
}

/// A yes/no judgment with reasoning, used for relevance, grounding and
/// usefulness checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeVerdict {
    pub binary_score: String,
    pub reasoning: String,
}

impl GradeVerdict {
    pub fn is_yes(&self) -> bool {
        self.binary_score.trim().eq_ignore_ascii_case("yes")
    }
}

/// Structured yes/no graders over retrieved documents and generated
/// answers. Wired in but disabled by default; enable via config.
pub struct Grader {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl Grader {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Is this document relevant to the question?
    pub async fn grade_relevance(&self, question: &str, document: &str) -> Result<GradeVerdict> {
        self.grade(
            "You grade whether a retrieved document is relevant to a user \
             question. Respond with a JSON object: \
             {\"binary_score\": \"yes\" | \"no\", \"reasoning\": \"one sentence\"}",
            &format!("Question: {question}\n\nDocument:\n{document}"),
        )
        .await
    }

    /// Is this answer grounded in the provided documents?
    pub async fn grade_grounding(&self, documents: &str, answer: &str) -> Result<GradeVerdict> {
        self.grade(
            "You grade whether an answer is grounded in the provided facts, \
             with no hallucinated claims. Respond with a JSON object: \
             {\"binary_score\": \"yes\" | \"no\", \"reasoning\": \"one sentence\"}",
            &format!("Facts:\n{documents}\n\nAnswer:\n{answer}"),
        )
        .await
    }

    /// Does this answer actually address the question?
    pub async fn grade_usefulness(&self, question: &str, answer: &str) -> Result<GradeVerdict> {
        self.grade(
            "You grade whether an answer resolves the user's question. \
             Respond with a JSON object: \
             {\"binary_score\": \"yes\" | \"no\", \"reasoning\": \"one sentence\"}",
            &format!("Question: {question}\n\nAnswer:\n{answer}"),
        )
        .await
    }

    async fn grade(&self, system: &str, user: &str) -> Result<GradeVerdict> {
        let mut request = LlmRequest::new(&self.model, vec![ChatMessage::user(user)]);
        request.system = Some(system.to_string());
        request.temperature = Some(0.0);
        request.json_response = true;

        let response = self.provider.complete(&request).await?;
        parse_json_object(&response.text())
    }
}

/// Parse a JSON object out of model output, tolerating markdown fences and
/// surrounding prose.
pub(crate) fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Rescue `{...}` from fenced or chatty output.
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            return serde_json::from_str(&trimmed[start..=end]).map_err(Error::from);
        }
    }

    Err(Error::Agent(format!(
        "no JSON object found in model output: {}",
        trimmed.chars().take(120).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let decision: RouteDecision = parse_json_object(
            r#"{"datasource": "web_search", "reasoning": "asks about current events"}"#,
        )
        .expect("parse");
        assert_eq!(decision.datasource, Datasource::WebSearch);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"datasource\": \"direct_answer\", \"reasoning\": \"greeting\"}\n```";
        let decision: RouteDecision = parse_json_object(text).expect("parse");
        assert_eq!(decision.datasource, Datasource::DirectAnswer);
    }

    #[test]
    fn parses_json_with_surrounding_prose() {
        let text = "Sure, here is the result: {\"binary_score\": \"Yes\", \"reasoning\": \"relevant\"} Hope that helps.";
        let verdict: GradeVerdict = parse_json_object(text).expect("parse");
        assert!(verdict.is_yes());
    }

    #[test]
    fn rejects_non_json() {
        let result: Result<RouteDecision> = parse_json_object("I think redmine is best");
        assert!(result.is_err());
    }

    #[test]
    fn verdict_no_is_not_yes() {
        let verdict = GradeVerdict {
            binary_score: "no".to_string(),
            reasoning: "off topic".to_string(),
        };
        assert!(!verdict.is_yes());
    }
}
