use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use trellis_common::Result;

use crate::providers::ToolDefinition;

pub mod catalog;
pub mod redmine;
pub mod vector;
pub mod web;

/// Context passed to every tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub conversation_id: Option<String>,
}

/// Result of a tool execution. Errors are carried as content so the model
/// can see what went wrong and recover.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A capability the model can invoke during a conversation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's input object.
    fn input_schema(&self) -> serde_json::Value;

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> Result<ToolOutput>;
}

/// Named lookup over a set of tools, plus their wire definitions.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

/// Read a required string argument from a tool input object.
pub(crate) fn required_str<'a>(
    input: &'a serde_json::Value,
    key: &str,
) -> std::result::Result<&'a str, ToolOutput> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolOutput::error(format!("missing required parameter: {key}")))
}

pub(crate) fn optional_str<'a>(input: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

pub(crate) fn optional_u64(input: &serde_json::Value, key: &str) -> Option<u64> {
    input.get(key).and_then(|v| v.as_u64())
}
