use serde::{Deserialize, Serialize};

use crate::error::TicktickError;

/// A tool exposed by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A single content block returned by a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// The result of calling a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallResult {
    /// A successful result carrying `value` as pretty-printed JSON.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ContentBlock::Text { text }],
            is_error: false,
        }
    }

    /// Text of all content blocks, joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Deserialize the text content as a typed value.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TicktickError> {
        serde_json::from_str(&self.text()).map_err(|e| {
            TicktickError::TransportError(format!("failed to deserialize tool result: {e}").into())
        })
    }
}
