//! Decoded frames of the generate stream

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Which half of the two-phase answer a frame carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Reasoning is still being produced; the answer is not available yet
    Thinking,
    /// Reasoning is complete and the answer is (partially) available
    Response,
    /// Missing or unrecognized `phase` value, kept verbatim for logging
    Other(Option<String>),
}

impl Phase {
    fn from_field(value: Option<&str>) -> Self {
        match value {
            Some("thinking") => Self::Thinking,
            Some("response") => Self::Response,
            other => Self::Other(other.map(str::to_string)),
        }
    }
}

/// A retrieved passage the backend used as context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSource {
    #[serde(default = "unknown_source")]
    pub source: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

/// One complete top-level object from the generate stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub phase: Phase,
    pub think: Option<String>,
    pub response: Option<String>,
    pub context_sources: Vec<ContextSource>,
}

impl StreamFrame {
    /// Read a frame out of an arbitrary JSON object.
    ///
    /// Fields of the wrong type are treated as absent; a frame is never
    /// rejected for its content.
    pub fn from_value(value: &Value) -> Self {
        let context_sources = value["context_sources"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| ContextSource::deserialize(item).ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            phase: Phase::from_field(value["phase"].as_str()),
            think: value["think"].as_str().map(str::to_string),
            response: value["response"].as_str().map(str::to_string),
            context_sources,
        }
    }

    pub fn think_or_empty(&self) -> &str {
        self.think.as_deref().unwrap_or_default()
    }

    pub fn response_or_empty(&self) -> &str {
        self.response.as_deref().unwrap_or_default()
    }
}
