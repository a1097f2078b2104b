//! Agent contracts.
//!
//! Each agent is a prompt builder plus a tolerant parser for what comes back.
//! The model itself sits behind the [`Generator`] trait so the pipeline can run
//! against Claude, a scripted test double, or anything else that turns a prompt
//! into text.
//!
//! Agents never decide what happens when a call fails: they return
//! [`GenerateError`] and each call site in the pipeline substitutes its own
//! documented fallback.

pub mod archivist;
pub mod cartographer;
pub mod creator;
pub mod director;
pub mod dreamer;
pub mod narrator;
pub mod scribe;

use async_trait::async_trait;
use claude::{Claude, Message, Request};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors from a collaborator call.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("API error: {0}")]
    Api(#[from] claude::Error),

    #[error("Failed to parse {agent} response: {message}")]
    Parse { agent: Agent, message: String },

    #[error("{0} returned an empty response")]
    Empty(Agent),

    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

impl GenerateError {
    pub(crate) fn parse(agent: Agent, message: impl Into<String>) -> Self {
        Self::Parse {
            agent,
            message: message.into(),
        }
    }
}

/// The agents that make up a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agent {
    /// Movement and target detection, plus travel events.
    Cartographer,
    /// Mechanical outcome of the action, as a delta.
    Archivist,
    /// Pacing, tension and objective.
    Director,
    /// Player-facing prose.
    Narrator,
    /// Entities and lore introduced by the prose.
    Scribe,
    /// New entities on demand.
    Creator,
    /// Speculative entities for the shadow queue.
    Dreamer,
}

impl Agent {
    pub fn name(&self) -> &'static str {
        match self {
            Agent::Cartographer => "cartographer",
            Agent::Archivist => "archivist",
            Agent::Director => "director",
            Agent::Narrator => "narrator",
            Agent::Scribe => "scribe",
            Agent::Creator => "creator",
            Agent::Dreamer => "dreamer",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single request to the model.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub agent: Agent,
    pub system: String,
    pub user: String,
    /// Whether the reply must be a JSON document.
    pub expects_json: bool,
}

impl Prompt {
    pub fn json(agent: Agent, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            agent,
            system: system.into(),
            user: user.into(),
            expects_json: true,
        }
    }

    pub fn text(agent: Agent, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            agent,
            system: system.into(),
            user: user.into(),
            expects_json: false,
        }
    }
}

/// Something that turns a prompt into text.
///
/// Calls are latent and fallible. There is no retry at this level.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerateError>;
}

/// Run a prompt and parse the reply as JSON.
pub async fn generate_json(
    generator: &dyn Generator,
    prompt: &Prompt,
) -> Result<Value, GenerateError> {
    let reply = generator.generate(prompt).await?;
    let json = extract_json(&reply);
    if json.is_empty() {
        return Err(GenerateError::Empty(prompt.agent));
    }
    serde_json::from_str(json).map_err(|e| GenerateError::parse(prompt.agent, e.to_string()))
}

/// Run a prompt and return the trimmed reply, rejecting blank output.
pub async fn generate_text(
    generator: &dyn Generator,
    prompt: &Prompt,
) -> Result<String, GenerateError> {
    let reply = generator.generate(prompt).await?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(GenerateError::Empty(prompt.agent));
    }
    Ok(reply.to_string())
}

/// Extract JSON from a reply that may be wrapped in markdown fences or prose.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    // ```json ... ```
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // ``` ... ```
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Prose around a bare document: take the outermost brackets.
    if !text.starts_with('{') && !text.starts_with('[') {
        let open = text.find(['{', '[']);
        let close = text.rfind(['}', ']']);
        if let (Some(open), Some(close)) = (open, close) {
            if open < close {
                return text[open..=close].trim();
            }
        }
    }

    text
}

/// Render a list of names for a prompt.
pub(crate) fn name_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.into_iter().collect();
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

/// [`Generator`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Claude,
    model: Option<String>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            model: None,
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Create from environment (ANTHROPIC_API_KEY).
    pub fn from_env() -> Result<Self, claude::Error> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl Generator for ClaudeGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerateError> {
        let mut request = Request::new(vec![Message::user(&prompt.user)])
            .with_system(&prompt.system)
            .with_max_tokens(self.max_tokens);

        if let Some(model) = &self.model {
            request = request.with_model(model);
        }

        // Structured agents run cold; prose runs at the configured temperature.
        if prompt.expects_json {
            request = request.with_temperature(0.0);
        } else if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        tracing::debug!(agent = %prompt.agent, "calling model");
        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"is_movement": false}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "```json\n{\"is_movement\": true}\n```";
        assert_eq!(extract_json(text), r#"{"is_movement": true}"#);

        let text = "Here you go:\n```\n[1, 2]\n```";
        assert_eq!(extract_json(text), "[1, 2]");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let text = "Sure! {\"a\": {\"b\": 1}} Hope that helps.";
        assert_eq!(extract_json(text), r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn test_name_list() {
        assert_eq!(name_list(Vec::<&str>::new()), "(none)");
        assert_eq!(name_list(["Torch", "Rope"]), "Torch, Rope");
    }

    #[test]
    fn test_agent_names() {
        assert_eq!(Agent::Cartographer.to_string(), "cartographer");
        assert_eq!(Agent::Dreamer.name(), "dreamer");
    }
}
