//! Optional speech synthesis for narration.
//!
//! No engine ships with the crate. A front end that wants audio supplies a
//! [`Synthesizer`]; the pipeline only ever asks it for bytes and carries on
//! without them when it fails.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from a synthesizer.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Synthesis failed: {0}")]
    Failed(String),
}

/// Narrator voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Voice {
    /// Deep and warm.
    #[default]
    Puck,
    /// Deep and intense.
    Fenrir,
    /// Soft and mysterious.
    Kore,
    /// Balanced.
    Zephyr,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Puck, Voice::Fenrir, Voice::Kore, Voice::Zephyr];

    pub fn name(&self) -> &'static str {
        match self {
            Voice::Puck => "Puck",
            Voice::Fenrir => "Fenrir",
            Voice::Kore => "Kore",
            Voice::Zephyr => "Zephyr",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Voice {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Voice::ALL
            .into_iter()
            .find(|voice| voice.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SpeechError::UnknownVoice(s.to_string()))
    }
}

/// Turns narration into audio bytes.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, SpeechError>;
}

/// Synthesize, logging and swallowing any failure.
pub async fn speak(synthesizer: &dyn Synthesizer, text: &str, voice: Voice) -> Option<Vec<u8>> {
    if text.trim().is_empty() {
        return None;
    }
    match synthesizer.synthesize(text, voice).await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(voice = %voice, error = %e, "speech synthesis failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl Synthesizer for Broken {
        async fn synthesize(&self, _text: &str, _voice: Voice) -> Result<Vec<u8>, SpeechError> {
            Err(SpeechError::Failed("offline".to_string()))
        }
    }

    struct Echo;

    #[async_trait]
    impl Synthesizer for Echo {
        async fn synthesize(&self, text: &str, _voice: Voice) -> Result<Vec<u8>, SpeechError> {
            Ok(text.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_voice_parse() {
        assert_eq!("kore".parse::<Voice>().unwrap(), Voice::Kore);
        assert_eq!(" Fenrir ".parse::<Voice>().unwrap(), Voice::Fenrir);
        assert!("Alloy".parse::<Voice>().is_err());
        assert_eq!(Voice::default(), Voice::Puck);
    }

    #[tokio::test]
    async fn test_speak_swallows_failure() {
        assert!(speak(&Broken, "Hello", Voice::Puck).await.is_none());
        assert_eq!(speak(&Echo, "Hi", Voice::Zephyr).await, Some(b"Hi".to_vec()));
        assert!(speak(&Echo, "  ", Voice::Zephyr).await.is_none());
    }
}
