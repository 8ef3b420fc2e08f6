use serde::{Deserialize, Serialize};

/// The unsent suffix of a growing transcript, forwarded for synthesis.
/// `commit` marks the end of an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    pub text: String,
    pub commit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    pub voice_id: String,
    pub language: String,
}

/// Operating mode negotiated with the relay on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamMode {
    #[serde(rename = "stream")]
    Stream,
    #[serde(rename = "http-fallback")]
    HttpFallback,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Stream => "stream",
            StreamMode::HttpFallback => "http-fallback",
        }
    }
}

/// Payload encoding of a synthesized audio fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Parse a wire-level format label. Unknown labels fall back to mp3,
    /// matching the relay's default.
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Mp3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Raw interim/final event from a local recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerEvent {
    pub text: String,
    pub is_final: bool,
}

/// Human-visible transcript snapshot: finalized segments plus the current
/// stabilized interim suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptView {
    pub finals: Vec<String>,
    pub interim: String,
}
