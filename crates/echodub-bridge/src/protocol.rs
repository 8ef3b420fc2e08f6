use echodub_core::{AudioFormat, StreamMode};
use serde::{Deserialize, Serialize};

/// Frames sent to the relay. JSON text frames tagged on `type`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Sent immediately after the connection opens; establishes voice and
    /// language for everything that follows.
    Hello {
        #[serde(rename = "voiceId")]
        voice_id: String,
        lang: String,
    },
    /// A transcript delta to synthesize. `commit = true` ends the utterance.
    InputText {
        text: String,
        commit: bool,
        #[serde(rename = "voiceId")]
        voice_id: String,
        lang: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypedFrame {
    Hello { mode: StreamMode },
    Error { error: Option<String> },
}

/// Audio fragments carry no `type` tag; the payload key varies by vendor
/// relay version.
#[derive(Debug, Deserialize)]
struct ChunkFrame {
    #[serde(
        default,
        alias = "audioChunk",
        alias = "audioContent",
        alias = "data"
    )]
    audio: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Hello { mode: StreamMode },
    Error { message: String },
    Chunk { audio: String, format: AudioFormat },
}

/// Parse one inbound text frame. Returns `None` for frames that carry
/// nothing actionable (unknown types, malformed JSON, chunk without payload);
/// the stream continues either way.
pub fn parse_server_frame(text: &str) -> Option<ServerFrame> {
    if let Ok(typed) = serde_json::from_str::<TypedFrame>(text) {
        return Some(match typed {
            TypedFrame::Hello { mode } => ServerFrame::Hello { mode },
            TypedFrame::Error { error } => ServerFrame::Error {
                message: error.unwrap_or_else(|| "unknown relay error".to_string()),
            },
        });
    }

    let chunk = serde_json::from_str::<ChunkFrame>(text).ok()?;
    let audio = chunk.audio?;
    let format = chunk
        .format
        .as_deref()
        .map(AudioFormat::parse)
        .unwrap_or_default();
    Some(ServerFrame::Chunk { audio, format })
}
