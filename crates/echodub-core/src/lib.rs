pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AudioError, BridgeError, CaptureError, ConfigError, RecorderError};
pub use types::{
    AudioFormat, RecognizerEvent, StreamMode, TextDelta, TranscriptView, VoiceConfig,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta_fields() {
        let delta = TextDelta {
            text: "Hello there.".to_string(),
            commit: false,
        };
        assert_eq!(delta.text, "Hello there.");
        assert!(!delta.commit);
    }

    #[test]
    fn test_voice_config_fields() {
        let voice = VoiceConfig {
            voice_id: "narrator_warm".to_string(),
            language: "en-US".to_string(),
        };
        assert_eq!(voice.voice_id, "narrator_warm");
        assert_eq!(voice.language, "en-US");
    }

    #[test]
    fn test_recognizer_event_fields() {
        let ev = RecognizerEvent {
            text: "how are you".to_string(),
            is_final: true,
        };
        assert_eq!(ev.text, "how are you");
        assert!(ev.is_final);
    }
}
