use echodub_core::{BridgeError, VoiceConfig};

/// Degraded-mode synthesis: one synchronous request, one complete audio
/// artifact. Used when the streaming connection cannot be established
/// within the connect timeout.
pub struct FallbackSynth {
    client: reqwest::Client,
    url: String,
}

impl FallbackSynth {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<Vec<u8>, BridgeError> {
        let body = serde_json::json!({
            "text": text,
            "voiceId": voice.voice_id,
            "lang": voice.language,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Fallback(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::Fallback(format!(
                "synthesis endpoint returned {}",
                response.status(),
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Fallback(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
