use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sample_rate: default_sample_rate(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint of the synthesis relay.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Synchronous request/response endpoint used in degraded mode.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            voice_id: default_voice_id(),
            language: default_language(),
            connect_timeout_ms: default_connect_timeout_ms(),
            fallback_url: default_fallback_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Inactivity window after which carried text is force-committed.
    #[serde(default = "default_pause_commit_ms")]
    pub pause_commit_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            pause_commit_ms: default_pause_commit_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,

    #[serde(default = "default_lead_time_ms")]
    pub lead_time_ms: u64,

    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,

    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,

    #[serde(default = "default_tail_margin_ms")]
    pub tail_margin_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            buffer_size: default_buffer_size(),
            lead_time_ms: default_lead_time_ms(),
            fade_ms: default_fade_ms(),
            dedup_window: default_dedup_window(),
            tail_margin_ms: default_tail_margin_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_dir")]
    pub directory: String,

    #[serde(default = "default_recording_filename")]
    pub filename: String,

    #[serde(default = "default_video_bits")]
    pub video_bits_per_second: u32,

    #[serde(default = "default_audio_bits")]
    pub audio_bits_per_second: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: default_recording_dir(),
            filename: default_recording_filename(),
            video_bits_per_second: default_video_bits(),
            audio_bits_per_second: default_audio_bits(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8080/ws/echodub".to_string()
}

fn default_voice_id() -> String {
    "narrator_warm".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_fallback_url() -> String {
    "http://127.0.0.1:8080/api/tts".to_string()
}

fn default_engine() -> String {
    "scripted".to_string()
}

fn default_pause_commit_ms() -> u64 {
    360
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_buffer_size() -> u32 {
    1024
}

fn default_lead_time_ms() -> u64 {
    80
}

fn default_fade_ms() -> u64 {
    20
}

fn default_dedup_window() -> usize {
    200
}

fn default_tail_margin_ms() -> u64 {
    120
}

fn default_recording_dir() -> String {
    "recordings".to_string()
}

fn default_recording_filename() -> String {
    "recording.webm".to_string()
}

fn default_video_bits() -> u32 {
    4_000_000
}

fn default_audio_bits() -> u32 {
    160_000
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if let Some(first_missing) = errors.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&content)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (for testing).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }
}
