use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no recognizer available: {0}")]
    UnsupportedEngine(String),

    #[error("recognizer failed to start: {0}")]
    StartFailed(String),

    #[error("recognizer error: {0}")]
    EngineError(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no valid credential available")]
    AuthRequired,

    #[error("connect timed out after {0} ms")]
    ConnectTimeout(u64),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("not connected")]
    NotConnected,

    #[error("fallback synthesis failed: {0}")]
    Fallback(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to build output stream: {0}")]
    StreamBuild(String),

    #[error("failed to decode audio fragment: {0}")]
    DecodeFailed(String),
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no active camera session")]
    NoCamera,

    #[error("dubbed audio not ready yet")]
    AudioNotReady,

    #[error("no supported recording container")]
    Unsupported,

    #[error("camera is in use by an active recording")]
    RecordingActive,

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("failed to write recording artifact: {0}")]
    ArtifactWrite(String),
}
