pub mod engine;
pub mod recognizer;
pub mod transcript;

pub use engine::{CaptureEngine, CaptureEvent};
pub use recognizer::{Recognizer, RecognizerRegistry, RecognizerSignal, ScriptedRecognizer};
pub use transcript::TranscriptState;
