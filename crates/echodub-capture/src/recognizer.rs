use async_trait::async_trait;
use echodub_core::{CaptureError, RecognizerEvent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output of a running recognizer: interim/final text, or a non-fatal
/// engine-reported error. The channel closing means the engine ended the
/// session on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerSignal {
    Event(RecognizerEvent),
    Error(String),
}

/// Seam for a local speech-recognition engine.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Begin continuous recognition for `language`, delivering signals on
    /// `events` until stopped or until the engine ends the session (drop the
    /// sender to signal the latter).
    async fn start(
        &mut self,
        language: &str,
        events: mpsc::UnboundedSender<RecognizerSignal>,
    ) -> Result<(), CaptureError>;

    async fn stop(&mut self);
}

// ── ScriptedRecognizer ─────────────────────────────────────────

/// Replays a fixed sequence of recognition events with an optional delay
/// between them. Stands in for a real engine in tests and dry runs.
pub struct ScriptedRecognizer {
    script: Vec<RecognizerEvent>,
    event_gap: Duration,
    hold_open: bool,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<RecognizerEvent>) -> Self {
        Self {
            script,
            event_gap: Duration::ZERO,
            hold_open: false,
            task: None,
        }
    }

    pub fn with_event_gap(mut self, gap: Duration) -> Self {
        self.event_gap = gap;
        self
    }

    /// Keep the session open after the script runs out, like a live engine
    /// that has simply gone quiet. The session then ends on `stop()`.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start(
        &mut self,
        language: &str,
        events: mpsc::UnboundedSender<RecognizerSignal>,
    ) -> Result<(), CaptureError> {
        let script = self.script.clone();
        let gap = self.event_gap;
        let hold_open = self.hold_open;
        tracing::debug!(language = %language, events = script.len(), "scripted recognizer starting");

        let task = tokio::spawn(async move {
            for ev in script {
                if !gap.is_zero() {
                    tokio::time::sleep(gap).await;
                }
                if events.send(RecognizerSignal::Event(ev)).is_err() {
                    break;
                }
            }
            if hold_open {
                // Park holding the sender; aborted by stop().
                std::future::pending::<()>().await;
            }
            // Sender dropped on exit: the session ends once the script runs out.
        });
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ScriptedRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── RecognizerRegistry ─────────────────────────────────────────

pub struct RecognizerRegistry {
    factories: HashMap<String, fn() -> Box<dyn Recognizer>>,
}

impl RecognizerRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("scripted", || Box::new(ScriptedRecognizer::new(Vec::new())));
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Box<dyn Recognizer>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Recognizer>, CaptureError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| CaptureError::UnsupportedEngine(name.to_string()))
    }

    pub fn list_engines(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
