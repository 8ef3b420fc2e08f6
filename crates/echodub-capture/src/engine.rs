use crate::recognizer::{Recognizer, RecognizerSignal};
use crate::transcript::TranscriptState;
use echodub_core::{CaptureError, TextDelta, TranscriptView};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Typed output of a capture session, consumed by the session wiring.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A new session began. Emitted before the first delta so downstream
    /// consumers drop their send cursor and dedup state in time.
    SessionReset,
    /// An utterance delta to forward for synthesis.
    Delta(TextDelta),
    /// Updated human-visible transcript.
    Transcript(TranscriptView),
    /// Non-fatal recognizer error; capture continues.
    Error(String),
    /// The recognizer ended the session. The caller decides on restart.
    Ended,
}

enum Command {
    ClearTranscript,
}

/// Drives a [`Recognizer`] and turns its raw events into forwardable deltas
/// and transcript snapshots, with a pause-based forced commit.
pub struct CaptureEngine {
    pause_commit: Duration,
    event_tx: mpsc::UnboundedSender<CaptureEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<CaptureEvent>>,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    recognizer: Option<Box<dyn Recognizer>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureEngine {
    pub fn new(pause_commit_ms: u64) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            pause_commit: Duration::from_millis(pause_commit_ms),
            event_tx,
            event_rx: Some(event_rx),
            cmd_tx: None,
            recognizer: None,
            task: None,
        }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<CaptureEvent>> {
        self.event_rx.take()
    }

    /// Begin a capture session. Transcript state starts fresh, and a
    /// [`CaptureEvent::SessionReset`] precedes the first delta so the send
    /// cursor and the audio dedup window start fresh alongside.
    pub async fn start(
        &mut self,
        mut recognizer: Box<dyn Recognizer>,
        language: &str,
    ) -> Result<(), CaptureError> {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(CaptureError::StartFailed(
                "capture already running".to_string(),
            ));
        }

        let (sig_tx, sig_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        recognizer.start(language, sig_tx).await?;
        tracing::info!(engine = recognizer.name(), language = %language, "capture started");

        // Queued ahead of the run loop's task: consumers see the reset
        // before anything this session produces.
        let _ = self.event_tx.send(CaptureEvent::SessionReset);

        self.recognizer = Some(recognizer);
        self.cmd_tx = Some(cmd_tx);
        self.task = Some(tokio::spawn(run_loop(
            sig_rx,
            cmd_rx,
            self.event_tx.clone(),
            self.pause_commit,
        )));
        Ok(())
    }

    /// Halt recognition. Cancels the pause timer and clears the interim
    /// display; finalized history stays visible until `clear_transcript`.
    pub async fn stop(&mut self) {
        if let Some(mut rec) = self.recognizer.take() {
            rec.stop().await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.cmd_tx = None;
        tracing::info!("capture stopped");
    }

    /// Explicit user action: wipe the visible transcript. Independent of
    /// start/stop. The caller resets the send cursor alongside.
    pub fn clear_transcript(&self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(Command::ClearTranscript);
        }
    }
}

async fn run_loop(
    mut sig_rx: mpsc::UnboundedReceiver<RecognizerSignal>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<CaptureEvent>,
    pause_commit: Duration,
) {
    let mut state = TranscriptState::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let pause = async {
            match deadline {
                Some(d) => sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            sig = sig_rx.recv() => match sig {
                Some(RecognizerSignal::Event(ev)) => {
                    for delta in state.apply(&ev) {
                        let _ = event_tx.send(CaptureEvent::Delta(delta));
                    }
                    let _ = event_tx.send(CaptureEvent::Transcript(state.view()));
                    // Every recognizer event re-arms the forced commit.
                    deadline = Some(Instant::now() + pause_commit);
                }
                Some(RecognizerSignal::Error(msg)) => {
                    tracing::warn!("recognizer error: {msg}");
                    let _ = event_tx.send(CaptureEvent::Error(msg));
                }
                None => {
                    // Session over, locally stopped or engine-initiated.
                    state.clear_interim();
                    let _ = event_tx.send(CaptureEvent::Transcript(state.view()));
                    let _ = event_tx.send(CaptureEvent::Ended);
                    break;
                }
            },
            _ = pause => {
                deadline = None;
                if let Some(delta) = state.pause_flush() {
                    tracing::debug!(text = %delta.text, "pause commit");
                    let _ = event_tx.send(CaptureEvent::Delta(delta));
                    let _ = event_tx.send(CaptureEvent::Transcript(state.view()));
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::ClearTranscript) => {
                    state.clear();
                    let _ = event_tx.send(CaptureEvent::Transcript(state.view()));
                }
                None => break,
            },
        }
    }
}
