use echodub_capture::{CaptureEngine, CaptureEvent, RecognizerRegistry, ScriptedRecognizer};
use echodub_core::{RecognizerEvent, TextDelta};
use std::time::Duration;
use tokio::sync::mpsc;

fn interim(text: &str) -> RecognizerEvent {
    RecognizerEvent {
        text: text.to_string(),
        is_final: false,
    }
}

fn final_ev(text: &str) -> RecognizerEvent {
    RecognizerEvent {
        text: text.to_string(),
        is_final: true,
    }
}

async fn collect_deltas(
    rx: &mut mpsc::UnboundedReceiver<CaptureEvent>,
    count: usize,
) -> Vec<TextDelta> {
    let mut deltas = Vec::new();
    while deltas.len() < count {
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for deltas")
            .expect("capture channel closed");
        if let CaptureEvent::Delta(d) = ev {
            deltas.push(d);
        }
    }
    deltas
}

#[tokio::test]
async fn test_registry_unknown_engine_rejected() {
    let registry = RecognizerRegistry::new();
    assert!(registry.create("scripted").is_ok());
    assert!(registry.create("native").is_err());
}

/// Full session: a dictation with mid-sentence punctuation, a revision of
/// the interim text, and a trailing segment with no terminal punctuation.
#[tokio::test]
async fn test_dictation_session_delta_sequence() {
    let mut engine = CaptureEngine::new(60);
    let mut rx = engine.take_event_receiver().unwrap();

    let recognizer = ScriptedRecognizer::new(vec![
        interim("Good"),
        interim("Good morning"),
        interim("Good morning everyone. Today we"),
        final_ev("ship it"),
    ])
    .with_event_gap(Duration::from_millis(5))
    .hold_open();
    engine.start(Box::new(recognizer), "en-US").await.unwrap();

    let deltas = collect_deltas(&mut rx, 2).await;
    // Punctuation split: the head goes out immediately, uncommitted.
    assert_eq!(deltas[0].text, "Good morning everyone.");
    assert!(!deltas[0].commit);
    // The carried remainder joins the engine's finalized tail.
    assert_eq!(deltas[1].text, "Today we ship it");
    assert!(deltas[1].commit);

    engine.stop().await;
}

/// Speech that never hits terminal punctuation still commits within the
/// pause window.
#[tokio::test]
async fn test_unpunctuated_speech_commits_on_pause() {
    let mut engine = CaptureEngine::new(60);
    let mut rx = engine.take_event_receiver().unwrap();

    let recognizer = ScriptedRecognizer::new(vec![
        interim("Hello there. How are you"),
    ])
    .hold_open();
    engine.start(Box::new(recognizer), "en-US").await.unwrap();

    let deltas = collect_deltas(&mut rx, 2).await;
    assert_eq!(deltas[0].text, "Hello there.");
    assert!(!deltas[0].commit);
    assert_eq!(deltas[1].text, "How are you");
    assert!(deltas[1].commit);

    engine.stop().await;
}

/// Stop before the pause window fires: no stray commit afterwards and the
/// finalized history survives the stop.
#[tokio::test]
async fn test_stop_cancels_pause_timer() {
    let mut engine = CaptureEngine::new(10_000);
    let mut rx = engine.take_event_receiver().unwrap();

    let recognizer = ScriptedRecognizer::new(vec![final_ev("kept segment"), interim("dangling")])
        .with_event_gap(Duration::from_millis(5))
        .hold_open();
    engine.start(Box::new(recognizer), "en-US").await.unwrap();

    let committed = collect_deltas(&mut rx, 1).await;
    assert_eq!(committed[0].text, "kept segment");

    engine.stop().await;

    let mut last_view = None;
    while let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        match ev {
            CaptureEvent::Delta(d) => panic!("unexpected delta after stop: {d:?}"),
            CaptureEvent::Transcript(view) => last_view = Some(view),
            _ => {}
        }
    }
    let view = last_view.expect("stop must publish a final transcript view");
    assert_eq!(view.finals, vec!["kept segment".to_string()]);
    assert!(view.interim.is_empty());
}
