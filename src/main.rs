use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;
use echodub_audio::{create_ring_buffer, AudioScheduler, SchedulerSettings};
use echodub_bridge::token::{is_expired, DEFAULT_EXPIRY_SKEW_SECS};
use echodub_bridge::{BridgeEvent, FallbackSynth, StaticCredential, StreamBridge};
use echodub_capture::{CaptureEngine, CaptureEvent, RecognizerRegistry};
use echodub_core::{AppConfig, AudioFormat, BridgeError, StreamMode, VoiceConfig};
use echodub_recorder::{
    AvRecorder, CameraController, PassthroughRecorder, RecordingSettings, TestPatternCamera,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "echodub", about = "Live speech-to-speech dubbing pipeline")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter =
        EnvFilter::try_new(&config.general.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("echodub starting");

    let voice = VoiceConfig {
        voice_id: config.stream.voice_id.clone(),
        language: config.stream.language.clone(),
    };
    let sample_rate = config.general.sample_rate;

    // Primary ring feeds the output device; the tap ring feeds the recorder.
    let (primary_prod, primary_cons) = create_ring_buffer(sample_rate as usize * 2);
    let (tap_prod, tap_cons) = create_ring_buffer(sample_rate as usize * 8);

    let scheduler = AudioScheduler::new(
        SchedulerSettings {
            sample_rate,
            lead_time_ms: config.audio.lead_time_ms,
            fade_ms: config.audio.fade_ms,
            dedup_window: config.audio.dedup_window,
            tail_margin_ms: config.audio.tail_margin_ms,
        },
        primary_prod,
        tap_prod,
    );

    tracing::info!("using output device: {}", config.audio.device_name);
    let output_device = echodub_audio::find_output_device(&config.audio.device_name)
        .with_context(|| format!("failed to get output device: {}", config.audio.device_name))?;
    let (_output, output_handle) = echodub_audio::OutputNode::new(
        &output_device,
        primary_cons,
        sample_rate,
        config.audio.buffer_size,
    )
    .context("failed to create output node")?;

    let camera = CameraController::new();
    camera
        .turn_on(Box::new(TestPatternCamera::default()))
        .context("failed to start camera")?;

    let mut recorder = AvRecorder::new(
        RecordingSettings {
            directory: PathBuf::from(&config.recording.directory),
            filename: config.recording.filename.clone(),
            video_bits_per_second: config.recording.video_bits_per_second,
            audio_bits_per_second: config.recording.audio_bits_per_second,
        },
        Box::new(PassthroughRecorder::new()),
        tap_cons,
    );

    // Session/token issuance is external; the credential arrives via env.
    let token = std::env::var("ECHODUB_TOKEN").unwrap_or_default();
    if !token.is_empty() && is_expired(&token, DEFAULT_EXPIRY_SKEW_SECS) {
        tracing::warn!("credential is expired or about to expire");
    }
    let credential = StaticCredential(token);

    let mut bridge = StreamBridge::new(
        &config.stream.endpoint,
        voice.clone(),
        config.stream.connect_timeout_ms,
    );
    let mut bridge_rx = bridge
        .take_event_receiver()
        .context("bridge event receiver already taken")?;

    // Always at hand: the relay may also negotiate degraded mode in its
    // hello, long after connect succeeded.
    let fallback = FallbackSynth::new(&config.stream.fallback_url);
    match bridge.connect(&credential).await {
        Ok(()) => {
            tracing::info!(endpoint = %config.stream.endpoint, "streaming mode");
        }
        Err(BridgeError::AuthRequired) => {
            return Err(BridgeError::AuthRequired)
                .context("set ECHODUB_TOKEN to a valid credential");
        }
        Err(e) => {
            tracing::warn!("streaming connect failed, switching to fallback: {e}");
            bridge.set_mode(StreamMode::HttpFallback);
        }
    }

    let registry = RecognizerRegistry::new();
    let recognizer = registry
        .create(&config.capture.engine)
        .with_context(|| format!("recognizer '{}' unavailable", config.capture.engine))?;

    let mut engine = CaptureEngine::new(config.capture.pause_commit_ms);
    let mut capture_rx = engine
        .take_event_receiver()
        .context("capture event receiver already taken")?;
    engine
        .start(recognizer, &config.stream.language)
        .await
        .context("failed to start capture")?;

    tracing::info!("pipeline running (ctrl-c to stop)");

    loop {
        tokio::select! {
            Some(ev) = capture_rx.recv() => match ev {
                CaptureEvent::SessionReset => {
                    // Stale play head, signatures, or cursor would stall or
                    // suppress audio for the new session.
                    scheduler.reset_state();
                    bridge.reset_cursor();
                }
                CaptureEvent::Delta(delta) => {
                    if delta.text.is_empty() && !delta.commit {
                        continue;
                    }
                    match bridge.mode() {
                        StreamMode::Stream => {
                            if let Err(e) = bridge.send_text_delta(&delta.text, delta.commit).await {
                                tracing::warn!("send failed: {e}");
                            }
                        }
                        StreamMode::HttpFallback => {
                            // Degraded mode synthesizes whole utterances only.
                            if delta.commit && !delta.text.is_empty() {
                                match fallback.synthesize(&delta.text, &voice).await {
                                    Ok(bytes) => {
                                        let payload = STANDARD.encode(&bytes);
                                        if let Err(e) =
                                            scheduler.handle_chunk(&payload, AudioFormat::Mp3)
                                        {
                                            tracing::warn!("fallback fragment dropped: {e}");
                                        }
                                    }
                                    Err(e) => tracing::warn!("fallback synthesis failed: {e}"),
                                }
                            }
                        }
                    }
                    if delta.commit {
                        // A finalized utterance starts a fresh dedup epoch.
                        scheduler.clear_signatures();
                    }
                }
                CaptureEvent::Transcript(view) => {
                    tracing::debug!(
                        finals = view.finals.len(),
                        interim = %view.interim,
                        "transcript",
                    );
                }
                CaptureEvent::Error(msg) => {
                    tracing::warn!("recognition error: {msg}");
                }
                CaptureEvent::Ended => {
                    tracing::warn!("recognizer ended the session");
                    break;
                }
            },
            Some(ev) = bridge_rx.recv() => match ev {
                BridgeEvent::Mode(mode) => {
                    tracing::info!(mode = mode.as_str(), "relay negotiated mode");
                }
                BridgeEvent::Audio { data, format } => {
                    match scheduler.handle_chunk(&data, format) {
                        Ok(true) => {
                            if camera.is_on() && !recorder.is_recording() {
                                if let Err(e) =
                                    recorder.start_recording(&camera, &scheduler.tap_handle())
                                {
                                    tracing::debug!("recording not started: {e}");
                                }
                            }
                        }
                        Ok(false) => {}
                        Err(e) => tracing::warn!("fragment dropped: {e}"),
                    }
                }
                BridgeEvent::RemoteError(msg) => {
                    tracing::warn!("relay error: {msg}");
                }
                BridgeEvent::Disconnected => {
                    tracing::warn!("relay connection ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received");
                break;
            }
        }
    }

    tracing::info!("shutting down");
    engine.stop().await;
    bridge.disconnect().await;
    if recorder.is_recording() {
        // Already-scheduled audio finishes playing before the artifact closes.
        let tail = scheduler.tail_ms();
        match recorder.stop_recording(tail).await {
            Ok(url) => tracing::info!(%url, "recording saved"),
            Err(e) => tracing::warn!("failed to finalize recording: {e}"),
        }
    }
    if let Err(e) = camera.turn_off() {
        tracing::warn!("camera teardown: {e}");
    }
    let underruns = output_handle.underruns();
    if underruns > 0 {
        tracing::warn!(underruns, "output device ran dry mid-playback");
    }

    Ok(())
}
