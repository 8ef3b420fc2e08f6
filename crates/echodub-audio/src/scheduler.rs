use crate::decode::decode_fragment;
use crate::route::RouteGain;
use crate::signature::{chunk_signature, DedupWindow};
use crate::timeline::PlaybackTimeline;
use echodub_core::{AudioError, AudioFormat};
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

const RING_RETRY_INTERVAL: Duration = Duration::from_millis(20);
const RING_STALL_LIMIT: u32 = 50;

/// Push a block into a ring that may be smaller than the block, yielding
/// while the consumer drains. A consumer that makes no progress for
/// `RING_STALL_LIMIT` retries is treated as dead and the rest is dropped.
async fn push_all(ring: &Arc<Mutex<HeapProd<f32>>>, block: &[f32], route: &'static str) {
    let mut offset = 0;
    let mut stalls = 0u32;
    while offset < block.len() {
        let pushed = lock(ring).push_slice(&block[offset..]);
        offset += pushed;
        if offset == block.len() {
            return;
        }
        if pushed == 0 {
            stalls += 1;
            if stalls >= RING_STALL_LIMIT {
                tracing::warn!(
                    route,
                    dropped = block.len() - offset,
                    "ring stalled, dropping rest of fragment",
                );
                return;
            }
        } else {
            stalls = 0;
        }
        tokio::time::sleep(RING_RETRY_INTERVAL).await;
    }
}

/// Linear fade-in/out multiplier for sample `index` of a `total`-sample
/// buffer with a `fade`-sample ramp at each boundary.
fn fade_envelope(index: usize, total: usize, fade: usize) -> f32 {
    if fade == 0 {
        return 1.0;
    }
    let rising = (index + 1) as f32 / fade as f32;
    let falling = (total - index) as f32 / fade as f32;
    rising.min(falling).min(1.0)
}

// ── SchedulerSettings ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub sample_rate: u32,
    pub lead_time_ms: u64,
    pub fade_ms: u64,
    pub dedup_window: usize,
    pub tail_margin_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            lead_time_ms: 80,
            fade_ms: 20,
            dedup_window: 200,
            tail_margin_ms: 120,
        }
    }
}

// ── TapHandle ─────────────────────────────────────────────────

/// Recorder-facing view of the tap route: whether anything has been
/// scheduled yet, plus its gain controls.
#[derive(Clone)]
pub struct TapHandle {
    live: Arc<AtomicBool>,
    gain: Arc<RouteGain>,
}

impl TapHandle {
    /// False until the first fragment is scheduled. A recording started
    /// before this point would have no audio track worth keeping.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    pub fn gain(&self) -> &RouteGain {
        &self.gain
    }
}

// ── AudioScheduler ────────────────────────────────────────────

/// Turns an unordered, possibly-duplicated stream of audio fragments into
/// sequential, fade-spliced playback. Every decoded buffer is written to
/// two ring buffers: the primary output device and the recording tap, each
/// behind its own gain.
pub struct AudioScheduler {
    sample_rate: u32,
    tail_margin: Duration,
    epoch: Instant,
    timeline: Mutex<PlaybackTimeline>,
    dedup: Mutex<DedupWindow>,
    primary: Arc<Mutex<HeapProd<f32>>>,
    tap: Arc<Mutex<HeapProd<f32>>>,
    primary_gain: Arc<RouteGain>,
    tap_gain: Arc<RouteGain>,
    tap_live: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AudioScheduler {
    pub fn new(
        settings: SchedulerSettings,
        primary: HeapProd<f32>,
        tap: HeapProd<f32>,
    ) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            tail_margin: Duration::from_millis(settings.tail_margin_ms),
            epoch: Instant::now(),
            timeline: Mutex::new(PlaybackTimeline::new(
                settings.lead_time_ms,
                settings.fade_ms,
            )),
            dedup: Mutex::new(DedupWindow::new(settings.dedup_window)),
            primary: Arc::new(Mutex::new(primary)),
            tap: Arc::new(Mutex::new(tap)),
            primary_gain: Arc::new(RouteGain::new("primary")),
            tap_gain: Arc::new(RouteGain::new("tap")),
            tap_live: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Decode and place one fragment on the timeline. Returns Ok(false) if
    /// the fragment was a duplicate within the dedup window, Ok(true) if it
    /// was scheduled. A decode failure drops only this fragment.
    pub fn handle_chunk(&self, payload: &str, format: AudioFormat) -> Result<bool, AudioError> {
        let signature = chunk_signature(payload);
        if !lock(&self.dedup).check_and_insert(&signature) {
            tracing::debug!(%signature, "duplicate fragment dropped");
            return Ok(false);
        }

        let samples = decode_fragment(payload, format, self.sample_rate)?;
        let duration = samples.len() as f64 / self.sample_rate as f64;
        let now = self.epoch.elapsed().as_secs_f64();
        let slot = lock(&self.timeline).schedule(now, duration);
        self.tap_live.store(true, Ordering::Relaxed);
        tracing::debug!(
            start = slot.start,
            end = slot.end,
            format = format.as_str(),
            "fragment scheduled",
        );

        let start_at = self.epoch + Duration::from_secs_f64(slot.start);
        let fade_samples = (slot.fade * self.sample_rate as f64) as usize;
        let primary = Arc::clone(&self.primary);
        let tap = Arc::clone(&self.tap);
        let primary_gain = Arc::clone(&self.primary_gain);
        let tap_gain = Arc::clone(&self.tap_gain);

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(start_at)).await;

            let total = samples.len();
            let mut primary_block = Vec::with_capacity(total);
            let mut tap_block = Vec::with_capacity(total);
            // Gains are read at playback time so a mute that happened while
            // the buffer was queued takes effect.
            let pg = primary_gain.gain();
            let tg = tap_gain.gain();
            for (i, s) in samples.iter().enumerate() {
                let shaped = s * fade_envelope(i, total, fade_samples);
                primary_block.push(shaped * pg);
                tap_block.push(shaped * tg);
            }

            // Fragments longer than a ring drain through it as the consumer
            // frees space; one stalled route must not starve the other.
            tokio::join!(
                push_all(&primary, &primary_block, "primary"),
                push_all(&tap, &tap_block, "tap"),
            );
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        Ok(true)
    }

    /// Zero the play head and forget all signatures. Called when a fresh
    /// capture session begins.
    pub fn reset_state(&self) {
        lock(&self.timeline).reset();
        lock(&self.dedup).clear();
        tracing::debug!("scheduler state reset");
    }

    /// Forget signatures only. Called when an utterance commits: the next
    /// utterance may legitimately synthesize identical audio.
    pub fn clear_signatures(&self) {
        lock(&self.dedup).clear();
    }

    /// Remaining scheduled playback plus the safety margin, in milliseconds.
    /// A recorder stop must wait this long before finalizing.
    pub fn tail_ms(&self) -> u64 {
        let now = self.epoch.elapsed().as_secs_f64();
        let tail = lock(&self.timeline).tail_seconds(now);
        (tail * 1000.0).ceil() as u64 + self.tail_margin.as_millis() as u64
    }

    pub fn play_head_secs(&self) -> f64 {
        lock(&self.timeline).play_head()
    }

    pub fn primary_gain(&self) -> &RouteGain {
        &self.primary_gain
    }

    pub fn tap_handle(&self) -> TapHandle {
        TapHandle {
            live: Arc::clone(&self.tap_live),
            gain: Arc::clone(&self.tap_gain),
        }
    }
}

impl Drop for AudioScheduler {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}
