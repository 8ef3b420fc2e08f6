/// Placement of one buffer on the output clock, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSlot {
    pub start: f64,
    pub end: f64,
    /// Fade-in/out length applied at both boundaries of the buffer.
    pub fade: f64,
}

// ── PlaybackTimeline ──────────────────────────────────────────

/// Pure scheduling bookkeeping: a single `play_head` scalar marking the end
/// of the last placed buffer. `schedule` is the sole mutation point, which
/// keeps placements strictly sequential regardless of arrival jitter.
pub struct PlaybackTimeline {
    play_head: f64,
    lead: f64,
    fade: f64,
}

impl PlaybackTimeline {
    pub fn new(lead_time_ms: u64, fade_ms: u64) -> Self {
        Self {
            play_head: 0.0,
            lead: lead_time_ms as f64 / 1000.0,
            fade: fade_ms as f64 / 1000.0,
        }
    }

    /// Place a buffer of `duration` seconds at `max(now + lead, play_head)`
    /// and advance the play head to its end. The fade is capped at 1/8 of
    /// the buffer for very short clips.
    pub fn schedule(&mut self, now: f64, duration: f64) -> ScheduledSlot {
        let start = (now + self.lead).max(self.play_head);
        let end = start + duration;
        self.play_head = end;
        ScheduledSlot {
            start,
            end,
            fade: self.fade.min(duration / 8.0),
        }
    }

    /// Remaining scheduled playback from `now`, floor zero.
    pub fn tail_seconds(&self, now: f64) -> f64 {
        (self.play_head - now).max(0.0)
    }

    pub fn play_head(&self) -> f64 {
        self.play_head
    }

    /// Zero the play head for a fresh capture session, so stale timing from
    /// the previous session does not push new audio into the future.
    pub fn reset(&mut self) {
        self.play_head = 0.0;
    }
}
