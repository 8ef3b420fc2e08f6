use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

// ── RouteGain ──────────────────────────────────────────────────

/// Per-destination gain and mute, shared with the realtime path via atomics.
/// The primary output and the recording tap each own one, so muting what the
/// user hears never silences what gets recorded.
pub struct RouteGain {
    volume_bits: AtomicU32,
    muted: AtomicBool,
    id: String,
}

impl RouteGain {
    pub fn new(id: &str) -> Self {
        Self {
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            muted: AtomicBool::new(false),
            id: id.to_string(),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, v: f32) {
        self.volume_bits.store(v.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, m: bool) {
        self.muted.store(m, Ordering::Relaxed);
    }

    /// Effective multiplier for this route right now.
    pub fn gain(&self) -> f32 {
        if self.is_muted() {
            0.0
        } else {
            self.volume()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
