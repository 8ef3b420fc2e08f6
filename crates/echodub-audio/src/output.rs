use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use echodub_core::AudioError;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

/// Fill `data` from the ring; missing samples become silence. Returns how
/// many samples the ring supplied.
fn fill_from_ring(cons: &mut HeapCons<f32>, data: &mut [f32]) -> usize {
    let popped = cons.pop_slice(data);
    data[popped..].fill(0.0);
    popped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    Ok,
    Error,
}

/// Resolve an output device by name; "default" picks the host default.
pub fn find_output_device(name: &str) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    if name == "default" {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()));
    }
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
    for device in devices {
        if matches!(device.name().as_deref(), Ok(n) if n == name) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

// ── OutputHandle ──────────────────────────────────────────────

#[derive(Clone)]
pub struct OutputHandle {
    playing: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
    underruns: Arc<AtomicU64>,
}

impl OutputHandle {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn set_playing(&self, v: bool) {
        self.playing.store(v, Ordering::Relaxed);
    }

    pub fn status(&self) -> OutputStatus {
        match self.status.load(Ordering::Relaxed) {
            STATUS_ERROR => OutputStatus::Error,
            _ => OutputStatus::Ok,
        }
    }

    /// Callbacks where scheduled audio ran dry mid-buffer. An empty ring is
    /// normal between utterances and is not counted.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

// ── OutputNode ────────────────────────────────────────────────

/// Mono cpal output stream draining the scheduler's primary ring buffer.
/// Underruns play silence rather than stalling the device.
pub struct OutputNode {
    _stream: Stream,
}

impl OutputNode {
    pub fn new(
        device: &Device,
        consumer: HeapCons<f32>,
        sample_rate: u32,
        buffer_size: u32,
    ) -> Result<(Self, OutputHandle), AudioError> {
        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(buffer_size),
        };

        let consumer = Arc::new(Mutex::new(consumer));
        let playing = Arc::new(AtomicBool::new(true));
        let playing_flag = Arc::clone(&playing);
        let status = Arc::new(AtomicU8::new(STATUS_OK));
        let status_flag = Arc::clone(&status);
        let underruns = Arc::new(AtomicU64::new(0));
        let underrun_count = Arc::clone(&underruns);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
            status_flag.store(STATUS_ERROR, Ordering::Relaxed);
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !playing_flag.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    if let Ok(mut cons) = consumer.lock() {
                        let popped = fill_from_ring(&mut cons, data);
                        // A partial fill means the scheduler fell behind;
                        // a fully empty ring is idle time between utterances.
                        if popped > 0 && popped < data.len() {
                            underrun_count.fetch_add(1, Ordering::Relaxed);
                        }
                    } else {
                        data.fill(0.0);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        let handle = OutputHandle {
            playing,
            status,
            underruns,
        };
        Ok((Self { _stream: stream }, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::create_ring_buffer;
    use ringbuf::traits::Producer;

    fn make_output_handle() -> OutputHandle {
        OutputHandle {
            playing: Arc::new(AtomicBool::new(true)),
            status: Arc::new(AtomicU8::new(STATUS_OK)),
            underruns: Arc::new(AtomicU64::new(0)),
        }
    }

    #[test]
    fn test_output_handle_default_playing() {
        assert!(make_output_handle().is_playing());
    }

    #[test]
    fn test_output_handle_toggle() {
        let handle = make_output_handle();
        handle.set_playing(false);
        assert!(!handle.is_playing());
    }

    #[test]
    fn test_output_handle_clone_shares_state() {
        let h1 = make_output_handle();
        let h2 = h1.clone();
        h1.set_playing(false);
        assert!(!h2.is_playing());
    }

    #[test]
    fn test_output_handle_status_default_ok() {
        assert_eq!(make_output_handle().status(), OutputStatus::Ok);
    }

    #[test]
    fn test_output_handle_underruns_start_at_zero() {
        assert_eq!(make_output_handle().underruns(), 0);
    }

    #[test]
    fn test_fill_from_ring_full_buffer() {
        let (mut prod, mut cons) = create_ring_buffer(8);
        prod.push_slice(&[0.1, 0.2, 0.3, 0.4]);
        let mut data = [9.0f32; 4];
        assert_eq!(fill_from_ring(&mut cons, &mut data), 4);
        assert_eq!(data, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_fill_from_ring_partial_pads_silence() {
        let (mut prod, mut cons) = create_ring_buffer(8);
        prod.push_slice(&[0.5, 0.6]);
        let mut data = [9.0f32; 4];
        assert_eq!(fill_from_ring(&mut cons, &mut data), 2);
        assert_eq!(data, [0.5, 0.6, 0.0, 0.0]);
    }

    #[test]
    fn test_fill_from_ring_empty_is_all_silence() {
        let (_prod, mut cons) = create_ring_buffer(8);
        let mut data = [9.0f32; 4];
        assert_eq!(fill_from_ring(&mut cons, &mut data), 0);
        assert_eq!(data, [0.0; 4]);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_default_device_lookup() {
        let device = find_output_device("default").unwrap();
        println!("default output: {:?}", device.name());
    }
}
