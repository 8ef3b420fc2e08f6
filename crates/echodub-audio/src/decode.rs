use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use echodub_core::{AudioError, AudioFormat};
use rodio::{Decoder, Source};
use std::io::Cursor;

/// Decode a base64 payload, tolerating the URL-safe alphabet, embedded
/// whitespace, and missing padding. Relays are inconsistent about all three.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>, AudioError> {
    let mut normalized: String = payload
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }
    STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| AudioError::DecodeFailed(e.to_string()))
}

/// Decode one audio fragment into mono f32 samples at `target_rate`.
pub fn decode_fragment(
    payload: &str,
    format: AudioFormat,
    target_rate: u32,
) -> Result<Vec<f32>, AudioError> {
    let bytes = decode_base64_payload(payload)?;
    decode_bytes(bytes, format, target_rate)
}

pub fn decode_bytes(
    bytes: Vec<u8>,
    format: AudioFormat,
    target_rate: u32,
) -> Result<Vec<f32>, AudioError> {
    let cursor = Cursor::new(bytes);
    let decoder = match format {
        AudioFormat::Mp3 => Decoder::new_mp3(cursor),
        AudioFormat::Wav => Decoder::new_wav(cursor),
    }
    .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;

    let channels = decoder.channels() as usize;
    let source_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
    if samples.is_empty() {
        return Err(AudioError::DecodeFailed("empty audio stream".to_string()));
    }

    let mono: Vec<f32> = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(resample_linear(&mono, source_rate, target_rate))
}

/// Linear interpolation resampler. Synthesized speech tolerates this fine;
/// the pipeline is not mastering music.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).round().max(1.0) as usize;
    let last = input.len() - 1;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = (pos as usize).min(last);
        let frac = (pos - idx as f64) as f32;
        let a = input[idx];
        let b = input[(idx + 1).min(last)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV container around raw samples.
    fn make_wav(samples: &[i16], rate: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let byte_rate = rate * channels as u32 * 2;
        let block_align = channels * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_base64_standard_alphabet() {
        assert_eq!(decode_base64_payload("QUJDRA==").unwrap(), b"ABCD");
    }

    #[test]
    fn test_base64_url_safe_and_unpadded() {
        // '>' and '?' force '+'/'/' in standard encoding.
        let bytes = vec![0xfb, 0xff, 0xbf];
        let url_safe = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes);
        assert_eq!(decode_base64_payload(&url_safe).unwrap(), bytes);
    }

    #[test]
    fn test_base64_ignores_whitespace() {
        assert_eq!(decode_base64_payload("QUJD\nRA==").unwrap(), b"ABCD");
    }

    #[test]
    fn test_base64_garbage_is_error() {
        match decode_base64_payload("!!!not base64!!!") {
            Err(AudioError::DecodeFailed(_)) => {}
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_wav_mono_same_rate() {
        let samples: Vec<i16> = (0..800).map(|i| (i % 100) as i16 * 100).collect();
        let wav = make_wav(&samples, 8000, 1);
        let decoded = decode_bytes(wav, AudioFormat::Wav, 8000).unwrap();
        assert_eq!(decoded.len(), 800);
        // 16-bit PCM converts to [-1, 1] floats.
        assert!(decoded.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_decode_wav_stereo_folds_to_mono() {
        // L = 0.5, R = -0.5 everywhere: the mono fold is silence.
        let mut samples = Vec::new();
        for _ in 0..400 {
            samples.push(16384i16);
            samples.push(-16384i16);
        }
        let wav = make_wav(&samples, 8000, 2);
        let decoded = decode_bytes(wav, AudioFormat::Wav, 8000).unwrap();
        assert_eq!(decoded.len(), 400);
        assert!(decoded.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let samples: Vec<i16> = vec![1000; 8000]; // 1 second at 8 kHz
        let wav = make_wav(&samples, 8000, 1);
        let decoded = decode_bytes(wav, AudioFormat::Wav, 16000).unwrap();
        // Roughly one second at the target rate.
        assert!((decoded.len() as i64 - 16000).unsigned_abs() < 50);
    }

    #[test]
    fn test_decode_truncated_container_is_error() {
        match decode_bytes(vec![0x52, 0x49, 0x46], AudioFormat::Wav, 48000) {
            Err(AudioError::DecodeFailed(_)) => {}
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_resample_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 48000, 48000), input);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }
}
