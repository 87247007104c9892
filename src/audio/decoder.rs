// PCM decoder for generated speech
// Converts raw 16-bit little-endian mono PCM into normalized f32 samples

use std::sync::Arc;

use tracing::debug;

/// Sample rate of the speech provider's raw output
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

const SAMPLE_WIDTH: usize = 2;
const I16_SCALE: f32 = 1.0 / 32768.0;

/// Immutable mono sample buffer ready for playback
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds (`sample_count / sample_rate`)
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a raw speech buffer. A trailing odd byte is dropped, the same way a
/// fixed-width integer view over the buffer would size itself.
pub fn decode_pcm16(bytes: &[u8]) -> DecodedAudio {
    let chunks = bytes.chunks_exact(SAMPLE_WIDTH);
    if !chunks.remainder().is_empty() {
        debug!(
            byte_len = bytes.len(),
            "PCM buffer not aligned to sample width, truncating final byte"
        );
    }

    let samples = chunks
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 * I16_SCALE)
        .collect();

    DecodedAudio::new(samples, SPEECH_SAMPLE_RATE)
}
