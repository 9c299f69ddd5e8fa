use anyhow::Context;
use base64::Engine;
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the mono PCM16 audio returned by the speech synthesizer.
pub const TTS_PCM16_SAMPLE_RATE: f64 = 24000.0;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, padding the last one with silence.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Decodes a base64 payload into raw bytes.
pub fn decode_base64(fragment: &str) -> anyhow::Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(fragment.trim())
        .context("Audio payload is not valid base64")
}

/// Interprets little-endian PCM16 bytes as f32 samples in `[-1.0, 1.0]`.
/// A trailing odd byte is dropped.
pub fn pcm16_to_f32(pcm16: &[u8]) -> Vec<f32> {
    pcm16
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Resamples a whole mono clip in one go.
pub fn resample(samples: &[f32], from_rate: f64, to_rate: f64) -> anyhow::Result<Vec<f32>> {
    if samples.is_empty() || (from_rate - to_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from_rate, to_rate, RESAMPLER_CHUNK_SIZE)?;
    let chunk_size = resampler.input_frames_next();

    let mut out = Vec::with_capacity((samples.len() as f64 * to_rate / from_rate) as usize);
    for chunk in split_for_chunks(samples, chunk_size) {
        let resampled = resampler
            .process(&[chunk.as_slice()], None)
            .context("Failed to resample audio chunk")?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}
