use crate::audio;
use anyhow::Context;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Extra time given to the device to flush its last buffer once the ring is empty.
const OUTPUT_TAIL_MS: u64 = 150;

fn output_channels(channels: u16) -> anyhow::Result<usize> {
    if channels == 0 {
        anyhow::bail!("Output device reports no channels");
    }
    Ok(channels as usize)
}

/// Plays one mono PCM16 clip on an output device and blocks until it has been
/// played out or `max_wait` elapses.
///
/// Returns `Ok(false)` when the deadline was hit first.
pub fn play_pcm16(
    device_name: Option<&str>,
    pcm16: &[u8],
    source_rate: f64,
    max_wait: Duration,
) -> anyhow::Result<bool> {
    let output = crate::device::get_or_default_output(device_name)?;
    tracing::debug!("Using output device: {:?}", output.name());

    let output_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let output_channel_count = output_channels(output_config.channels)?;
    let output_sample_rate = output_config.sample_rate.0 as f64;

    let samples = audio::pcm16_to_f32(pcm16);
    let samples = audio::resample(&samples, source_rate, output_sample_rate)?;
    if samples.is_empty() {
        return Ok(true);
    }

    let audio_out_buffer = audio::shared_buffer(samples.len());
    let (mut audio_out_tx, mut audio_out_rx) = audio_out_buffer.split();
    let pushed = audio_out_tx.push_slice(&samples);
    if pushed < samples.len() {
        tracing::warn!("Dropped {} samples that did not fit the buffer", samples.len() - pushed);
    }

    let (done_tx, done_rx) = std::sync::mpsc::sync_channel::<()>(1);
    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = Arc::clone(&drained);

    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let mut sample_index = 0;
        while sample_index < data.len() {
            let sample = audio_out_rx.try_pop().unwrap_or(0.0);
            // Same sample on the first two channels, silence on the rest.
            for ch in 0..output_channel_count {
                if sample_index >= data.len() {
                    break;
                }
                data[sample_index] = if ch < 2 { sample } else { 0.0 };
                sample_index += 1;
            }
        }
        if audio_out_rx.is_empty() && !drained_flag.swap(true, Ordering::SeqCst) {
            let _ = done_tx.try_send(());
        }
    };

    let output_stream = output.build_output_stream(
        &output_config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    output_stream.play()?;

    let finished = done_rx.recv_timeout(max_wait).is_ok();
    if finished {
        std::thread::sleep(Duration::from_millis(OUTPUT_TAIL_MS));
    } else {
        tracing::warn!("Playback did not drain within {:?}", max_wait);
    }
    drop(output_stream);
    Ok(finished)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_channels_rejects_channelless_devices() {
        assert!(output_channels(0).is_err());
        assert_eq!(output_channels(1).unwrap(), 1);
        assert_eq!(output_channels(6).unwrap(), 6);
    }
}
