use async_trait::async_trait;
use lesson_core::speech::AudioPlayer;
use lesson_native_utils::audio::TTS_PCM16_SAMPLE_RATE;
use std::time::Duration;

/// Plays synthesized speech on a cpal output device.
///
/// The audio stream lives on a blocking thread for the length of one clip.
pub struct CpalPlayer {
    device: Option<String>,
    max_wait: Duration,
}

impl CpalPlayer {
    pub fn new(device: Option<String>, max_wait: Duration) -> Self {
        Self { device, max_wait }
    }
}

#[async_trait]
impl AudioPlayer for CpalPlayer {
    async fn play(&self, audio: Vec<u8>) {
        let device = self.device.clone();
        let max_wait = self.max_wait;
        let result = tokio::task::spawn_blocking(move || {
            lesson_native_utils::playback::play_pcm16(
                device.as_deref(),
                &audio,
                TTS_PCM16_SAMPLE_RATE,
                max_wait,
            )
        })
        .await;

        match result {
            Ok(Ok(true)) => tracing::debug!("Playback finished"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => tracing::warn!("Audio playback failed: {:#}", e),
            Err(e) => tracing::error!("Playback task failed: {}", e),
        }
    }
}
