use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// The host has no speech-to-text capability.
    #[error("speech input is not supported on this host")]
    Unsupported,
}

/// Events a speech recognizer reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// One completed utterance. Never empty.
    Utterance(String),
    /// Listening started (`true`) or stopped (`false`), whether by `disarm`
    /// or by the recognizer ending on its own.
    ListeningChanged(bool),
}

/// Whether the recognizer keeps listening after an utterance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenPolicy {
    #[default]
    Continuous,
    /// Stop after every utterance; the orchestrator re-arms when idle.
    SingleShot,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown listen policy '{0}', expected 'continuous' or 'single-shot'")]
pub struct PolicyParseError(String);

impl FromStr for ListenPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continuous" => Ok(ListenPolicy::Continuous),
            "single-shot" | "single_shot" | "singleshot" => Ok(ListenPolicy::SingleShot),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}

/// Text-to-speech. Failures are logged by the implementation and reported as `None`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}

/// Plays synthesized audio and resolves exactly once, when playback ends.
///
/// Callers never pass empty audio and never call `play` concurrently.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: Vec<u8>);
}

/// Continuous speech-to-text. Events are delivered on the channel handed out
/// when the recognizer was built.
///
/// Only the orchestrator arms or disarms the microphone.
pub trait SpeechRecognizer: Send + Sync {
    /// Starts listening. Arming an armed recognizer must not emit a second
    /// `ListeningChanged(true)`.
    fn arm(&self) -> Result<(), SpeechError>;

    /// Stops listening. Safe to call at any time, including before any `arm`.
    fn disarm(&self);
}

/// Recognizer for hosts without speech input.
#[derive(Debug, Default)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn arm(&self) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }

    fn disarm(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_policy_parsing() {
        assert_eq!("continuous".parse(), Ok(ListenPolicy::Continuous));
        assert_eq!("Single-Shot".parse(), Ok(ListenPolicy::SingleShot));
        let err = "Sometimes".parse::<ListenPolicy>().unwrap_err();
        assert_eq!(err, PolicyParseError("sometimes".to_string()));
        assert_eq!(
            err.to_string(),
            "unknown listen policy 'sometimes', expected 'continuous' or 'single-shot'"
        );
    }

    #[test]
    fn test_unsupported_recognizer() {
        let recognizer = UnsupportedRecognizer;
        recognizer.disarm();
        assert_eq!(recognizer.arm(), Err(SpeechError::Unsupported));
    }
}
