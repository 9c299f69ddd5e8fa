//! Application Configuration Module
//!
//! Loads the tutor's settings from environment variables (and a `.env` file)
//! into a single struct handed to the adapters at startup.

use lesson_core::OrchestratorConfig;
use lesson_core::speech::ListenPolicy;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_TTS_VOICE: &str = "Kore";

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub gemini_api_key: SecretString,
    pub gemini_base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub temperature: f64,
    pub reply_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub playback_timeout: Duration,
    /// Line-oriented transcript source. `None` means no speech input.
    pub transcript_path: Option<PathBuf>,
    pub listen_policy: ListenPolicy,
    pub output_device: Option<String>,
    pub prompts_dir: PathBuf,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// Only `GEMINI_API_KEY` is required; see `from_lookup` for the rest.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = var("GEMINI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let temperature = parse_or(&var, "TEMPERATURE", 0.8_f64)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("TEMPERATURE", temperature.to_string()));
        }

        let listen_policy = match var("LISTEN_POLICY") {
            Some(raw) => ListenPolicy::from_str(&raw).map_err(|_| invalid("LISTEN_POLICY", raw))?,
            None => ListenPolicy::default(),
        };

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| invalid("RUST_LOG", log_level_str))?;

        Ok(Self {
            gemini_api_key,
            gemini_base_url: or_default("GEMINI_BASE_URL", DEFAULT_BASE_URL),
            chat_model: or_default("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            tts_model: or_default("TTS_MODEL", DEFAULT_TTS_MODEL),
            tts_voice: or_default("TTS_VOICE", DEFAULT_TTS_VOICE),
            temperature,
            reply_timeout: seconds(&var, "REPLY_TIMEOUT_SECS", 30)?,
            synthesis_timeout: seconds(&var, "SYNTHESIS_TIMEOUT_SECS", 45)?,
            playback_timeout: seconds(&var, "PLAYBACK_TIMEOUT_SECS", 180)?,
            transcript_path: var("TRANSCRIPT_PATH").map(PathBuf::from),
            listen_policy,
            output_device: var("OUTPUT_DEVICE"),
            prompts_dir: PathBuf::from(or_default("PROMPTS_DIR", "prompts")),
            log_level,
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            reply_timeout: self.reply_timeout,
            synthesis_timeout: self.synthesis_timeout,
            playback_timeout: self.playback_timeout,
        }
    }
}

fn invalid(var: &str, value: String) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value,
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, raw)),
        None => Ok(default),
    }
}

fn seconds(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(var, key, default)?;
    if secs == 0 {
        return Err(invalid(key, secs.to_string()));
    }
    Ok(Duration::from_secs(secs))
}
