pub mod config;
pub mod curriculum;
pub mod gemini_adapter;
pub mod playback;
pub mod prompt_loader;
pub mod repl;
pub mod transcript_source;
