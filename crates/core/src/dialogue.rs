use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Said by the tutor when the remote service answers with nothing.
pub const FALLBACK_REPLY: &str = "I'm sorry, can you say that again? 🍎";

/// The single failure a reply request can surface. Network errors, quota
/// exhaustion and timeouts all collapse into this.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogueError {
    #[error("reply unavailable: {0}")]
    Unavailable(String),
}

// The `DialogueEngine` is the orchestrator's only view of the remote reasoning
// service. The persona, language policy, student name and current step all
// travel in `system_instruction`, so implementations stay stateless and the
// conversation itself remains owned by the orchestrator.
//
// Implementations must never return an empty string; use `or_fallback` on the
// raw model output.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DialogueEngine: Send + Sync {
    async fn reply(&self, prompt: &str, system_instruction: &str) -> Result<String, DialogueError>;
}

/// Returns the trimmed reply, or the friendly fallback when there is nothing to say.
pub fn or_fallback(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        trimmed.to_string()
    }
}
