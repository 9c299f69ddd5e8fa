pub mod conversation;
pub mod dialogue;
pub mod lesson;
pub mod orchestrator;
pub mod prompts;
pub mod session_state;
pub mod speech;
pub mod status;

use std::fmt;

pub use orchestrator::{Collaborators, LessonAction, LessonHandle, LessonOrchestrator, OrchestratorConfig};
pub use session_state::{LessonSession, SessionEvent};

/// Identifies one generation → synthesis → playback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Represents commands that the session state machine (`LessonSession`) issues to the runtime.
///
/// This enum decouples the session's decision-making from the runtime's
/// execution of side effects, so every transition can be tested without I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start listening on the microphone.
    ArmMic,
    /// Stop listening. Always safe to execute.
    DisarmMic,
    /// Ask the dialogue engine for the tutor's next line.
    RequestReply {
        turn: TurnId,
        prompt: String,
        system_instruction: String,
    },
    /// Turn the tutor's reply into audio.
    Synthesize { turn: TurnId, text: String },
    /// Play synthesized audio to the end.
    Play { turn: TurnId, audio: Vec<u8> },
    /// Forward an update to the front-end.
    Publish(status::LessonUpdate),
}
