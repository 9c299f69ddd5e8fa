use crate::conversation::Turn;
use crate::lesson::{LessonStep, STEP_COUNT, TeachingMode};

/// What the tutor is busy with, derived from the turn flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Generating,
    Speaking,
}

/// One-off messages for the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    SpeechInputUnsupported,
}

impl Notice {
    pub fn text(&self, mode: TeachingMode) -> &'static str {
        match (self, mode) {
            (Notice::SpeechInputUnsupported, TeachingMode::Mixed) => {
                "عذراً، جهازك لا يدعم التعرف على الصوت."
            }
            (Notice::SpeechInputUnsupported, TeachingMode::English) => {
                "Sorry, speech recognition is not available here."
            }
        }
    }
}

/// Changes the front-end should render, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonUpdate {
    TurnAppended(Turn),
    /// Discard whatever the student has typed but not sent.
    ClearInput,
    Notice(Notice),
    Closed,
}

/// Everything the lesson screen shows about the orchestrator at a glance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub activity: Activity,
    pub listening: bool,
    pub dialogue_active: bool,
    pub step: LessonStep,
    pub step_number: usize,
    pub step_count: usize,
    pub progress_percent: u8,
    pub turns: usize,
    pub closed: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            activity: Activity::Idle,
            listening: false,
            dialogue_active: false,
            step: LessonStep::WarmUp,
            step_number: 1,
            step_count: STEP_COUNT,
            progress_percent: 0,
            turns: 0,
            closed: false,
        }
    }
}

impl StatusSnapshot {
    /// Explain, next-step and send are only offered while nothing is in flight.
    pub fn controls_enabled(&self) -> bool {
        self.activity == Activity::Idle && !self.closed
    }

    pub fn status_text(&self, mode: TeachingMode) -> Option<&'static str> {
        let mixed = mode == TeachingMode::Mixed;
        match self.activity {
            Activity::Speaking if mixed => Some("سوبر ميس بتتكلم بالراحة.. اسمعها!"),
            Activity::Speaking => Some("Super Miss is speaking... listen!"),
            Activity::Generating if mixed => Some("سوبر ميس بتحضر الشرح..."),
            Activity::Generating => Some("Super Miss is getting ready..."),
            Activity::Idle if self.listening && mixed => Some("سوبر ميس بتسمعك.. اتكلم!"),
            Activity::Idle if self.listening => Some("Super Miss is listening... talk!"),
            Activity::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_prefers_activity_over_listening() {
        let mut status = StatusSnapshot {
            activity: Activity::Generating,
            listening: true,
            ..Default::default()
        };
        assert_eq!(
            status.status_text(TeachingMode::English),
            Some("Super Miss is getting ready...")
        );
        assert!(!status.controls_enabled());

        status.activity = Activity::Idle;
        assert_eq!(
            status.status_text(TeachingMode::English),
            Some("Super Miss is listening... talk!")
        );
        assert!(status.controls_enabled());

        status.listening = false;
        assert_eq!(status.status_text(TeachingMode::Mixed), None);
    }
}
