//! Terminal front-end helpers: reading commands and rendering lesson updates.

use lesson_core::LessonAction;
use lesson_core::conversation::Speaker;
use lesson_core::lesson::TeachingMode;
use lesson_core::status::{LessonUpdate, StatusSnapshot};

pub const HELP: &str = "Type to answer. Commands: /mic (dialogue mode on/off), /explain, /next, /back, /help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(LessonAction),
    Help,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    match line {
        "/mic" => Command::Action(LessonAction::ToggleMic),
        "/explain" => Command::Action(LessonAction::ExplainStep),
        "/next" => Command::Action(LessonAction::NextStep),
        "/back" | "/quit" => Command::Action(LessonAction::Back),
        "/help" => Command::Help,
        other if other.starts_with('/') => Command::Unknown(other.to_string()),
        text => Command::Action(LessonAction::SubmitText(text.to_string())),
    }
}

/// Text to print for an update, if any.
pub fn render_update(update: &LessonUpdate, student: &str, mode: TeachingMode) -> Option<String> {
    match update {
        LessonUpdate::TurnAppended(turn) => {
            let who = match turn.speaker {
                Speaker::Tutor => "Super Miss",
                Speaker::Student => student,
            };
            Some(format!("{}: {}", who, turn.text))
        }
        LessonUpdate::ClearInput => None,
        LessonUpdate::Notice(notice) => Some(format!("(!) {}", notice.text(mode))),
        LessonUpdate::Closed => Some("Bye! 👋".to_string()),
    }
}

pub fn render_progress(status: &StatusSnapshot) -> String {
    format!(
        "[Step {}/{}: {} - {}%]",
        status.step_number, status.step_count, status.step, status.progress_percent
    )
}
