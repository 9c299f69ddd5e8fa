/// Who contributed a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Student,
    Tutor,
}

/// One contribution to the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Student,
            text: text.into(),
        }
    }

    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Tutor,
            text: text.into(),
        }
    }
}

/// Append-only, chronologically ordered record of a lesson session.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn and returns a copy for publishing to the front-end.
    pub fn push(&mut self, turn: Turn) -> Turn {
        self.turns.push(turn.clone());
        turn
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn count(&self, speaker: Speaker) -> usize {
        self.turns.iter().filter(|t| t.speaker == speaker).count()
    }
}
