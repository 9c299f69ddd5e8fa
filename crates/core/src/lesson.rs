use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Number of pedagogical phases in every lesson.
pub const STEP_COUNT: usize = 7;

/// One of the fixed, ordered phases a lesson walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStep {
    WarmUp,
    Vocabulary,
    Pronunciation,
    Phonics,
    Song,
    Activity,
    Revision,
}

impl LessonStep {
    pub const ALL: [LessonStep; STEP_COUNT] = [
        LessonStep::WarmUp,
        LessonStep::Vocabulary,
        LessonStep::Pronunciation,
        LessonStep::Phonics,
        LessonStep::Song,
        LessonStep::Activity,
        LessonStep::Revision,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LessonStep::WarmUp => "WARM_UP",
            LessonStep::Vocabulary => "VOCABULARY",
            LessonStep::Pronunciation => "PRONUNCIATION",
            LessonStep::Phonics => "PHONICS",
            LessonStep::Song => "SONG",
            LessonStep::Activity => "ACTIVITY",
            LessonStep::Revision => "REVISION",
        }
    }
}

impl fmt::Display for LessonStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of the student within the seven lesson steps.
///
/// The index only ever moves forward and saturates at the last step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LessonProgress {
    current_step_index: usize,
}

impl LessonProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn current_step(&self) -> LessonStep {
        LessonStep::ALL[self.current_step_index]
    }

    /// Moves to the next step. Returns `false` when already on the last one.
    pub fn advance(&mut self) -> bool {
        if self.current_step_index + 1 < STEP_COUNT {
            self.current_step_index += 1;
            true
        } else {
            false
        }
    }

    /// One-based step number, as shown to the student ("3/7").
    pub fn step_number(&self) -> usize {
        self.current_step_index + 1
    }

    pub fn percent_complete(&self) -> u8 {
        ((self.step_number() as f64 / STEP_COUNT as f64) * 100.0).round() as u8
    }
}

/// How the tutor mixes languages while teaching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeachingMode {
    /// Every English word or sentence is followed by its Arabic meaning.
    #[default]
    Mixed,
    /// Target language only.
    #[serde(alias = "english-only")]
    English,
}

impl TeachingMode {
    pub fn label(&self) -> &'static str {
        match self {
            TeachingMode::Mixed => "Arabic/English",
            TeachingMode::English => "English Only",
        }
    }

    /// BCP-47 tag a speech recognizer should listen for.
    pub fn recognition_language(&self) -> &'static str {
        match self {
            TeachingMode::Mixed => "ar-EG",
            TeachingMode::English => "en-US",
        }
    }
}

impl fmt::Display for TeachingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown teaching mode '{0}', expected 'mixed' or 'english'")]
pub struct ModeParseError(String);

impl FromStr for TeachingMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mixed" | "bilingual" | "arabic/english" => Ok(TeachingMode::Mixed),
            "english" | "english-only" | "english only" => Ok(TeachingMode::English),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

/// A curriculum unit. Read-only data supplied by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub phonics: Vec<String>,
    #[serde(default)]
    pub language_in_use: String,
    #[serde(default)]
    pub life_skills: Vec<String>,
}
